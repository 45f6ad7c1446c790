use crate::http::{Request, Response};
use http::header::LOCATION;
use http::{HeaderName, HeaderValue, StatusCode};
use std::time::Duration;

pub const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

/// Hooks run around every dispatched request
///
/// `before` may short-circuit dispatch by returning a response; `after` runs
/// for every response, short-circuited or not, in registration order.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &Request) -> Option<Response> {
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response, _latency: Duration) {}
}

/// Redirects `/path/` to `/path`, keeping the query string
///
/// Runs of trailing slashes collapse in one hop: `/path//` also redirects
/// straight to `/path`, and `//` to `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingSlash;

impl Middleware for TrailingSlash {
    fn before(&self, req: &Request) -> Option<Response> {
        let path = req.path();
        if path == "/" || !path.ends_with('/') {
            return None;
        }

        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let location = match req.query() {
            Some(query) => format!("{trimmed}?{query}"),
            None => trimmed.to_string(),
        };

        let location = HeaderValue::from_str(&location).ok()?;
        Some(Response::empty(StatusCode::MOVED_PERMANENTLY).with_header(LOCATION, location))
    }
}

/// Reports the handling time as `X-Response-Time: 1.23ms`
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTime;

impl ResponseTime {
    pub fn format(latency: Duration) -> String {
        format!("{:.2}ms", latency.as_secs_f64() * 1000.0)
    }
}

impl Middleware for ResponseTime {
    fn after(&self, _req: &Request, res: &mut Response, latency: Duration) {
        if let Ok(value) = HeaderValue::from_str(&Self::format(latency)) {
            res.headers_mut().insert(X_RESPONSE_TIME, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_trailing_slash_redirect() {
        let response = TrailingSlash
            .before(&Request::new(Method::GET, "/get/"))
            .unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.header("location"), Some("/get"));
    }

    #[test]
    fn test_trailing_slash_run_collapses_in_one_hop() {
        let response = TrailingSlash
            .before(&Request::new(Method::GET, "/get//?a=1"))
            .unwrap();
        assert_eq!(response.header("location"), Some("/get?a=1"));

        let response = TrailingSlash
            .before(&Request::new(Method::GET, "//"))
            .unwrap();
        assert_eq!(response.header("location"), Some("/"));
    }

    #[test]
    fn test_trailing_slash_passthrough() {
        assert!(TrailingSlash.before(&Request::new(Method::GET, "/")).is_none());
        assert!(TrailingSlash.before(&Request::new(Method::GET, "/get")).is_none());
        assert!(
            TrailingSlash
                .before(&Request::new(Method::GET, "/get?next=/a/"))
                .is_none()
        );
    }

    #[test]
    fn test_response_time_format() {
        assert_eq!(ResponseTime::format(Duration::from_micros(1234)), "1.23ms");
        assert_eq!(ResponseTime::format(Duration::ZERO), "0.00ms");

        let mut response = Response::empty(StatusCode::OK);
        ResponseTime.after(
            &Request::new(Method::GET, "/get"),
            &mut response,
            Duration::from_millis(5),
        );
        assert_eq!(response.header("x-response-time"), Some("5.00ms"));
    }
}
