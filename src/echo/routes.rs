use super::auth::{self, BASIC_CHALLENGE, BEARER_CHALLENGE};
use super::describe::Describer;
use super::flatten::FlattenedMap;
use crate::http::{Request, Response};
use http::header::{ALLOW, USER_AGENT, WWW_AUTHENTICATE};
use http::{HeaderValue, Method, StatusCode};
use serde::Serialize;
use std::borrow::Cow;

/// The endpoints served by the echo app, resolved from a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    BasicAuth { user: String, pass: String },
    BearerAuth,
    Status(String),
    Ip,
    UserAgent,
    Headers,
    Redirect,
}

impl Route {
    /// Matches a path (without query string) against the route table
    pub fn resolve(path: &str) -> Option<Route> {
        let segments: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        let route = match segments.as_slice() {
            ["get"] => Route::Get,
            ["post"] => Route::Post,
            ["put"] => Route::Put,
            ["patch"] => Route::Patch,
            ["delete"] => Route::Delete,
            ["auth", "basic", user, pass] if !user.is_empty() && !pass.is_empty() => {
                Route::BasicAuth {
                    user: decode_segment(user),
                    pass: decode_segment(pass),
                }
            }
            ["auth", "bearer"] => Route::BearerAuth,
            ["status", code] if !code.is_empty() => Route::Status(decode_segment(code)),
            ["ip"] => Route::Ip,
            ["user-agent"] => Route::UserAgent,
            ["headers"] => Route::Headers,
            ["redirect"] => Route::Redirect,
            _ => return None,
        };
        Some(route)
    }

    /// Methods this route answers; `None` means any method
    pub fn methods(&self) -> Option<&'static [Method]> {
        const GET: &[Method] = &[Method::GET, Method::HEAD];
        const POST: &[Method] = &[Method::POST];
        const PUT: &[Method] = &[Method::PUT];
        const PATCH: &[Method] = &[Method::PATCH];
        const DELETE: &[Method] = &[Method::DELETE];
        match self {
            Route::Post => Some(POST),
            Route::Put => Some(PUT),
            Route::Patch => Some(PATCH),
            Route::Delete => Some(DELETE),
            Route::Status(_) => None,
            _ => Some(GET),
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods().is_none_or(|methods| methods.contains(method))
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string())
}

#[derive(Serialize)]
struct OriginBody {
    origin: String,
}

#[derive(Serialize)]
struct UserAgentBody<'a> {
    #[serde(rename = "user-agent")]
    user_agent: Option<&'a str>,
}

#[derive(Serialize)]
struct HeadersBody {
    headers: FlattenedMap,
}

/// Dispatches requests to the endpoint handlers
#[derive(Debug, Clone, Default)]
pub struct Router {
    describer: Describer,
}

impl Router {
    pub fn new(describer: Describer) -> Self {
        Self { describer }
    }

    pub fn dispatch(&self, request: &Request) -> Response {
        let Some(route) = Route::resolve(request.path()) else {
            return Response::error(StatusCode::NOT_FOUND, "not found");
        };

        if !route.allows(request.method()) {
            let allow = route
                .methods()
                .unwrap_or_default()
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = Response::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            if let Ok(allow) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(ALLOW, allow);
            }
            return response;
        }

        match route {
            Route::Get => Response::json(StatusCode::OK, &self.describer.basic_info(request)),
            Route::Post | Route::Put | Route::Patch | Route::Delete => {
                Response::json(StatusCode::OK, &self.describer.full_info(request))
            }
            Route::BasicAuth { user, pass } => basic_auth(request, &user, &pass),
            Route::BearerAuth => bearer_auth(request),
            Route::Status(code) => status(&code),
            Route::Ip => Response::json(
                StatusCode::OK,
                &OriginBody {
                    origin: self.describer.origin(request),
                },
            ),
            Route::UserAgent => Response::json(
                StatusCode::OK,
                &UserAgentBody {
                    user_agent: request.header(USER_AGENT.as_str()),
                },
            ),
            Route::Headers => Response::json(
                StatusCode::OK,
                &HeadersBody {
                    headers: FlattenedMap::from_headers(request.headers()),
                },
            ),
            Route::Redirect => redirect(request),
        }
    }
}

fn basic_auth(request: &Request, user: &str, pass: &str) -> Response {
    let result = auth::check_basic(request.header("authorization"), user, pass);
    if result.is_authorized() {
        Response::json(StatusCode::OK, &result)
    } else {
        Response::json(StatusCode::UNAUTHORIZED, &result).with_header(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(BASIC_CHALLENGE),
        )
    }
}

fn bearer_auth(request: &Request) -> Response {
    let result = auth::check_bearer(request.header("authorization"));
    if result.is_authorized() {
        Response::json(StatusCode::OK, &result)
    } else {
        Response::json(StatusCode::UNAUTHORIZED, &result).with_header(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(BEARER_CHALLENGE),
        )
    }
}

/// Answers with the requested status code and no body
pub fn status(code: &str) -> Response {
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Response::error(StatusCode::BAD_REQUEST, "status code is not a number");
    }

    // Digit strings too long for u16 are numbers, just out of range
    match code
        .parse::<u16>()
        .ok()
        .filter(|c| (200..=599).contains(c))
        .and_then(|c| StatusCode::from_u16(c).ok())
    {
        Some(status) => Response::empty(status),
        None => Response::error(
            StatusCode::BAD_REQUEST,
            format!("status code {code} is outside the range [200, 599]"),
        ),
    }
}

fn redirect(request: &Request) -> Response {
    let query = FlattenedMap::from_query(request.query());

    let Some(to) = query
        .get("to")
        .and_then(|v| v.first())
        .map(String::as_str)
        .filter(|to| !to.is_empty())
    else {
        return Response::error(StatusCode::BAD_REQUEST, "provide a `to` link in the URL");
    };
    let Ok(location) = HeaderValue::from_str(to) else {
        return Response::error(StatusCode::BAD_REQUEST, "the `to` link is not a valid header value");
    };

    let permanent = query
        .get("permanent")
        .and_then(|v| v.first())
        .is_some_and(|v| matches!(v.as_str(), "1" | "true"));
    let status = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };

    Response::redirect(status, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(Route::resolve("/get"), Some(Route::Get));
        assert_eq!(
            Route::resolve("/auth/basic/hello/w%20rld"),
            Some(Route::BasicAuth {
                user: "hello".to_string(),
                pass: "w rld".to_string()
            })
        );
        assert_eq!(
            Route::resolve("/status/418"),
            Some(Route::Status("418".to_string()))
        );
        assert_eq!(Route::resolve("/status/"), None);
        assert_eq!(Route::resolve("/auth/basic/only-user"), None);
        assert_eq!(Route::resolve("/nope"), None);
        assert_eq!(Route::resolve(""), None);
    }

    #[test]
    fn test_allowed_methods() {
        assert!(Route::Get.allows(&Method::GET));
        assert!(Route::Get.allows(&Method::HEAD));
        assert!(!Route::Get.allows(&Method::POST));
        assert!(Route::Post.allows(&Method::POST));
        assert!(!Route::Delete.allows(&Method::GET));
        assert!(Route::Status("200".into()).allows(&Method::OPTIONS));
    }

    #[test]
    fn test_status_codes() {
        for code in [200u16, 204, 301, 418, 500, 599] {
            let response = status(&code.to_string());
            assert_eq!(response.status().as_u16(), code);
            assert!(response.body().is_empty());
        }

        for code in ["42", "600", "1000", "65536", "4294967296", "99999999999"] {
            let response = status(code);
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                response.json_body().unwrap()["error"],
                format!("status code {code} is outside the range [200, 599]")
            );
        }

        let response = status("abc");
        assert_eq!(
            response.json_body().unwrap()["error"],
            "status code is not a number"
        );
    }
}
