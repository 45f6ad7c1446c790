use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use serde::Serialize;
use tracing::error;

/// An HTTP response ready to be written to a connection
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// A response with no body
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A response whose body is `value` serialized as JSON
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::empty(status)
                .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .with_body(body),
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// `{"error": message}`
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }
        Self::json(
            status,
            &ErrorBody {
                error: message.into(),
            },
        )
    }

    /// A bodiless redirect to `location`
    pub fn redirect(status: StatusCode, location: HeaderValue) -> Self {
        Self::empty(status).with_header(LOCATION, location)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parses the body back into JSON, mostly useful in tests
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Serializes status line, headers and (unless `head_only`) the body.
    ///
    /// `Content-Length` always reflects the full body so that `HEAD`
    /// answers match their `GET` counterparts. It is never sent with a 1xx
    /// or 204 status, and neither is a body.
    pub fn encode(&self, version: Version, keep_alive: bool, head_only: bool) -> BytesMut {
        let mut out = BytesMut::with_capacity(256 + self.body.len());

        let version = if version == Version::HTTP_10 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        };
        out.put_slice(
            format!(
                "{version} {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("Unknown")
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            if *name == CONTENT_LENGTH || *name == CONNECTION {
                continue;
            }
            out.put_slice(name.as_str().as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        let bodiless = self.status.is_informational() || self.status == StatusCode::NO_CONTENT;
        if !bodiless {
            out.put_slice(format!("content-length: {}\r\n", self.body.len()).as_bytes());
        }
        out.put_slice(if keep_alive {
            b"connection: keep-alive\r\n".as_slice()
        } else {
            b"connection: close\r\n".as_slice()
        });
        out.put_slice(b"\r\n");

        if !head_only && !bodiless {
            out.put_slice(&self.body);
        }
        out
    }
}
