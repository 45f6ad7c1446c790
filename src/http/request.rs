use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use std::net::SocketAddr;

/// A fully read HTTP request
///
/// Produced by [`HttpStream::read_request`](super::protocol::HttpStream::read_request)
/// on the server side. Tests and benches build requests directly:
///
/// ```
/// use echobin::http::Request;
/// use http::Method;
///
/// let request = Request::new(Method::GET, "/get?a=1")
///     .with_header("host", "localhost:8080")
///     .with_body("ignored");
/// assert_eq!(request.path(), "/get");
/// assert_eq!(request.query(), Some("a=1"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let loopback: SocketAddr = ([127, 0, 0, 1], 0).into();
        Self {
            method,
            target: target.into(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer_addr: loopback,
            local_addr: loopback,
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        target: String,
        version: Version,
        headers: HeaderMap,
        body: Bytes,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        Self {
            method,
            target,
            version,
            headers,
            body,
            peer_addr,
            local_addr,
        }
    }

    /// Appends a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = addr;
        self
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = addr;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request target, path plus query string
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// The `Host` header, or the server's own address when the client sent none
    pub fn host(&self) -> String {
        self.header(HOST.as_str())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.local_addr.to_string())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the connection stays open after this exchange
    pub fn keep_alive(&self) -> bool {
        let connection = self.header(CONNECTION.as_str()).map(str::to_ascii_lowercase);
        let has = |token: &str| {
            connection
                .as_deref()
                .is_some_and(|c| c.split(',').any(|t| t.trim() == token))
        };

        match self.version {
            Version::HTTP_11 => !has("close"),
            _ => has("keep-alive"),
        }
    }
}
