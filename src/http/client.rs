use crate::{EchoError, Result};
use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};

const MAX_RESPONSE_HEADERS: usize = 64;

/// Configuration for HTTP clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Read timeout for operations
    pub read_timeout: Duration,
    /// Write timeout for operations
    pub write_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Buffer size for reading data
    pub buffer_size: usize,
    /// Maximum response size to prevent memory exhaustion
    pub max_response_size: usize,
    /// `Host` header sent with every request, defaults to the peer address
    pub host: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 8192,
            max_response_size: 10 * 1024 * 1024, // 10MB
            host: None,
        }
    }
}

/// A request to send with [`HttpClient::send`]
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: Method,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ClientRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// A response read by [`HttpClient::send`]
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Minimal HTTP/1.1 client holding one keep-alive connection
///
/// # Examples
///
/// ```no_run
/// use echobin::http::{ClientRequest, HttpClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let addr = "127.0.0.1:8080".parse()?;
///     let mut client = HttpClient::connect(addr).await?;
///
///     let response = client.send(&ClientRequest::get("/get?hello=world")).await?;
///     println!("{} {}", response.status, response.json()?);
///     Ok(())
/// }
/// ```
pub struct HttpClient {
    stream: TcpStream,
    addr: SocketAddr,
    buffer: BytesMut,
    config: ClientConfig,
    last_activity: Instant,
}

impl HttpClient {
    /// Connect to a server with custom configuration
    pub async fn connect_with_config(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| EchoError::Timeout("Connection timeout".to_string()))??;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(config.buffer_size),
            config,
            last_activity: Instant::now(),
        })
    }

    /// Connect with default configuration
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Check if the client has been idle for too long
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        self.last_activity.elapsed() > max_idle
    }

    /// Get client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `request` and reads the complete response
    pub async fn send(&mut self, request: &ClientRequest) -> Result<ClientResponse> {
        self.last_activity = Instant::now();

        let encoded = self.encode_request(request);
        timeout(self.config.write_timeout, async {
            self.stream.write_all(&encoded).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| EchoError::Timeout("Write timeout".to_string()))??;

        let response = timeout(self.config.read_timeout, self.read_response(&request.method))
            .await
            .map_err(|_| EchoError::Timeout("Read timeout".to_string()))??;

        self.last_activity = Instant::now();
        Ok(response)
    }

    fn encode_request(&self, request: &ClientRequest) -> Vec<u8> {
        let mut out = format!("{} {} HTTP/1.1\r\n", request.method, request.target);

        if !request.has_header("host") {
            let host = self
                .config
                .host
                .clone()
                .unwrap_or_else(|| self.addr.to_string());
            out.push_str(&format!("host: {host}\r\n"));
        }
        for (name, value) in &request.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        if !request.body.is_empty() && !request.has_header("content-length") {
            out.push_str(&format!("content-length: {}\r\n", request.body.len()));
        }
        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&request.body);
        bytes
    }

    async fn read_response(&mut self, method: &Method) -> Result<ClientResponse> {
        let (status, headers) = loop {
            if let Some(head) = self.parse_head()? {
                break head;
            }
            self.fill().await?;
        };

        let bodiless = *method == Method::HEAD
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED;

        let length = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());

        let body = match (bodiless, length) {
            (true, _) => Bytes::new(),
            (false, Some(length)) => {
                self.check_size(length)?;
                while self.buffer.len() < length {
                    self.fill().await?;
                }
                self.buffer.split_to(length).freeze()
            }
            (false, None) => {
                // Body delimited by connection close
                loop {
                    let n = self.fill_raw().await?;
                    if n == 0 {
                        break;
                    }
                    self.check_size(self.buffer.len())?;
                }
                self.buffer.split().freeze()
            }
        };

        if status.is_informational() {
            return Box::pin(self.read_response(method)).await;
        }

        Ok(ClientResponse {
            status,
            headers,
            body,
        })
    }

    fn parse_head(&mut self) -> Result<Option<(StatusCode, HeaderMap)>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
        let mut response = httparse::Response::new(&mut headers);
        let parsed_len = match response.parse(&self.buffer) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(EchoError::Config(format!("Invalid HTTP response: {e}"))),
        };

        let status = response
            .code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| EchoError::Config("Invalid HTTP status code".to_string()))?;

        let mut header_map = HeaderMap::with_capacity(response.headers.len());
        for header in response.headers.iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(header.name.as_bytes()),
                HeaderValue::from_bytes(header.value),
            ) {
                header_map.append(name, value);
            }
        }

        self.buffer.advance(parsed_len);
        Ok(Some((status, header_map)))
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.config.max_response_size {
            return Err(EchoError::Config(format!(
                "Response too large: {} bytes, max allowed: {}",
                size, self.config.max_response_size
            )));
        }
        Ok(())
    }

    async fn fill_raw(&mut self) -> Result<usize> {
        self.buffer.reserve(self.config.buffer_size);
        Ok(self.stream.read_buf(&mut self.buffer).await?)
    }

    async fn fill(&mut self) -> Result<()> {
        if self.fill_raw().await? == 0 {
            return Err(EchoError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Connection closed mid-response",
            )));
        }
        Ok(())
    }
}

/// Builder for client configuration
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfigBuilder::new()
            .read_timeout(Duration::from_secs(60))
            .write_timeout(Duration::from_secs(30))
            .buffer_size(2048)
            .max_response_size(1024 * 1024)
            .host("example.com")
            .build();

        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.write_timeout, Duration::from_secs(30));
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.max_response_size, 1024 * 1024);
        assert_eq!(config.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_client_request_builder() {
        let request = ClientRequest::new(Method::POST, "/post")
            .header("Content-Type", "text/plain")
            .body("hi");

        assert!(request.has_header("content-type"));
        assert!(!request.has_header("host"));
        assert_eq!(request.body, Bytes::from_static(b"hi"));
    }
}
