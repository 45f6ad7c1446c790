use crate::security::RequestLimits;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the echo HTTP server
///
/// # Examples
///
/// ```rust
/// use echobin::server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     max_connections: 100,
///     read_timeout: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert!(!config.trust_forwarded_for);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// How long to wait for the next request on a connection
    pub read_timeout: Duration,
    /// Write timeout for responses
    pub write_timeout: Duration,
    /// Request head and body size limits
    pub limits: RequestLimits,
    /// Report the first `X-Forwarded-For` entry as the client origin
    pub trust_forwarded_for: bool,
    /// `Server` header value added to responses (optional)
    pub server_name: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 100,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            limits: RequestLimits::default(),
            trust_forwarded_for: false,
            server_name: Some(concat!("echobin/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}
