use crate::http::protocol::HttpProtocolError;
use thiserror::Error;

/// Error types for the echobin library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket-level errors (bind, accept, connect, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP framing errors on a connection
    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] HttpProtocolError),

    /// Outbound requests made by the benchmark
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A benchmark target answered with a non-2xx status
    #[error("Unexpected status {0}")]
    UnexpectedStatus(u16),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Unsupported operation errors
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for the echobin library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod bench;
pub mod common;
pub mod echo;
pub mod http;
pub mod security;
pub mod server;

// Re-export main types for convenience
pub use common::EchoServerTrait;
pub use echo::{DecodedBody, EchoApp, FlattenedMap, RequestDescriptor};
pub use http::{ClientConfig, HttpClient, Request, Response};
pub use server::{HttpServer, ServerConfig};
