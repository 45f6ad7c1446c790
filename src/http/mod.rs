//! HTTP/1.x serving and client plumbing
//!
//! This module reads requests off byte streams, writes responses back, and
//! provides a small keep-alive client used by the benchmark and the tests.

pub mod client;
pub mod protocol;
pub mod request;
pub mod response;

#[cfg(test)]
mod tests;

pub use client::{ClientConfig, ClientConfigBuilder, ClientRequest, ClientResponse, HttpClient};
pub use protocol::{HttpProtocolError, HttpStream};
pub use request::Request;
pub use response::Response;
