//! TCP listener and per-connection request loop
//!
//! One task per accepted connection; requests on a connection are handled
//! one after another with keep-alive.

pub mod config;
#[allow(clippy::module_inception)]
pub mod server;

#[cfg(test)]
mod tests;

pub use config::ServerConfig;
pub use server::HttpServer;
