use crate::Result;
use async_trait::async_trait;

/// Common interface for long-running servers
///
/// Implementors serve until [`EchoServerTrait::shutdown_signal`] fires or the
/// process receives ctrl-c.
#[async_trait]
pub trait EchoServerTrait {
    /// Starts the server and listens for connections
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}
