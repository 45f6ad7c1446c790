use crate::server::{HttpServer, ServerConfig};
use crate::{EchoError, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Handle to a server started by [`spawn_test_server`]
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<()>>,
    pub shutdown: broadcast::Sender<()>,
}

impl TestServer {
    /// Signals shutdown and waits for the accept loop to exit
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .map_err(|e| EchoError::Config(format!("Server task failed: {e}")))?
    }
}

/// Starts an echo server on an ephemeral localhost port
///
/// The listener is bound before the accept loop is spawned, so the returned
/// address accepts connections immediately.
pub async fn spawn_test_server(mut config: ServerConfig) -> Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| EchoError::Config(format!("Failed to bind listener: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| EchoError::Config(format!("Failed to get local address: {e}")))?;
    config.bind_addr = addr;

    let server = HttpServer::new(config);
    let shutdown = crate::common::EchoServerTrait::shutdown_signal(&server);
    let handle = tokio::spawn(async move { server.serve(listener).await });

    Ok(TestServer {
        addr,
        handle,
        shutdown,
    })
}
