use super::ServerConfig;
use crate::common::EchoServerTrait;
use crate::echo::EchoApp;
use crate::http::HttpStream;
use crate::security::ConnectionTracker;
use crate::{EchoError, Result};
use async_trait::async_trait;
use http::header::SERVER;
use http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, time::timeout};
use tracing::{Instrument, debug, error, info, warn};

/// HTTP/1.x server running an [`EchoApp`] on every request
///
/// # Examples
///
/// ```no_run
/// use echobin::server::{HttpServer, ServerConfig};
/// use echobin::common::EchoServerTrait;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig {
///         bind_addr: "127.0.0.1:8080".parse()?,
///         ..Default::default()
///     };
///
///     let server = HttpServer::new(config);
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpServer {
    config: Arc<ServerConfig>,
    app: Arc<EchoApp>,
    tracker: Arc<ConnectionTracker>,
    shutdown_signal: tokio::sync::broadcast::Sender<()>,
}

impl HttpServer {
    /// Creates a server with the default echo application for `config`
    pub fn new(config: ServerConfig) -> Self {
        let app = EchoApp::from_config(&config);
        Self::with_app(config, app)
    }

    /// Creates a server running a custom application
    pub fn with_app(config: ServerConfig, app: EchoApp) -> Self {
        let (shutdown_signal, _) = tokio::sync::broadcast::channel(1);
        Self {
            tracker: Arc::new(ConnectionTracker::new(config.max_connections)),
            config: Arc::new(config),
            app: Arc::new(app),
            shutdown_signal,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.tracker
    }

    /// Binds the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Accepts connections on `listener` until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Echo server listening");

        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("Echo server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let guard = match self.tracker.try_acquire() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(%addr, error = %e, "Connection rejected");
                return;
            }
        };

        let current = self.tracker.metrics().active_connections;
        debug!(%addr, current, "Accepted connection");

        let config = Arc::clone(&self.config);
        let app = Arc::clone(&self.app);
        let span = tracing::info_span!("connection", %addr);

        tokio::spawn(
            async move {
                if let Err(e) = handle_connection(stream, addr, config, app).await {
                    error!(%addr, error = %e, "Error handling connection");
                }
                drop(guard);
                debug!(%addr, "Connection closed");
            }
            .instrument(span),
        );
    }
}

/// Serves requests on one connection until it closes, times out or errors
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    app: Arc<EchoApp>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let local_addr = stream.local_addr()?;
    let mut conn = HttpStream::new(stream, addr, local_addr);
    let server_name = config
        .server_name
        .as_deref()
        .and_then(|name| HeaderValue::from_str(name).ok());

    loop {
        let request = match timeout(config.read_timeout, conn.read_request(&config.limits)).await {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                debug!(%addr, "Client closed connection");
                break;
            }
            Ok(Err(e)) => {
                if let Some(response) = e.to_response() {
                    warn!(%addr, error = %e, status = response.status().as_u16(), "Rejected request");
                    let written = timeout(
                        config.write_timeout,
                        conn.write_response(&response, http::Version::HTTP_11, false, false),
                    )
                    .await;
                    if !matches!(written, Ok(Ok(()))) {
                        debug!(%addr, "Failed to deliver error response");
                    }
                    break;
                }
                return Err(e.into());
            }
            Err(_) => {
                debug!(%addr, "Read timeout");
                break;
            }
        };

        let keep_alive = request.keep_alive();
        let head_only = *request.method() == Method::HEAD;

        let mut response = app.handle(&request);
        if let Some(name) = &server_name {
            response.headers_mut().insert(SERVER, name.clone());
        }

        info!(
            %addr,
            method = %request.method(),
            target = %request.target(),
            status = response.status().as_u16(),
            response_time = response.header("x-response-time").unwrap_or_default(),
            "Handled request"
        );

        match timeout(
            config.write_timeout,
            conn.write_response(&response, request.version(), keep_alive, head_only),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(%addr, "Write timeout");
                return Err(EchoError::Timeout("Write timeout".to_string()));
            }
        }

        if !keep_alive {
            break;
        }
    }

    Ok(())
}

#[async_trait]
impl EchoServerTrait for HttpServer {
    /// Binds the configured address and serves until shutdown
    async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.clone()
    }
}
