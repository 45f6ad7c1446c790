use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use echobin::bench::{self, BenchTarget};
use echobin::security::RequestLimits;
use echobin::{EchoServerTrait, HttpServer, ServerConfig};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// httpbin-style HTTP echo server
#[derive(Parser)]
#[command(name = "echobin", version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Server options used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the echo server (default)
    Serve(ServeArgs),
    /// Time sequential GET requests against one or more echo services
    Bench {
        /// Targets as `http(s)://host[:port]/path`
        #[arg(required = true)]
        targets: Vec<String>,

        /// Timed requests per target
        #[arg(short = 'n', long, default_value_t = 100)]
        iterations: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Maximum concurrent connections
    #[arg(long, default_value_t = 1000)]
    max_connections: usize,

    /// Idle/read timeout in seconds
    #[arg(long, default_value_t = 30)]
    read_timeout: u64,

    /// Write timeout in seconds
    #[arg(long, default_value_t = 30)]
    write_timeout: u64,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = RequestLimits::default().max_body_size)]
    max_body_size: usize,

    /// Largest accepted request head in bytes
    #[arg(long, default_value_t = RequestLimits::default().max_head_size)]
    max_head_size: usize,

    /// Report the first X-Forwarded-For entry as the client origin
    #[arg(long, env = "TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,
}

impl ServeArgs {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            max_connections: self.max_connections,
            read_timeout: Duration::from_secs(self.read_timeout),
            write_timeout: Duration::from_secs(self.write_timeout),
            limits: RequestLimits {
                max_head_size: self.max_head_size,
                max_body_size: self.max_body_size,
            },
            trust_forwarded_for: self.trust_forwarded_for,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("echobin=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
        Some(Commands::Bench {
            targets,
            iterations,
            timeout,
        }) => run_bench(&targets, iterations, timeout).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.into_config();
    info!(
        address = %config.bind_addr,
        max_connections = config.max_connections,
        trust_forwarded_for = config.trust_forwarded_for,
        "Starting echo server"
    );

    let server = HttpServer::new(config);
    server.run().await.wrap_err("Failed to run echo server")
}

async fn run_bench(targets: &[String], iterations: usize, timeout: u64) -> Result<()> {
    let targets = targets
        .iter()
        .map(|t| BenchTarget::parse(t))
        .collect::<echobin::Result<Vec<_>>>()
        .wrap_err("Invalid benchmark target")?;

    let client = bench::client(Duration::from_secs(timeout))
        .wrap_err("Failed to build benchmark client")?;
    let summaries = bench::run(&targets, iterations, &client).await;

    for summary in &summaries {
        println!("{summary}");
    }

    if summaries.iter().all(|s| s.samples == 0) {
        return Err(eyre!("No target answered successfully"));
    }
    Ok(())
}
