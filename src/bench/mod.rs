//! Sequential latency benchmark against one or more echo services
//!
//! Each target gets one warm-up request followed by `iterations` timed GET
//! requests. Targets may be plain http (this server) or https (hosted echo
//! services), so requests go through a pooled `reqwest` client. A failed
//! request, including a failed DNS lookup, is counted against its target and
//! the run moves on.

pub mod latency;

pub use latency::LatencySummary;

use crate::{EchoError, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// An http or https endpoint to benchmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchTarget {
    /// The target as given by the user
    pub label: String,
    pub url: Url,
}

impl BenchTarget {
    /// Parses `http(s)://host[:port]/path`; a missing scheme means `http`
    pub fn parse(input: &str) -> Result<Self> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{input}")
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| EchoError::Config(format!("Invalid target {input:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EchoError::Unsupported(format!(
                "Only http and https targets are supported, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(EchoError::Config(format!("Target {input:?} has no host")));
        }

        Ok(Self {
            label: input.to_string(),
            url,
        })
    }
}

/// Builds the pooled client shared by every target
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("echobin-bench/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Benchmarks every target in turn and returns one summary per target
pub async fn run(
    targets: &[BenchTarget],
    iterations: usize,
    client: &reqwest::Client,
) -> Vec<LatencySummary> {
    let mut summaries = Vec::with_capacity(targets.len());
    for target in targets {
        let summary = run_target(target, iterations, client).await;
        info!(
            target = %target.label,
            samples = summary.samples,
            failures = summary.failures,
            "Target finished"
        );
        summaries.push(summary);
    }
    summaries
}

async fn run_target(
    target: &BenchTarget,
    iterations: usize,
    client: &reqwest::Client,
) -> LatencySummary {
    info!(target = %target.label, url = %target.url, iterations, "Benchmarking target");

    let mut samples = Vec::with_capacity(iterations);
    let mut failures = 0;

    // Warm-up: resolves and connects, not timed
    if let Err(e) = send_once(client, &target.url).await {
        warn!(target = %target.label, error = %e, "Warm-up request failed");
    }

    for i in 0..iterations {
        let start = Instant::now();
        match send_once(client, &target.url).await {
            Ok(()) => samples.push(start.elapsed()),
            Err(e) => {
                failures += 1;
                debug!(target = %target.label, iteration = i, error = %e, "Request failed");
            }
        }

        if (i + 1) % 100 == 0 {
            debug!(target = %target.label, completed = i + 1, "Progress");
        }
    }

    LatencySummary::from_samples(target.label.clone(), samples, failures)
}

/// Sends one GET and drains the body
async fn send_once(client: &reqwest::Client, url: &Url) -> Result<()> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    response.bytes().await?;

    if !status.is_success() {
        return Err(EchoError::UnexpectedStatus(status.as_u16()));
    }
    Ok(())
}
