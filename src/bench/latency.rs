use std::fmt;
use std::time::Duration;

/// Latency statistics for one benchmark target
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub target: String,
    pub samples: usize,
    pub failures: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
}

impl LatencySummary {
    /// Summarizes `samples`; all durations are zero when nothing succeeded
    pub fn from_samples(target: impl Into<String>, mut samples: Vec<Duration>, failures: usize) -> Self {
        samples.sort_unstable();

        let total: Duration = samples.iter().sum();
        let mean = u32::try_from(samples.len())
            .ok()
            .filter(|&n| n > 0)
            .map(|n| total / n)
            .unwrap_or_default();

        Self {
            target: target.into(),
            samples: samples.len(),
            failures,
            min: samples.first().copied().unwrap_or_default(),
            max: samples.last().copied().unwrap_or_default(),
            mean,
            p50: percentile(&samples, 50),
            p95: percentile(&samples, 95),
        }
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ok, {} failed, min {:.2}ms, mean {:.2}ms, p50 {:.2}ms, p95 {:.2}ms, max {:.2}ms",
            self.target,
            self.samples,
            self.failures,
            millis(self.min),
            millis(self.mean),
            millis(self.p50),
            millis(self.p95),
            millis(self.max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_summary_statistics() {
        let samples = (1..=20).rev().map(ms).collect();
        let summary = LatencySummary::from_samples("local", samples, 2);

        assert_eq!(summary.samples, 20);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.min, ms(1));
        assert_eq!(summary.max, ms(20));
        assert_eq!(summary.mean, Duration::from_micros(10_500));
        assert_eq!(summary.p50, ms(10));
        assert_eq!(summary.p95, ms(19));
    }

    #[test]
    fn test_single_sample() {
        let summary = LatencySummary::from_samples("one", vec![ms(7)], 0);
        assert_eq!(summary.p50, ms(7));
        assert_eq!(summary.p95, ms(7));
        assert_eq!(summary.mean, ms(7));
    }

    #[test]
    fn test_no_samples() {
        let summary = LatencySummary::from_samples("down", Vec::new(), 5);
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.mean, Duration::ZERO);
        assert_eq!(summary.p95, Duration::ZERO);
    }

    #[test]
    fn test_display() {
        let summary = LatencySummary::from_samples("local", vec![ms(1), ms(3)], 0);
        assert_eq!(
            summary.to_string(),
            "local: 2 ok, 0 failed, min 1.00ms, mean 2.00ms, p50 1.00ms, p95 3.00ms, max 3.00ms"
        );
    }
}
