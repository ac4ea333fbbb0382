//! Results of a load test run and the summary statistics derived from them.

use std::time::Duration;

use serde::Serialize;

/// Everything observed during one run.
///
/// Entries from different workers interleave in arrival order, which is not deterministic;
/// only the collection of values is meaningful.
#[derive(Debug, Default)]
pub struct LoadTestResult {
    /// One elapsed time per completed workload invocation.
    pub response_times: Vec<Duration>,
    /// One entry per invocation whose workload returned an error.
    pub errors: Vec<crate::Error>,
    /// Wall-clock time from the first worker launch until the last worker finished.
    pub elapsed: Duration,
}

impl LoadTestResult {
    pub fn completed(&self) -> usize {
        self.response_times.len()
    }

    pub fn success_count(&self) -> usize {
        self.response_times.len().saturating_sub(self.errors.len())
    }

    /// True when every requested invocation ran. A cancelled run reports fewer.
    pub fn is_complete(&self, total_requests: u64) -> bool {
        self.response_times.len() as u64 >= total_requests
    }

    pub fn summary(&self) -> LoadTestSummary {
        let mut sorted = self.response_times.clone();
        sorted.sort_unstable();

        let completed = sorted.len();
        let failed = self.errors.len();
        let error_rate = if completed > 0 {
            failed as f64 / completed as f64
        } else {
            0.0
        };

        let mean = mean(sorted.iter().sum(), completed);

        let secs = self.elapsed.as_secs_f64();
        let throughput = if secs > 0.0 {
            completed as f64 / secs
        } else {
            0.0
        };

        LoadTestSummary {
            completed,
            failed,
            error_rate,
            min: sorted.first().copied().unwrap_or_default(),
            max: sorted.last().copied().unwrap_or_default(),
            mean,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            elapsed: self.elapsed,
            throughput,
        }
    }
}

/// Latency and throughput figures for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LoadTestSummary {
    pub completed: usize,
    pub failed: usize,
    /// Failed invocations over completed invocations, 0.0 - 1.0.
    pub error_rate: f64,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub elapsed: Duration,
    /// Completed invocations per second of wall-clock time.
    pub throughput: f64,
}

fn mean(total: Duration, count: usize) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(count) => total / count,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

// Nearest-rank over an already sorted slice.
fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let upper = sorted.len() - 1;
    let index = ((pct / 100.0) * upper as f64).round() as usize;
    sorted[index.min(upper)]
}
