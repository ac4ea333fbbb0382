//! Dispatch a workload across paced, concurrent workers and collect its outcomes.

mod config;
mod error;
pub mod internal_event;
mod runner;
mod signal;
pub mod stats;

use std::{fmt, sync::Arc};

use bon::Builder;

pub use config::LoadProfile;
pub use error::{LoadTestError, WorkloadPanicked};
pub use runner::{partition_requests, request_interval, run_load_test};
pub use signal::CancelSignal;
pub use stats::{LoadTestResult, LoadTestSummary};

/// The operation under test.
///
/// Called with no arguments, once per request, from the blocking thread pool. `Ok` counts
/// as a success; every `Err` is kept verbatim in the run's result.
#[derive(Clone)]
pub struct Workload(Arc<dyn Fn() -> Result<(), crate::Error> + Send + Sync + 'static>);

impl Workload {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), crate::Error> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self) -> Result<(), crate::Error> {
        (self.0)()
    }
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Workload(..)")
    }
}

/// Configuration of a single load test run.
///
/// Any numeric field left at zero is replaced by its default when the run starts, so
/// zero never means "run nothing". The workload has no default: a run without one fails
/// with [`LoadTestError::MissingWorkload`].
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `worker_count` | 10 | Number of concurrent workers |
/// | `requests_per_second` | 10 | Pacing budget of each worker (not a global cap) |
/// | `total_requests` | 100 | Invocations split across all workers |
///
/// # Example
///
/// ```rust
/// use taz::load_test::{LoadTestSettings, Workload};
///
/// let settings = LoadTestSettings::builder()
///     .worker_count(2)
///     .requests_per_second(5)
///     .total_requests(10)
///     .workload(Workload::new(|| Ok(())))
///     .build();
/// assert_eq!(settings.get_total_requests(), 10);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct LoadTestSettings {
    /// Number of workers running concurrently.
    ///
    /// Workers beyond `total_requests` receive an empty share and exit immediately.
    #[builder(default)]
    pub(super) worker_count: u64,

    /// Pacing budget of each worker.
    ///
    /// After every call a worker waits `1s / requests_per_second` before its next one. The
    /// wait is per worker, so the aggregate rate approaches
    /// `worker_count * requests_per_second` for fast workloads.
    #[builder(default)]
    pub(super) requests_per_second: u64,

    /// Total invocations across all workers.
    #[builder(default)]
    pub(super) total_requests: u64,

    pub(super) workload: Option<Workload>,
}

const fn default_worker_count() -> u64 {
    10
}

const fn default_requests_per_second() -> u64 {
    10
}

const fn default_total_requests() -> u64 {
    100
}

impl Default for LoadTestSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            requests_per_second: default_requests_per_second(),
            total_requests: default_total_requests(),
            workload: None,
        }
    }
}

impl LoadTestSettings {
    /// Default settings running `f` as the workload.
    pub fn with_workload<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), crate::Error> + Send + Sync + 'static,
    {
        Self {
            workload: Some(Workload::new(f)),
            ..Self::default()
        }
    }

    pub fn from_profile(profile: LoadProfile, workload: Workload) -> Self {
        Self {
            worker_count: profile.worker_count,
            requests_per_second: profile.requests_per_second,
            total_requests: profile.total_requests,
            workload: Some(workload),
        }
    }

    /// Replaces every zero-valued numeric field with its default.
    pub fn normalized(mut self) -> Self {
        if self.requests_per_second == 0 {
            self.requests_per_second = default_requests_per_second();
        }
        if self.total_requests == 0 {
            self.total_requests = default_total_requests();
        }
        if self.worker_count == 0 {
            self.worker_count = default_worker_count();
        }
        self
    }

    pub fn get_worker_count(&self) -> u64 {
        self.worker_count
    }
    pub fn get_requests_per_second(&self) -> u64 {
        self.requests_per_second
    }
    pub fn get_total_requests(&self) -> u64 {
        self.total_requests
    }
    pub fn has_workload(&self) -> bool {
        self.workload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fields_take_defaults() {
        let settings = LoadTestSettings::builder().build().normalized();
        assert_eq!(settings.get_worker_count(), 10);
        assert_eq!(settings.get_requests_per_second(), 10);
        assert_eq!(settings.get_total_requests(), 100);
        assert!(!settings.has_workload());
    }

    #[test]
    fn explicit_fields_survive_normalization() {
        let settings = LoadTestSettings::builder()
            .worker_count(3)
            .requests_per_second(7)
            .total_requests(11)
            .workload(Workload::new(|| Ok(())))
            .build()
            .normalized();
        assert_eq!(settings.get_worker_count(), 3);
        assert_eq!(settings.get_requests_per_second(), 7);
        assert_eq!(settings.get_total_requests(), 11);
        assert!(settings.has_workload());
    }

    #[test]
    fn only_zero_fields_are_replaced() {
        let settings = LoadTestSettings::builder()
            .worker_count(0)
            .requests_per_second(50)
            .total_requests(0)
            .build()
            .normalized();
        assert_eq!(settings.get_worker_count(), 10);
        assert_eq!(settings.get_requests_per_second(), 50);
        assert_eq!(settings.get_total_requests(), 100);
    }

    #[test]
    fn default_matches_normalized_empty_builder() {
        let default = LoadTestSettings::default();
        let built = LoadTestSettings::builder().build().normalized();
        assert_eq!(default.get_worker_count(), built.get_worker_count());
        assert_eq!(
            default.get_requests_per_second(),
            built.get_requests_per_second()
        );
        assert_eq!(default.get_total_requests(), built.get_total_requests());
    }

    #[test]
    fn workload_call_passes_errors_through() {
        let workload = Workload::new(|| Err("boom".into()));
        let err = workload.call().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn settings_from_profile() {
        let profile = LoadProfile {
            worker_count: 4,
            requests_per_second: 2,
            total_requests: 9,
        };
        let settings = LoadTestSettings::from_profile(profile, Workload::new(|| Ok(())));
        assert_eq!(settings.get_worker_count(), 4);
        assert_eq!(settings.get_requests_per_second(), 2);
        assert_eq!(settings.get_total_requests(), 9);
        assert!(settings.has_workload());
    }
}
