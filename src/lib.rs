//! Paced, concurrent load generation against an arbitrary workload function.
//!
//! The harness splits a total request count across a fixed set of workers, has every
//! worker call the workload repeatedly with a fixed pause between calls, and collects the
//! latency and error of each call into a single [`load_test::LoadTestResult`].
//!
//! # Basic Usage
//! ```no_run
//! use taz::load_test::{LoadTestSettings, Workload, run_load_test};
//!
//! # async fn demo() -> Result<(), taz::load_test::LoadTestError> {
//! let settings = LoadTestSettings::builder()
//!     .worker_count(4)
//!     .requests_per_second(20)
//!     .total_requests(200)
//!     .workload(Workload::new(|| Ok(())))
//!     .build();
//!
//! let result = run_load_test(None, settings).await?;
//! println!("{:?}", result.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Pacing
//! `requests_per_second` is a per-worker budget: each worker waits
//! `1s / requests_per_second` after every call, so the aggregate rate approaches
//! `worker_count * requests_per_second` when the workload itself is fast.
//!
//! # Metrics
//! Emits `metrics` histograms and counters through whichever recorder the caller installs.
pub mod load_test;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
