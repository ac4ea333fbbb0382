//! Telemetry emitted while a load test runs.
//!
//! Every event records through the `metrics` facade and logs under the
//! `taz::load_test::stats` target. Nothing is exported unless the caller installs a
//! metrics recorder or a tracing subscriber.

use std::time::Duration;

use metrics::{Counter, Gauge, Histogram, counter, gauge, histogram};

pub const RESPONSE_TIME_METRIC: &str = "load_test_response_time_seconds";
pub const REQUESTS_METRIC: &str = "load_test_requests_total";
pub const ERRORS_METRIC: &str = "load_test_errors_total";
pub const ACTIVE_WORKERS_METRIC: &str = "load_test_active_workers";

#[derive(Clone, Copy, Debug)]
pub struct LoadTestStartedData {
    pub worker_count: u64,
    pub requests_per_second: u64,
    pub total_requests: u64,
    pub request_interval: Duration,
}

pub struct LoadTestStarted;

impl LoadTestStarted {
    pub fn emit(data: LoadTestStartedData) {
        info!(
            target: "taz::load_test::stats",
            worker_count = data.worker_count,
            requests_per_second = data.requests_per_second,
            total_requests = data.total_requests,
            request_interval_us = data.request_interval.as_micros() as u64,
            "Load test started"
        );
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LoadTestFinishedData {
    pub total_requests: u64,
    pub completed: usize,
    pub failed: usize,
    pub failed_workers: usize,
    pub elapsed: Duration,
}

pub struct LoadTestFinished;

impl LoadTestFinished {
    pub fn emit(data: LoadTestFinishedData) {
        let cancelled = (data.completed as u64) < data.total_requests;
        info!(
            target: "taz::load_test::stats",
            total_requests = data.total_requests,
            completed = data.completed,
            failed = data.failed,
            failed_workers = data.failed_workers,
            elapsed_ms = data.elapsed.as_millis() as u64,
            cancelled,
            "Load test finished"
        );
    }
}

/// Per-invocation handles, registered once per worker.
pub struct InvocationRecorded {
    response_time: Histogram,
    requests: Counter,
    errors: Counter,
}

impl InvocationRecorded {
    pub fn register() -> Self {
        Self {
            response_time: histogram!(RESPONSE_TIME_METRIC),
            requests: counter!(REQUESTS_METRIC),
            errors: counter!(ERRORS_METRIC),
        }
    }

    pub fn emit(&self, worker_id: u64, elapsed: Duration, failed: bool) {
        self.response_time.record(elapsed);
        self.requests.increment(1);
        if failed {
            self.errors.increment(1);
        }
        trace!(
            target: "taz::load_test::stats",
            worker_id,
            elapsed_us = elapsed.as_micros() as u64,
            failed,
            "Invocation recorded"
        );
    }
}

/// Tracks how many workers are currently running.
pub struct ActiveWorkers {
    active: Gauge,
}

impl ActiveWorkers {
    pub fn register() -> Self {
        Self {
            active: gauge!(ACTIVE_WORKERS_METRIC),
        }
    }

    pub fn started(&self, worker_id: u64, share: u64) {
        self.active.increment(1.0);
        debug!(target: "taz::load_test::stats", worker_id, share, "Worker started");
    }

    pub fn stopped(&self, worker_id: u64, completed: u64, cancelled: bool) {
        self.active.decrement(1.0);
        debug!(
            target: "taz::load_test::stats",
            worker_id,
            completed,
            cancelled,
            "Worker stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;

    #[test]
    fn invocation_updates_counters_and_histogram() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let event = InvocationRecorded::register();
            event.emit(0, Duration::from_millis(20), false);
            event.emit(0, Duration::from_millis(40), true);
        });

        let mut requests = None;
        let mut errors = None;
        let mut samples = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            match (key.key().name(), value) {
                (REQUESTS_METRIC, DebugValue::Counter(v)) => requests = Some(v),
                (ERRORS_METRIC, DebugValue::Counter(v)) => errors = Some(v),
                (RESPONSE_TIME_METRIC, DebugValue::Histogram(v)) => samples = v.len(),
                _ => {}
            }
        }
        assert_eq!(requests, Some(2));
        assert_eq!(errors, Some(1));
        assert_eq!(samples, 2);
    }

    #[test]
    fn active_workers_returns_to_zero() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let workers = ActiveWorkers::register();
            workers.started(0, 5);
            workers.started(1, 5);
            workers.stopped(0, 5, false);
            workers.stopped(1, 2, true);
        });

        let gauge = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(v) if key.key().name() == ACTIVE_WORKERS_METRIC => Some(v),
                _ => None,
            });
        assert_eq!(gauge.map(|v| v.into_inner()), Some(0.0));
    }
}
