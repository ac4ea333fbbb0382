use std::time::{Duration, Instant};

use futures::future::join_all;
use snafu::{OptionExt, ResultExt};
use tokio::{sync::mpsc, task::JoinError};

use super::{
    CancelSignal, LoadTestSettings, Workload,
    error::{AggregatorJoinSnafu, LoadTestError, MissingWorkloadSnafu, WorkloadPanicked},
    internal_event::{
        ActiveWorkers, InvocationRecorded, LoadTestFinished, LoadTestFinishedData,
        LoadTestStarted, LoadTestStartedData,
    },
    stats::LoadTestResult,
};

const NANOS_PER_SEC: u64 = 1_000_000_000;
// Upper bound on the response time buffer reserved up front.
const MAX_PREALLOCATED_OUTCOMES: u64 = 1 << 16;

/// The pause each worker takes after every invocation.
pub fn request_interval(requests_per_second: u64) -> Duration {
    Duration::from_nanos(NANOS_PER_SEC / requests_per_second.max(1))
}

/// Splits `total_requests` into `worker_count` shares.
///
/// Every worker gets `total / workers`; the first `total % workers` workers get one more.
/// Shares always sum to `total_requests`.
pub fn partition_requests(total_requests: u64, worker_count: u64) -> Vec<u64> {
    (0..worker_count)
        .map(|worker_id| worker_share(total_requests, worker_count, worker_id))
        .collect()
}

/// The share of `worker_id` under [`partition_requests`], without materializing the rest.
pub fn worker_share(total_requests: u64, worker_count: u64, worker_id: u64) -> u64 {
    if worker_count == 0 || worker_id >= worker_count {
        return 0;
    }
    total_requests / worker_count + u64::from(worker_id < total_requests % worker_count)
}

/// Runs a load test to completion or until `signal` fires.
///
/// Zero-valued settings take their defaults first. A missing workload fails with
/// [`LoadTestError::MissingWorkload`] before any worker is spawned. When `signal` is
/// `None` the run cannot be cancelled.
///
/// Cancellation is not an error: the returned result simply holds fewer than
/// `total_requests` response times. Workload failures never stop the run; each one is
/// stored in [`LoadTestResult::errors`]. A worker task that dies outside the workload call
/// is logged and its outcomes so far are kept; the run still returns `Ok`.
pub async fn run_load_test(
    signal: Option<CancelSignal>,
    settings: LoadTestSettings,
) -> Result<LoadTestResult, LoadTestError> {
    let settings = settings.normalized();
    let workload = settings.workload.clone().context(MissingWorkloadSnafu)?;
    let signal = signal.unwrap_or_else(CancelSignal::never);

    let interval = request_interval(settings.requests_per_second);

    LoadTestStarted::emit(LoadTestStartedData {
        worker_count: settings.worker_count,
        requests_per_second: settings.requests_per_second,
        total_requests: settings.total_requests,
        request_interval: interval,
    });

    let started_at = Instant::now();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let aggregator = tokio::spawn(aggregate(outcome_rx, settings.total_requests));

    let workers = (0..settings.worker_count)
        .map(|worker_id| {
            let worker = Worker {
                id: worker_id,
                share: worker_share(settings.total_requests, settings.worker_count, worker_id),
                interval,
                workload: workload.clone(),
                signal: signal.clone(),
                outcome_tx: outcome_tx.clone(),
            };
            tokio::spawn(worker.run())
        })
        .collect::<Vec<_>>();
    // Workers hold the remaining senders; the aggregator ends when the last one exits.
    drop(outcome_tx);

    let failed_workers = log_worker_exits(join_all(workers).await);

    let mut result = aggregator.await.context(AggregatorJoinSnafu)?;
    result.elapsed = started_at.elapsed();

    LoadTestFinished::emit(LoadTestFinishedData {
        total_requests: settings.total_requests,
        completed: result.response_times.len(),
        failed: result.errors.len(),
        failed_workers,
        elapsed: result.elapsed,
    });

    Ok(result)
}

/// A single observation, sent to the aggregator right after the call returns.
struct Outcome {
    elapsed: Duration,
    error: Option<crate::Error>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WorkerExit {
    Exhausted,
    Cancelled,
}

struct Worker {
    id: u64,
    share: u64,
    interval: Duration,
    workload: Workload,
    signal: CancelSignal,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
}

impl Worker {
    async fn run(self) -> WorkerExit {
        let events = InvocationRecorded::register();
        let active = ActiveWorkers::register();
        active.started(self.id, self.share);

        let mut completed = 0;
        let exit = loop {
            if completed == self.share {
                break WorkerExit::Exhausted;
            }
            if self.signal.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let start = Instant::now();
            if self.signal.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            let error = self.invoke().await.err();
            let elapsed = start.elapsed();
            completed += 1;

            events.emit(self.id, elapsed, error.is_some());
            if self.outcome_tx.send(Outcome { elapsed, error }).is_err() {
                // Aggregator is gone; nothing left to report to.
                break WorkerExit::Cancelled;
            }

            if completed < self.share && !self.interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = self.signal.cancelled() => {}
                }
            }
        };

        active.stopped(self.id, completed, exit == WorkerExit::Cancelled);
        exit
    }

    /// Runs the workload on the blocking pool and waits for it to finish.
    ///
    /// The call itself is never interrupted, even if the signal fires while it runs.
    async fn invoke(&self) -> Result<(), crate::Error> {
        let workload = self.workload.clone();
        match tokio::task::spawn_blocking(move || workload.call()).await {
            Ok(result) => result,
            Err(join_error) => {
                let panicked = WorkloadPanicked::from_join_error(join_error);
                warn!(message = "Workload panicked.", worker_id = self.id, error = %panicked);
                Err(panicked.into())
            }
        }
    }
}

/// Logs how every worker ended and returns how many died outside the workload call.
fn log_worker_exits(joined: Vec<Result<WorkerExit, JoinError>>) -> usize {
    let mut failed = 0;
    for (worker_id, exit) in joined.into_iter().enumerate() {
        match exit {
            Ok(exit) => trace!(worker_id, ?exit, "Worker joined."),
            Err(error) => {
                failed += 1;
                error!(
                    message = "Load test worker failed; keeping its outcomes so far.",
                    worker_id,
                    %error
                );
            }
        }
    }
    failed
}

/// Sole owner of the result collections while the run is in progress.
async fn aggregate(
    mut outcomes: mpsc::UnboundedReceiver<Outcome>,
    total_requests: u64,
) -> LoadTestResult {
    let mut result = LoadTestResult {
        response_times: Vec::with_capacity(
            total_requests.min(MAX_PREALLOCATED_OUTCOMES) as usize,
        ),
        ..Default::default()
    };
    while let Some(outcome) = outcomes.recv().await {
        if let Some(error) = outcome.error {
            result.errors.push(error);
        }
        result.response_times.push(outcome.elapsed);
    }
    result
}
