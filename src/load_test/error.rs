use snafu::Snafu;

/// Errors that stop a load test from running or from finishing cleanly.
///
/// Failures returned by the workload itself are not represented here; those are
/// collected into [`super::LoadTestResult::errors`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadTestError {
    /// The settings carry no workload to invoke.
    #[snafu(display("must provide a workload in the load test settings"))]
    MissingWorkload,

    /// The task collecting outcomes did not finish.
    #[snafu(display("load test aggregator failed to join: {}", source))]
    AggregatorJoin { source: tokio::task::JoinError },

    #[snafu(display("invalid load profile: {}", source))]
    InvalidProfile { source: serde_json::Error },

    #[snafu(display("environment variable {} has invalid value {:?}", name, value))]
    InvalidEnvVar { name: String, value: String },
}

/// Recorded in place of a workload error when the workload panics.
#[derive(Debug, Snafu)]
#[snafu(display("workload panicked: {}", message))]
pub struct WorkloadPanicked {
    pub message: String,
}

impl WorkloadPanicked {
    pub(crate) fn from_join_error(error: tokio::task::JoinError) -> Self {
        let message = if error.is_panic() {
            let payload = error.into_panic();
            if let Some(s) = payload.downcast_ref::<&'static str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            }
        } else {
            error.to_string()
        };
        WorkloadPanickedSnafu { message }.build()
    }
}
