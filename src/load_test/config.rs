use std::env;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::error::{InvalidEnvVarSnafu, InvalidProfileSnafu, LoadTestError};

pub const WORKER_COUNT_ENV_VAR: &str = "TAZ_WORKER_COUNT";
pub const REQUESTS_PER_SECOND_ENV_VAR: &str = "TAZ_REQUESTS_PER_SECOND";
pub const TOTAL_REQUESTS_ENV_VAR: &str = "TAZ_TOTAL_REQUESTS";

/// The numeric part of a load test, loadable from JSON or the environment.
///
/// Missing fields deserialize to zero, which the run replaces with the defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadProfile {
    pub worker_count: u64,
    pub requests_per_second: u64,
    pub total_requests: u64,
}

impl LoadProfile {
    pub fn from_json(json: &str) -> Result<Self, LoadTestError> {
        serde_json::from_str(json).context(InvalidProfileSnafu)
    }

    /// Reads `TAZ_WORKER_COUNT`, `TAZ_REQUESTS_PER_SECOND` and `TAZ_TOTAL_REQUESTS`.
    ///
    /// Unset variables stay zero. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, LoadTestError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, LoadTestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> Result<u64, LoadTestError> {
            match lookup(name) {
                None => Ok(0),
                Some(value) => value.trim().parse::<u64>().map_err(|_| {
                    InvalidEnvVarSnafu {
                        name: name.to_string(),
                        value: value.clone(),
                    }
                    .build()
                }),
            }
        };

        Ok(Self {
            worker_count: read(WORKER_COUNT_ENV_VAR)?,
            requests_per_second: read(REQUESTS_PER_SECOND_ENV_VAR)?,
            total_requests: read(TOTAL_REQUESTS_ENV_VAR)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn json_with_missing_fields() {
        let profile = LoadProfile::from_json(r#"{"worker_count": 3}"#).unwrap();
        assert_eq!(
            profile,
            LoadProfile {
                worker_count: 3,
                requests_per_second: 0,
                total_requests: 0,
            }
        );
    }

    #[test]
    fn json_rejects_unknown_fields() {
        let err = LoadProfile::from_json(r#"{"workers": 3}"#).unwrap_err();
        assert!(matches!(err, LoadTestError::InvalidProfile { .. }));
    }

    #[test]
    fn json_rejects_negative_counts() {
        let err = LoadProfile::from_json(r#"{"total_requests": -1}"#).unwrap_err();
        assert!(matches!(err, LoadTestError::InvalidProfile { .. }));
    }

    #[test]
    fn env_reads_all_fields() {
        let profile = LoadProfile::from_lookup(lookup(&[
            (WORKER_COUNT_ENV_VAR, "2"),
            (REQUESTS_PER_SECOND_ENV_VAR, " 5 "),
            (TOTAL_REQUESTS_ENV_VAR, "10"),
        ]))
        .unwrap();
        assert_eq!(profile.worker_count, 2);
        assert_eq!(profile.requests_per_second, 5);
        assert_eq!(profile.total_requests, 10);
    }

    #[test]
    fn env_unset_is_zero() {
        let profile = LoadProfile::from_lookup(lookup(&[])).unwrap();
        assert_eq!(profile, LoadProfile::default());
    }

    #[test]
    fn env_rejects_garbage() {
        let err = LoadProfile::from_lookup(lookup(&[(TOTAL_REQUESTS_ENV_VAR, "lots")]))
            .unwrap_err();
        match err {
            LoadTestError::InvalidEnvVar { name, value } => {
                assert_eq!(name, TOTAL_REQUESTS_ENV_VAR);
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
