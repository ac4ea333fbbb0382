// Drives a load test from environment configuration.
//
// With `TAZ_TARGET_URL` set, every request is a GET against that URL; any transport error
// or non-2xx status counts as a failure. Without it, a synthetic workload sleeps for a
// random 5-50ms and fails with probability `TAZ_FAILURE_RATE` (default 0.05).
//
// Worker count, rate and total come from `TAZ_WORKER_COUNT`, `TAZ_REQUESTS_PER_SECOND` and
// `TAZ_TOTAL_REQUESTS` (a `.env` file is honoured). `TAZ_TIMEOUT_SECS` bounds the run and
// Ctrl-C stops it early; either way the partial results are summarised.

use std::{env, time::Duration};

use rand::Rng;
use taz::load_test::{CancelSignal, LoadProfile, LoadTestSettings, Workload, run_load_test};
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TARGET_URL_ENV_VAR: &str = "TAZ_TARGET_URL";
const TIMEOUT_SECS_ENV_VAR: &str = "TAZ_TIMEOUT_SECS";
const FAILURE_RATE_ENV_VAR: &str = "TAZ_FAILURE_RATE";
const LOG_FILE_NAME: &str = "http_probe.log";

fn http_workload(url: String) -> Workload {
    let client = reqwest::Client::new();
    let handle = Handle::current();
    Workload::new(move || {
        // Runs on the blocking pool, so blocking on the runtime handle is allowed here.
        handle.block_on(async {
            client.get(&url).send().await?.error_for_status()?;
            Ok::<(), taz::Error>(())
        })
    })
}

fn synthetic_workload(failure_rate: f64) -> Workload {
    Workload::new(move || {
        let mut rng = rand::rng();
        std::thread::sleep(Duration::from_millis(rng.random_range(5..=50)));
        if rng.random_bool(failure_rate) {
            Err("synthetic failure".into())
        } else {
            Ok(())
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let file_appender = tracing_appender::rolling::daily(".", LOG_FILE_NAME);
    let (non_blocking_appender, _guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = "info,taz::load_test::stats=debug";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_level(true);
    let file_layer = fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    dotenvy::dotenv().ok();

    let profile = LoadProfile::from_env()?;
    let workload = match env::var(TARGET_URL_ENV_VAR) {
        Ok(url) => {
            info!(%url, "Probing target URL");
            http_workload(url)
        }
        Err(_) => {
            let failure_rate = env::var(FAILURE_RATE_ENV_VAR)
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.05)
                .clamp(0.0, 1.0);
            info!(failure_rate, "No target URL set, using synthetic workload");
            synthetic_workload(failure_rate)
        }
    };

    let mut signal = CancelSignal::new();
    if let Some(secs) = env::var(TIMEOUT_SECS_ENV_VAR)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        signal = signal.with_timeout(Duration::from_secs(secs));
    }

    let ctrl_c = {
        let signal = signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping load test");
                signal.cancel();
            }
        })
    };

    let settings = LoadTestSettings::from_profile(profile, workload).normalized();
    let total_requests = settings.get_total_requests();
    let result = run_load_test(Some(signal), settings).await?;
    ctrl_c.abort();

    if !result.is_complete(total_requests) {
        warn!(
            completed = result.completed(),
            total_requests, "Load test stopped before every request ran"
        );
    }
    for error in result.errors.iter().take(5) {
        warn!(%error, "Sample workload error");
    }

    println!("{}", serde_json::to_string_pretty(&result.summary())?);
    Ok(())
}
