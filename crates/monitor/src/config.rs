use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use jobwatch_core::catalog::JobCatalog;
use jobwatch_core::error::CoreError;
use jobwatch_health::HealthConfig;
use jobwatch_tracker::{TimeoutPolicy, TrackerConfig};

pub const DEFAULT_ENGINE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub engine_api_url: String,
    pub engine_api_key: Option<String>,
    /// Base for launch paths; defaults to `engine_api_url`.
    pub engine_webhook_url: Option<String>,
    /// Upper bound on every engine request, launch and listing alike.
    pub engine_request_timeout: Duration,
    pub catalog_path: PathBuf,
    /// Enables the result-summary store when set.
    pub database_url: Option<String>,
    /// Job keys launched once at startup.
    pub launch_on_start: Vec<String>,
    pub tracker: TrackerConfig,
    pub health: HealthConfig,
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default              |
    /// |------------------------------|----------------------|
    /// | `ENGINE_API_URL`             | required             |
    /// | `ENGINE_API_KEY`             | unset                |
    /// | `ENGINE_WEBHOOK_URL`         | `ENGINE_API_URL`     |
    /// | `ENGINE_REQUEST_TIMEOUT_SECS` | `30`             |
    /// | `JOB_CATALOG_PATH`           | `job_catalog.json`   |
    /// | `DATABASE_URL`               | unset                |
    /// | `LAUNCH_ON_START`            | unset                |
    /// | `TRACKER_TICK_INTERVAL_MS`   | `1000`               |
    /// | `TRACKER_POLL_CEILING`       | `120`                |
    /// | `TRACKER_CORRELATION_EVERY`  | `3`                  |
    /// | `TRACKER_CORRELATION_WINDOW` | `10`                 |
    /// | `TRACKER_TIMEOUT_POLICY`     | `assume_succeeded`   |
    /// | `HEALTH_HISTORY_WINDOW`      | `100`                |
    /// | `HEALTH_INTERVAL_SECS`       | `300`                |
    /// | `HEALTH_STALE_AFTER_DAYS`    | `7`                  |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let engine_api_url = var("ENGINE_API_URL")
            .ok_or_else(|| CoreError::Config("ENGINE_API_URL must be set".into()))?;

        let engine_request_timeout = Duration::from_secs(parse_or(
            &var,
            "ENGINE_REQUEST_TIMEOUT_SECS",
            DEFAULT_ENGINE_REQUEST_TIMEOUT_SECS,
        )?);
        if engine_request_timeout.is_zero() {
            return Err(CoreError::Config(
                "ENGINE_REQUEST_TIMEOUT_SECS must be positive".into(),
            ));
        }

        let tracker_defaults = TrackerConfig::default();
        let tracker = TrackerConfig {
            tick_interval: Duration::from_millis(parse_or(
                &var,
                "TRACKER_TICK_INTERVAL_MS",
                tracker_defaults.tick_interval.as_millis() as u64,
            )?),
            poll_ceiling: parse_or(&var, "TRACKER_POLL_CEILING", tracker_defaults.poll_ceiling)?,
            correlate_every: parse_or(
                &var,
                "TRACKER_CORRELATION_EVERY",
                tracker_defaults.correlate_every,
            )?,
            correlation_window: parse_or(
                &var,
                "TRACKER_CORRELATION_WINDOW",
                tracker_defaults.correlation_window,
            )?,
            timeout_policy: match var("TRACKER_TIMEOUT_POLICY") {
                Some(v) => TimeoutPolicy::parse(v.trim())?,
                None => tracker_defaults.timeout_policy,
            },
            ..tracker_defaults
        };
        tracker.validate()?;

        let health_defaults = HealthConfig::default();
        let health = HealthConfig {
            history_window: parse_or(
                &var,
                "HEALTH_HISTORY_WINDOW",
                health_defaults.history_window,
            )?,
            interval: Duration::from_secs(parse_or(
                &var,
                "HEALTH_INTERVAL_SECS",
                health_defaults.interval.as_secs(),
            )?),
            stale_after_days: parse_or(
                &var,
                "HEALTH_STALE_AFTER_DAYS",
                health_defaults.stale_after_days,
            )?,
            ..health_defaults
        };
        health.validate()?;

        let launch_on_start = var("LAUNCH_ON_START")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            engine_api_url,
            engine_api_key: var("ENGINE_API_KEY"),
            engine_webhook_url: var("ENGINE_WEBHOOK_URL"),
            engine_request_timeout,
            catalog_path: var("JOB_CATALOG_PATH")
                .unwrap_or_else(|| "job_catalog.json".into())
                .into(),
            database_url: var("DATABASE_URL"),
            launch_on_start,
            tracker,
            health,
        })
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("{name} is invalid ({raw}): {e}"))),
        None => Ok(default),
    }
}

/// Read and validate the job catalog file.
pub fn load_catalog(path: &Path) -> Result<JobCatalog, CoreError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("Cannot read job catalog {}: {e}", path.display()))
    })?;
    JobCatalog::from_json(&json)
}
