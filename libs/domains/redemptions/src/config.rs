use chrono::TimeDelta;
use core_config::{env_duration_secs, env_parse, env_required, ConfigError, FromEnv};
use task_worker::WorkerConfig;

use crate::client::DelegationServiceConfig;

/// Settings for the redemption processor
#[derive(Debug, Clone)]
pub struct RedemptionConfig {
    pub worker: WorkerConfig,
    /// Delay between a successful redemption and the next one
    pub redemption_interval: TimeDelta,
    pub delegation: DelegationServiceConfig,
}

impl RedemptionConfig {
    pub fn new(delegation: DelegationServiceConfig) -> Self {
        Self {
            worker: WorkerConfig::new("redemptions"),
            redemption_interval: TimeDelta::days(30),
            delegation,
        }
    }
}

impl FromEnv for RedemptionConfig {
    /// Reads:
    /// - `REDEMPTION_WORKER_COUNT` (default: 5)
    /// - `REDEMPTION_QUEUE_CAPACITY` (default: 100)
    /// - `REDEMPTION_ENQUEUE_TIMEOUT_SECS` (default: 5)
    /// - `REDEMPTION_FAILURE_THRESHOLD` (default: 3)
    /// - `REDEMPTION_RESET_TIMEOUT_SECS` (default: 300)
    /// - `REDEMPTION_HEALTH_CHECK_INTERVAL_SECS` (default: 30)
    /// - `REDEMPTION_PIPELINE_TIMEOUT_SECS` (default: 60)
    /// - `REDEMPTION_INTERVAL_DAYS` (default: 30)
    /// - `DELEGATION_SERVICE_ADDR` (required)
    /// - `DELEGATION_CONNECT_TIMEOUT_SECS` (default: 5)
    /// - `DELEGATION_REQUEST_TIMEOUT_SECS` (default: 30)
    fn from_env() -> Result<Self, ConfigError> {
        let delegation = DelegationServiceConfig::new(env_required("DELEGATION_SERVICE_ADDR")?);
        let delegation = DelegationServiceConfig {
            connect_timeout: env_duration_secs(
                "DELEGATION_CONNECT_TIMEOUT_SECS",
                delegation.connect_timeout,
            )?,
            request_timeout: env_duration_secs(
                "DELEGATION_REQUEST_TIMEOUT_SECS",
                delegation.request_timeout,
            )?,
            ..delegation
        };

        let defaults = WorkerConfig::new("redemptions");
        let worker = defaults
            .clone()
            .with_worker_count(env_parse("REDEMPTION_WORKER_COUNT", defaults.worker_count)?)
            .with_queue_capacity(env_parse("REDEMPTION_QUEUE_CAPACITY", defaults.queue_capacity)?)
            .with_enqueue_timeout(env_duration_secs(
                "REDEMPTION_ENQUEUE_TIMEOUT_SECS",
                defaults.enqueue_timeout,
            )?)
            .with_failure_threshold(env_parse(
                "REDEMPTION_FAILURE_THRESHOLD",
                defaults.failure_threshold,
            )?)
            .with_reset_timeout(env_duration_secs(
                "REDEMPTION_RESET_TIMEOUT_SECS",
                defaults.reset_timeout,
            )?)
            .with_health_check_interval(env_duration_secs(
                "REDEMPTION_HEALTH_CHECK_INTERVAL_SECS",
                defaults.health_check_interval,
            )?)
            .with_task_timeout(env_duration_secs(
                "REDEMPTION_PIPELINE_TIMEOUT_SECS",
                defaults.task_timeout,
            )?);

        let interval_days: i64 = env_parse("REDEMPTION_INTERVAL_DAYS", 30)?;
        let redemption_interval =
            TimeDelta::try_days(interval_days).ok_or_else(|| ConfigError::ParseError {
                key: "REDEMPTION_INTERVAL_DAYS".to_string(),
                details: format!("{interval_days} days is out of range"),
            })?;

        Ok(Self {
            worker,
            redemption_interval,
            delegation,
        })
    }
}
