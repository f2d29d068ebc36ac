//! Activator configuration
//!
//! Timing for the schema readiness wait, with environment overrides read
//! through a trait so tests don't touch process-global state.

use std::time::Duration;

use trellis_common::Error;

/// Default interval between readiness probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default upper bound on waiting for a schema to become available
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the poll interval, in milliseconds
pub const POLL_INTERVAL_ENV: &str = "TRELLIS_READINESS_POLL_INTERVAL_MS";

/// Environment variable overriding the readiness timeout, in seconds
pub const READINESS_TIMEOUT_ENV: &str = "TRELLIS_READINESS_TIMEOUT_SECS";

/// Source of activator settings from the environment
#[cfg_attr(test, mockall::automock)]
pub trait ActivatorEnv: Send + Sync {
    /// Raw value of [`POLL_INTERVAL_ENV`]
    fn poll_interval_ms(&self) -> Option<String>;

    /// Raw value of [`READINESS_TIMEOUT_ENV`]
    fn readiness_timeout_secs(&self) -> Option<String>;
}

/// Reads settings from the process environment
#[derive(Clone, Default)]
pub struct OsEnv;

impl ActivatorEnv for OsEnv {
    fn poll_interval_ms(&self) -> Option<String> {
        std::env::var(POLL_INTERVAL_ENV).ok()
    }

    fn readiness_timeout_secs(&self) -> Option<String> {
        std::env::var(READINESS_TIMEOUT_ENV).ok()
    }
}

/// Timing policy for the readiness wait performed before creating a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivatorConfig {
    /// Time between readiness probes
    pub poll_interval: Duration,
    /// Give up on a target whose schema is not served within this window
    pub readiness_timeout: Duration,
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

impl ActivatorConfig {
    /// Build a config from defaults overridden by the environment
    pub fn from_env(env: &dyn ActivatorEnv) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(raw) = env.poll_interval_ms() {
            config.poll_interval = Duration::from_millis(parse_u64(POLL_INTERVAL_ENV, &raw)?);
        }
        if let Some(raw) = env.readiness_timeout_secs() {
            config.readiness_timeout =
                Duration::from_secs(parse_u64(READINESS_TIMEOUT_ENV, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the poll loop cannot honour
    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() {
            return Err(Error::validation_for_field(
                POLL_INTERVAL_ENV,
                "poll interval must be greater than zero",
            ));
        }
        if self.poll_interval > self.readiness_timeout {
            return Err(Error::validation_for_field(
                POLL_INTERVAL_ENV,
                format!(
                    "poll interval {:?} exceeds readiness timeout {:?}",
                    self.poll_interval, self.readiness_timeout
                ),
            ));
        }
        Ok(())
    }
}

fn parse_u64(field: &str, raw: &str) -> Result<u64, Error> {
    raw.trim().parse().map_err(|_| {
        Error::validation_for_field(field, format!("expected a whole number, got '{}'", raw))
    })
}
