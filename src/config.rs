use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Environment variable overriding [`BatchConfig::size`]
pub const BUFFER_CAPACITY_ENV: &str = "PIPELINE_BUFFER_CAPACITY";
/// Environment variable overriding [`BatchConfig::interval`], in whole seconds
pub const FLUSH_INTERVAL_ENV: &str = "PIPELINE_FLUSH_INTERVAL_SECS";
/// Largest ring capacity accepted by [`BatchConfig::validate`]
pub const MAX_BUFFER_CAPACITY: usize = 1_000_000;

/// Ring capacity and flush window of a batch stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub size: usize,
    pub interval: Duration,
}

impl BatchConfig {
    pub fn new(size: usize, interval: Duration) -> Self {
        Self { size, interval }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(PipelineError::ConfigError(
                "buffer capacity must be greater than zero".into(),
            ));
        }
        if self.size > MAX_BUFFER_CAPACITY {
            return Err(PipelineError::ConfigError(format!(
                "buffer capacity {} exceeds the maximum of {MAX_BUFFER_CAPACITY}",
                self.size
            )));
        }
        if self.interval.is_zero() {
            return Err(PipelineError::ConfigError(
                "flush interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 10,
            interval: Duration::from_secs(30),
        }
    }
}

/// Startup configuration of the console pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Defaults, overridden by `PIPELINE_*` environment variables when set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(BUFFER_CAPACITY_ENV) {
            config.batch.size = raw.trim().parse().map_err(|e| {
                PipelineError::ConfigError(format!("{BUFFER_CAPACITY_ENV}={raw:?}: {e}"))
            })?;
        }
        if let Some(raw) = lookup(FLUSH_INTERVAL_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                PipelineError::ConfigError(format!("{FLUSH_INTERVAL_ENV}={raw:?}: {e}"))
            })?;
            config.batch.interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.batch.validate()
    }
}
