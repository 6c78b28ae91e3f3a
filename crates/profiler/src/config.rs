//! Profiler configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, then `PROFILER_*` environment variables. Nested keys use `__`, e.g.
//! `PROFILER_PIPELINE__KMAX=12` or `PROFILER_SERVICE__API_PORT=9100`.

use anyhow::{bail, Context, Result};
use profiler_lib::PipelineConfig;
use serde::Deserialize;
use std::path::Path;

/// Full binary configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilerConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub service: ServiceConfig,
}

/// Settings for `schedule` mode
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Daily trigger time (UTC)
    #[serde(default = "default_schedule_hour")]
    pub schedule_hour_utc: u32,

    #[serde(default)]
    pub schedule_minute_utc: u32,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_schedule_hour() -> u32 {
    6
}

fn default_api_port() -> u16 {
    8080
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            schedule_hour_utc: default_schedule_hour(),
            schedule_minute_utc: 0,
            api_port: default_api_port(),
        }
    }
}

impl ProfilerConfig {
    /// Load configuration from the optional file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PROFILER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: ProfilerConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.service.schedule_hour_utc > 23 {
            bail!(
                "schedule_hour_utc must be in 0..=23, got {}",
                self.service.schedule_hour_utc
            );
        }
        if self.service.schedule_minute_utc > 59 {
            bail!(
                "schedule_minute_utc must be in 0..=59, got {}",
                self.service.schedule_minute_utc
            );
        }
        Ok(())
    }
}
