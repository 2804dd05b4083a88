//! Layered configuration.
//!
//! Defaults, then an optional TOML file, then `DCORE_*` environment variables
//! (`__` separates nested keys, e.g. `DCORE_SESSION__TTL_SECS=600`).

use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::telemetry::LogFormat;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DCORE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub ring: RingConfig,
    pub search: SearchConfig,
    pub session: SessionConfig,
    pub saga: SagaConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RingConfig {
    /// Virtual nodes contributed by each shard.
    pub replicas: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { replicas: 50 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on concurrently running shard callbacks.
    /// `None` means `ceil(2 * available_parallelism)`.
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 86_400 }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SagaConfig {
    /// Budget for each compensation, which runs detached from the caller's token.
    pub compensation_timeout_secs: u64,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            compensation_timeout_secs: 30,
        }
    }
}

impl SagaConfig {
    pub fn compensation_timeout(&self) -> Duration {
        Duration::from_secs(self.compensation_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
}

impl CoreConfig {
    /// Loads configuration from defaults, `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(CoreConfig::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load configuration")
    }
}
