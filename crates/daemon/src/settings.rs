//! Daemon settings: optional TOML file overlaid by `BATCHQ__*` variables

use anyhow::{Context, Result};
use batchq_core::domain::{BatchingQueueConfig, QueueSettings};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "~/.batchq/queue.toml";
const ENV_PREFIX: &str = "BATCHQ";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Container capacity; 0 means unbounded
    pub capacity: usize,
    /// How long a producer waits for free capacity before dropping a line
    pub offer_timeout_ms: u64,
    pub queue: QueueSettings,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            offer_timeout_ms: 1_000,
            queue: QueueSettings::default(),
        }
    }
}

impl DaemonSettings {
    /// Load from `BATCHQ_CONFIG` (or the default path) and the process
    /// environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("BATCHQ_CONFIG")
            .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned());

        let builder = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(environment(None));
        Self::from_builder(builder).with_context(|| format!("Invalid configuration ({})", path))
    }

    fn from_builder(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Self = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;
        settings.queue_config()?;
        Ok(settings)
    }

    /// Validated queue configuration
    pub fn queue_config(&self) -> Result<BatchingQueueConfig> {
        BatchingQueueConfig::new(self.queue.clone()).context("Invalid queue settings")
    }

    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }
}

fn environment(source: Option<HashMap<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(source)
}
