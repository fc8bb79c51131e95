//! Configuration management for the watch bridge.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variable overrides (`SPLIT_WATCH__` prefix, highest priority)
//! - Section-wise validation

mod http;
mod log;
mod store;
mod watch;
pub use http::*;
pub use log::*;
pub use store::*;
pub use watch::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "SPLIT_WATCH";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// HTTP/WebSocket listener
    #[serde(default)]
    pub http: HttpConfig,
    /// Location of the watched custom resource and how to reach the API server
    #[serde(default)]
    pub store: StoreConfig,
    /// Retry cadence of the watch supervisor
    #[serde(default)]
    pub watch: WatchConfig,
    /// Startup and shutdown coordination
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Observer session parameters
    #[serde(default)]
    pub websocket: WebSocketConfig,
    /// Log filter and optional file output
    #[serde(default)]
    pub log: LogConfig,
}

impl Settings {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `SPLIT_WATCH__` prefix (highest priority)
    ///
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.http.validate()?;
        self.store.validate()?;
        self.watch.validate()?;
        self.lifecycle.validate()?;
        self.websocket.validate()?;
        self.log.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
