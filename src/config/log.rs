use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is not set
    /// Default: "info"
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write logs to `<dir>/split-watch.log` when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "log.level {} is not a valid filter: {}",
                self.level, e
            )))
        })?;
        Ok(())
    }
}

fn default_level() -> String {
    "info".into()
}
