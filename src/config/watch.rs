use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Watch supervisor timing
///
/// Every wait the supervisor performs is sliced into `shutdown_poll_ms`
/// ticks, so a shutdown request is noticed within one tick.
///
/// ```toml
/// [watch]
/// watch_timeout_secs = 0
/// reconnect_delay_ms = 5000
/// unavailable_delay_ms = 5000
/// shutdown_poll_ms = 1000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Server-side timeout hint sent with every watch request.
    /// 0 leaves the choice to the API server.
    ///
    /// **Default**: 0
    #[serde(default)]
    pub watch_timeout_secs: u64,

    /// Pause after a watch stream ends before reconnecting
    ///
    /// **Default**: 5000
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Pause between attempts while the store client is not ready
    ///
    /// **Default**: 5000
    #[serde(default = "default_unavailable_delay_ms")]
    pub unavailable_delay_ms: u64,

    /// Granularity at which waits re-check the shutdown token
    ///
    /// **Default**: 1000
    #[serde(default = "default_shutdown_poll_ms")]
    pub shutdown_poll_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_timeout_secs: 0,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            unavailable_delay_ms: default_unavailable_delay_ms(),
            shutdown_poll_ms: default_shutdown_poll_ms(),
        }
    }
}

impl WatchConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn unavailable_delay(&self) -> Duration {
        Duration::from_millis(self.unavailable_delay_ms)
    }

    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }

    pub fn watch_timeout(&self) -> Option<Duration> {
        (self.watch_timeout_secs > 0).then(|| Duration::from_secs(self.watch_timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.shutdown_poll_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.shutdown_poll_ms must be greater than 0".into(),
            )));
        }

        if self.reconnect_delay_ms < self.shutdown_poll_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.reconnect_delay_ms ({}) must be at least watch.shutdown_poll_ms ({})",
                self.reconnect_delay_ms, self.shutdown_poll_ms
            ))));
        }

        if self.unavailable_delay_ms < self.shutdown_poll_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.unavailable_delay_ms ({}) must be at least watch.shutdown_poll_ms ({})",
                self.unavailable_delay_ms, self.shutdown_poll_ms
            ))));
        }

        if self.shutdown_poll_ms > 5000 {
            warn!(
                "watch.shutdown_poll_ms ({}) is large; shutdown may wait that long for the watch thread",
                self.shutdown_poll_ms
            );
        }

        Ok(())
    }
}

/// Startup/shutdown coordination
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Upper bound on how long `stop` waits for the watch thread
    ///
    /// **Default**: 10000
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl LifecycleConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.join_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "lifecycle.join_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

const fn default_reconnect_delay_ms() -> u64 {
    5000
}

const fn default_unavailable_delay_ms() -> u64 {
    5000
}

const fn default_shutdown_poll_ms() -> u64 {
    1000
}

const fn default_join_timeout_ms() -> u64 {
    10_000
}
