use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Listener for the REST API, the observer WebSocket and the metrics endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    /// Interface to bind
    /// Default: "0.0.0.0"
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Default: 8001
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the built dashboard (`index.html` plus assets).
    /// Static routes are only mounted when this is set.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.listen_address.parse().map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "http.listen_address {} is not an IP address: {}",
                self.listen_address, e
            )))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "http.port must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

/// Per-observer session settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebSocketConfig {
    /// How long a session waits for inbound data before re-checking shutdown
    /// Default: 2000ms
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: default_receive_timeout_ms(),
        }
    }
}

impl WebSocketConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.receive_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "websocket.receive_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_listen_address() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8001
}
fn default_receive_timeout_ms() -> u64 {
    2000
}
