//! Connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::Endpoint;
use crate::protocol::DEFAULT_PORT;

/// Everything a [`Connection`](crate::Connection) needs to reach and
/// supervise its server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Server host name or IP address.
    pub host: String,
    /// Server control port.
    pub port: u16,
    /// Period of the background reconnect timer, in milliseconds.
    pub reconnect_interval_ms: u64,
    /// Limit on a single TCP connect, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Limit on reading one response line, in milliseconds.
    pub receive_timeout_ms: u64,
    /// Send `BYE` before closing a live socket.
    pub goodbye_on_close: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            reconnect_interval_ms: 1000,
            connect_timeout_ms: 5000,
            receive_timeout_ms: 5000,
            goodbye_on_close: false,
        }
    }
}

impl ConnectionOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    // Zero durations are clamped: a zero-period interval is invalid and a
    // zero timeout would fail every read.

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms.max(1))
    }
}
