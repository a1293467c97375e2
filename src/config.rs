//! Client configuration.
//!
//! [`ClientConfig`] holds the connect-time settings and can be built in code,
//! through [`ClientBuilder`](crate::ClientBuilder), or deserialized from JSON:
//!
//! ```
//! use gbxremote_client::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{ "host": "10.0.0.2", "port": 5001 }"#).unwrap();
//! assert_eq!(config.port, 5001);
//! assert_eq!(config.read_timeout_ms, 20_000);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default server address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default XML-RPC port of a dedicated server.
pub const DEFAULT_PORT: u16 = 5000;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a caller waits for its response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Default time a frame write may take.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Largest inbound frame payload accepted before the connection is dropped.
    pub max_response_size: u32,
    /// Outbound frames buffered before senders wait.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            max_response_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Read/write timeouts shared by the caller side and the I/O tasks.
///
/// Adjustable while the connection is running.
#[derive(Debug)]
pub struct Timeouts {
    read_ms: AtomicU64,
    write_ms: AtomicU64,
}

impl Timeouts {
    pub fn new(read: Duration, write: Duration) -> Self {
        Self {
            read_ms: AtomicU64::new(read.as_millis() as u64),
            write_ms: AtomicU64::new(write.as_millis() as u64),
        }
    }

    #[inline]
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms.load(Ordering::Acquire))
    }

    #[inline]
    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms.load(Ordering::Acquire))
    }

    pub fn set(&self, read: Duration, write: Duration) {
        self.read_ms.store(read.as_millis() as u64, Ordering::Release);
        self.write_ms.store(write.as_millis() as u64, Ordering::Release);
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.read_timeout(), DEFAULT_READ_TIMEOUT);
        assert_eq!(config.write_timeout(), DEFAULT_WRITE_TIMEOUT);
        assert_eq!(config.max_response_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = ClientConfig::from_json(r#"{"read_timeout_ms": 1500}"#).unwrap();
        assert_eq!(config.read_timeout(), Duration::from_millis(1500));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_config_rejects_bad_json() {
        assert!(ClientConfig::from_json("{ port: }").is_err());
    }

    #[test]
    fn test_timeouts_update() {
        let timeouts = Timeouts::default();
        timeouts.set(Duration::from_millis(250), Duration::from_secs(3));
        assert_eq!(timeouts.read(), Duration::from_millis(250));
        assert_eq!(timeouts.write(), Duration::from_secs(3));
    }
}
