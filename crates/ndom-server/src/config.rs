//! Configuration for the document host.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `NDOM_BIND_ADDR`        (default: "0.0.0.0")
//! - `NDOM_PORT`             (default: "9100")
//! - `NDOM_MAX_CLIENTS`      (default: "1024")
//! - `NDOM_MAX_FRAME_LEN`    (default: "1048576")
//! - `NDOM_PING_INTERVAL_MS` (default: "5000")
//! - `NDOM_HANDSHAKE_TIMEOUT_MS` (default: "5000")
//!
//! The binary layers command-line flags on top of these.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

pub const DEFAULT_PORT: u16 = 9100;
pub const DEFAULT_MAX_CLIENTS: usize = 1024;
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on; 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum number of open connections, handshaking ones included.
    pub max_clients: usize,

    /// Largest frame body accepted from a client.
    pub max_frame_len: usize,

    /// Period between pings (and document time updates).
    pub ping_interval: Duration,

    /// How long a new connection may take to complete the hello exchange.
    pub handshake_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            ping_interval: Duration::from_millis(DEFAULT_PING_INTERVAL_MS),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("NDOM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = read_env_or_default("NDOM_PORT", DEFAULT_PORT)?;
        let max_clients = read_env_or_default("NDOM_MAX_CLIENTS", DEFAULT_MAX_CLIENTS)?;
        let max_frame_len = read_env_or_default("NDOM_MAX_FRAME_LEN", DEFAULT_MAX_FRAME_LEN)?;
        let ping_ms = read_env_or_default("NDOM_PING_INTERVAL_MS", DEFAULT_PING_INTERVAL_MS)?;
        let handshake_ms =
            read_env_or_default("NDOM_HANDSHAKE_TIMEOUT_MS", DEFAULT_HANDSHAKE_TIMEOUT_MS)?;

        let config = Config {
            bind_addr,
            port,
            max_clients,
            max_frame_len,
            ping_interval: Duration::from_millis(ping_ms),
            handshake_timeout: Duration::from_millis(handshake_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "NDOM_PING_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "NDOM_HANDSHAKE_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_clients > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                key: "NDOM_MAX_CLIENTS",
                value: self.max_clients.to_string(),
                reason: format!("must be at most {}", Semaphore::MAX_PERMITS),
            });
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid {
                key: "NDOM_MAX_FRAME_LEN",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => parse_value(key, &val),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, val: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    val.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: val.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr_string(), "0.0.0.0:9100");
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = parse_value::<u16>("NDOM_PORT", "70000").unwrap_err();
        let ConfigError::Invalid { key, value, .. } = &err;
        assert_eq!(*key, "NDOM_PORT");
        assert_eq!(value, "70000");
        assert!(err.to_string().contains("NDOM_PORT"));
    }

    #[test]
    fn zero_ping_interval_is_rejected() {
        let config = Config {
            ping_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_handshake_timeout_is_rejected() {
        let config = Config {
            handshake_timeout: Duration::ZERO,
            ..Config::default()
        };
        let ConfigError::Invalid { key, .. } = config.validate().unwrap_err();
        assert_eq!(key, "NDOM_HANDSHAKE_TIMEOUT_MS");
    }

    #[test]
    fn max_clients_is_bounded_by_admission_permits() {
        let config = Config {
            max_clients: usize::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
