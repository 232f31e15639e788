//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::time::{DEFAULT_TICK_HZ, MAX_TICK_HZ, MIN_TICK_HZ};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one event per line
    Pretty,
    /// Newline-delimited JSON
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Listener binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,

    /// Simulation ticks per second
    pub tick_hz: u32,
    /// Drop a connection after this long without an inbound line
    pub idle_timeout: Option<Duration>,
    /// Longest inbound line accepted, in bytes
    pub max_line_length: usize,
    /// Frames buffered per connection before new ones are dropped
    pub outbound_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            tick_hz: DEFAULT_TICK_HZ,
            idle_timeout: None,
            max_line_length: 256,
            outbound_queue: 64,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // SERVER_ADDR wins over BIND_HOST/PORT
        let server_addr = match lookup("SERVER_ADDR") {
            Some(addr) => addr,
            None => {
                let host = lookup("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
                let port = lookup("PORT").unwrap_or_else(|| "5555".to_string());
                format!("{}:{}", host, port)
            }
        };
        let server_addr = server_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(server_addr))?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::invalid("LOG_FORMAT", other)),
        };

        let tick_hz = parse_or("TICK_HZ", &lookup, defaults.tick_hz)?;
        if !(MIN_TICK_HZ..=MAX_TICK_HZ).contains(&tick_hz) {
            return Err(ConfigError::TickRateOutOfRange(tick_hz));
        }

        let idle_secs: u64 = parse_or("IDLE_TIMEOUT_SECS", &lookup, 0)?;
        let max_line_length = parse_or("MAX_LINE_LENGTH", &lookup, defaults.max_line_length)?;
        let outbound_queue = parse_or("OUTBOUND_QUEUE", &lookup, defaults.outbound_queue)?;
        if outbound_queue == 0 {
            return Err(ConfigError::invalid("OUTBOUND_QUEUE", "0"));
        }

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            tick_hz,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            max_line_length,
            outbound_queue,
        })
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::invalid(key, &raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format: {0:?}")]
    InvalidAddress(String),

    #[error("TICK_HZ must be between 60 and 120, got {0}")]
    TickRateOutOfRange(u32),
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
        }
    }
}
