//! Command-line and environment configuration.

use crate::commands::ProxyOptions;
use crate::geo::LatLngExtractor;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

/// Errors in an otherwise well-formed command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("geo separator must be a single ASCII character, got {0:?}")]
    InvalidSeparator(char),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Proxy configuration.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "geoproxy",
    version,
    about = "Redis-protocol proxy with geo-spatial commands"
)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "GEOPROXY_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "GEOPROXY_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Deadline for each backend call, in milliseconds
    #[arg(long, env = "GEOPROXY_TIMEOUT_MS", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Extra attempts after a timeout or unavailable backend
    #[arg(long, env = "GEOPROXY_MAX_RETRY_TIMES", default_value_t = 0)]
    pub max_retry_times: u32,

    /// Enable the geo extension (SET/DEL also maintain the geo index)
    #[arg(long, env = "GEOPROXY_GEO")]
    pub geo: bool,

    /// Field separator in stored values
    #[arg(long, default_value_t = '|')]
    pub geo_separator: char,

    /// Field index of the latitude in stored values
    #[arg(long, default_value_t = 5)]
    pub geo_lat_index: usize,

    /// Field index of the longitude in stored values
    #[arg(long, default_value_t = 4)]
    pub geo_lng_index: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "GEOPROXY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn proxy_options(&self) -> Result<ProxyOptions, ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(ProxyOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retry_times: self.max_retry_times,
        })
    }

    pub fn extractor(&self) -> Result<LatLngExtractor, ConfigError> {
        if !self.geo_separator.is_ascii() {
            return Err(ConfigError::InvalidSeparator(self.geo_separator));
        }
        Ok(LatLngExtractor::new(
            self.geo_separator as u8,
            self.geo_lat_index,
            self.geo_lng_index,
        ))
    }
}
