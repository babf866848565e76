//! Configuration for the proktologe exporter.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Scanning service settings.
    #[serde(default)]
    pub proktologe: ProktologeConfig,

    /// Metrics endpoint settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scanning service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProktologeConfig {
    /// Base URL of the scanning service (default: "http://127.0.0.1").
    #[serde(default = "default_address")]
    pub address: String,

    /// Scan request timeout, e.g. "60s" (default: "60s").
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

fn default_address() -> String {
    "http://127.0.0.1".to_string()
}

fn default_timeout() -> String {
    "60s".to_string()
}

impl Default for ProktologeConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout: default_timeout(),
        }
    }
}

impl ProktologeConfig {
    /// Parsed scan timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.timeout).map_err(ConfigError::Validation)
    }
}

/// Metrics HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on (default: ":9247").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    ":9247".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl WebConfig {
    /// Parsed listen address. A bare `:port` listens on all interfaces.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_addr(&self.listen)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let address = &self.proktologe.address;
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Scanner address must be an http(s) URL: {}",
                address
            )));
        }

        if self.proktologe.timeout()?.is_zero() {
            return Err(ConfigError::Validation(
                "Scan timeout must be > 0".to_string(),
            ));
        }

        self.web.listen_addr()?;

        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        if !self.web.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a listen address, accepting `:port` for all interfaces.
pub fn parse_listen_addr(listen: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    };

    candidate
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", listen)))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Nanoseconds per duration unit.
fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{b5}s" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration such as `60s`, `1.5s` or `1m30s`.
///
/// Each component is a decimal number followed by one of `ns`, `us`, `ms`,
/// `s`, `m` or `h`. Values that do not fit in a [`Duration`] are rejected.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let input = value.trim();
    if input.is_empty() {
        return Err("Empty duration".to_string());
    }

    let invalid = || format!("Invalid duration: {}", input);
    let out_of_range = || format!("Duration out of range: {}", input);

    let mut rest = input;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("Missing unit in duration: {}", input))?;
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        let unit = unit_nanos(unit)
            .ok_or_else(|| format!("Unknown duration unit '{}' in: {}", unit, input))?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };

        // Digits past 18 are below nanosecond resolution for every unit.
        let fraction = &fraction[..fraction.len().min(18)];
        let fraction_nanos = if fraction.is_empty() {
            0
        } else {
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            digits * unit / 10u128.pow(fraction.len() as u32)
        };

        total = whole
            .checked_mul(unit)
            .and_then(|nanos| nanos.checked_add(fraction_nanos))
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(out_of_range)?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}
