//! Prometheus exporter for the open ports on this host's external address.
//!
//! On every scrape the exporter picks the host's public IPv4 address from the
//! local interface table, asks a proktologe scanning service to port-scan it,
//! and exposes the result as gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  HTTP Server    │────>│    Collector    │────>│  Scan Service   │
//! │  (/metrics)     │     │ (per scrape)    │     │ (/scan/<ip>)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                                  │
//!                                  v
//!                         ┌─────────────────┐
//!                         │    Resolver     │
//!                         │  (interfaces)   │
//!                         └─────────────────┘
//! ```
//!
//! # Metrics
//!
//! - `proktologe_up`: always `1` when a scrape ran
//! - `proktologe_open{address, port}`: `1` for every open port reported
//!
//! # Usage
//!
//! ```bash
//! proktologe-exporter --proktologe.address http://scanner:8080 --web.listen-address :9247
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod mapping;
pub mod resolver;
pub mod scan;

pub use collector::{CollectorStats, ScanCollector, SharedCollector};
pub use config::{ExporterConfig, LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use http::HttpServer;
pub use resolver::{AddressResolver, InterfaceInfo, StaticResolver, SystemResolver};
pub use scan::{ScanClient, ScanError, ScanResult};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| {
        Error::Config(config::ConfigError::Validation(format!(
            "Failed to initialize tracing: {}",
            e
        )))
    })
}
