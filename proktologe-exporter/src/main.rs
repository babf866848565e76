//! Prometheus exporter for proktologe port scans.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use proktologe_exporter::{
    ExporterConfig, HttpServer, LogFormat, ScanClient, ScanCollector, SystemResolver, init_tracing,
};

/// Prometheus exporter for proktologe port scans.
#[derive(Parser, Debug)]
#[command(name = "proktologe-exporter")]
#[command(about = "Export open ports on the host's external address as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Proktologe server address.
    #[arg(long = "proktologe.address")]
    proktologe_address: Option<String>,

    /// Proktologe connect timeout (e.g. 60s, 1m30s, 500ms).
    #[arg(long = "proktologe.timeout")]
    proktologe_timeout: Option<String>,

    /// Address to listen on for web interface and telemetry.
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log.level")]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long = "log.format", value_enum)]
    log_format: Option<LogFormat>,
}

impl Args {
    /// Apply CLI overrides on top of the loaded configuration.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(address) = self.proktologe_address {
            config.proktologe.address = address;
        }
        if let Some(timeout) = self.proktologe_timeout {
            config.proktologe.timeout = timeout;
        }
        if let Some(listen) = self.listen_address {
            config.web.listen = listen;
        }
        if let Some(path) = self.telemetry_path {
            config.web.path = path;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting proktologe-exporter"
    );
    info!(
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "Build context"
    );

    let client = ScanClient::from_config(&config.proktologe)?;
    info!(
        scanner = %client.base_url(),
        timeout = ?client.timeout(),
        "Using proktologe scanner"
    );

    let collector = Arc::new(ScanCollector::new(Arc::new(SystemResolver), client));

    let http_server = HttpServer::new(
        collector.clone(),
        config.web.listen_addr()?,
        config.web.path.clone(),
    );

    // Failing to bind is fatal
    let listener = http_server.bind().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve(listener, shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = collector.stats();
    info!(
        scrapes = stats.scrapes,
        resolve_failures = stats.resolve_failures,
        scan_failures = stats.scan_failures,
        open_ports_reported = stats.open_ports_reported,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
