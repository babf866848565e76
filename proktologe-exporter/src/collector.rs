//! Scrape-time collector: resolve the external address, scan it, map the
//! result to metrics.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::mapping::{Sample, open_samples, up_sample};
use crate::resolver::AddressResolver;
use crate::scan::ScanClient;

/// Collector statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Total scrapes served.
    pub scrapes: u64,
    /// Scrapes that ended because no public address was found.
    pub resolve_failures: u64,
    /// Scrapes that ended because the scan call failed.
    pub scan_failures: u64,
    /// Open-port samples emitted across all scrapes.
    pub open_ports_reported: u64,
}

/// Collector for the proktologe metrics.
///
/// Holds no per-scrape state: every call to [`collect`](Self::collect)
/// builds its samples from scratch.
pub struct ScanCollector {
    resolver: Arc<dyn AddressResolver>,
    client: ScanClient,
    stats: RwLock<CollectorStats>,
}

impl ScanCollector {
    /// Create a new collector.
    pub fn new(resolver: Arc<dyn AddressResolver>, client: ScanClient) -> Self {
        Self {
            resolver,
            client,
            stats: RwLock::new(CollectorStats::default()),
        }
    }

    /// Run one scrape.
    ///
    /// `up` is always emitted first. Resolution or scan failures are logged
    /// and end the scrape with whatever was already collected.
    pub async fn collect(&self) -> Vec<Sample> {
        let mut samples = vec![up_sample()];
        self.stats.write().scrapes += 1;

        let address = match self.resolver.resolve() {
            Ok(address) => address,
            Err(e) => {
                error!(error = %e, "Failed to resolve external address");
                self.stats.write().resolve_failures += 1;
                return samples;
            }
        };
        info!(address = %address, "External IP address resolved");

        let result = match self.client.scan(address).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    error = %e,
                    scanner = %self.client.base_url(),
                    address = %address,
                    "Scan failed"
                );
                self.stats.write().scan_failures += 1;
                return samples;
            }
        };

        let open = open_samples(&result);
        self.stats.write().open_ports_reported += open.len() as u64;
        samples.extend(open);
        samples
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<ScanCollector>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{InterfaceInfo, StaticResolver};
    use std::time::Duration;

    fn collector_with(interfaces: Vec<InterfaceInfo>, base_url: &str) -> ScanCollector {
        ScanCollector::new(
            Arc::new(StaticResolver::new(interfaces)),
            ScanClient::new(base_url, Duration::from_secs(1)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_resolve_failure_emits_only_up() {
        let private = InterfaceInfo::new("eth0", vec!["192.168.1.5".parse().unwrap()]);
        let collector = collector_with(vec![private], "http://127.0.0.1:1");

        let samples = collector.collect().await;

        assert_eq!(samples, vec![up_sample()]);
        let stats = collector.stats();
        assert_eq!(stats.scrapes, 1);
        assert_eq!(stats.resolve_failures, 1);
        assert_eq!(stats.scan_failures, 0);
    }

    #[tokio::test]
    async fn test_scan_failure_emits_only_up() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let public = InterfaceInfo::new("eth0", vec!["8.8.8.8".parse().unwrap()]);
        let collector = collector_with(vec![public], &format!("http://{}", addr));

        let samples = collector.collect().await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "proktologe_up");
        assert_eq!(collector.stats().scan_failures, 1);
    }

    #[tokio::test]
    async fn test_scrapes_are_independent() {
        let collector = collector_with(Vec::new(), "http://127.0.0.1:1");

        assert_eq!(collector.collect().await.len(), 1);
        assert_eq!(collector.collect().await.len(), 1);
        assert_eq!(collector.stats().scrapes, 2);
    }
}
