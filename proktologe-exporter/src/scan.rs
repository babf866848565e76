//! Client for the remote proktologe scanning service.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ProktologeConfig;

/// Scan client errors.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Scan request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Scan request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Scanner returned HTTP status {0}")]
    Status(u16),
    #[error("Failed to decode scan result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of a remote scan, as returned by the scanning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Address that was scanned.
    pub address: String,
    /// Open ports, in the order the service reported them.
    pub open: Vec<u16>,
}

/// HTTP client for `GET <base>/scan/<ip>`.
#[derive(Debug, Clone)]
pub struct ScanClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ScanClient {
    /// Create a client for the scanning service at `base_url`.
    ///
    /// Each scan uses a fresh connection; nothing is kept idle between
    /// scrapes.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(ScanError::Client)?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Create a client from the scanner section of the configuration.
    pub fn from_config(config: &ProktologeConfig) -> crate::Result<Self> {
        let timeout = config.timeout()?;
        Ok(Self::new(config.address.clone(), timeout)?)
    }

    /// Base URL of the scanning service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL scanned for `address`.
    pub fn scan_url(&self, address: Ipv4Addr) -> String {
        format!("{}/scan/{}", self.base_url, address)
    }

    /// Ask the scanning service to scan `address`. Single attempt.
    pub async fn scan(&self, address: Ipv4Addr) -> Result<ScanResult, ScanError> {
        let url = self.scan_url(address);
        debug!(url = %url, "Requesting scan");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ScanError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        let result: ScanResult = serde_json::from_slice(&body)?;
        debug!(
            address = %result.address,
            open_ports = result.open.len(),
            "Scan complete"
        );
        Ok(result)
    }

    fn transport_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            ScanError::Timeout(self.timeout)
        } else {
            ScanError::Transport(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_url() {
        let client = ScanClient::new("http://127.0.0.1", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.scan_url("8.8.8.8".parse().unwrap()),
            "http://127.0.0.1/scan/8.8.8.8"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ScanClient::new("http://scanner:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://scanner:8080");
        assert_eq!(
            client.scan_url("1.2.3.4".parse().unwrap()),
            "http://scanner:8080/scan/1.2.3.4"
        );
    }

    #[test]
    fn test_from_config() {
        let config = ProktologeConfig {
            address: "http://scanner:8080/".to_string(),
            timeout: "1m30s".to_string(),
        };

        let client = ScanClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://scanner:8080");
        assert_eq!(client.timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_from_config_invalid_timeout() {
        let config = ProktologeConfig {
            timeout: "forever".to_string(),
            ..Default::default()
        };

        let err = ScanClient::from_config(&config).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_decode_scan_result() {
        let result: ScanResult =
            serde_json::from_str(r#"{"address":"8.8.8.8","open":[22,80,443]}"#).unwrap();
        assert_eq!(result.address, "8.8.8.8");
        assert_eq!(result.open, vec![22, 80, 443]);
    }

    #[test]
    fn test_decode_rejects_out_of_range_port() {
        let result: Result<ScanResult, _> =
            serde_json::from_str(r#"{"address":"8.8.8.8","open":[70000]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let result: Result<ScanResult, _> = serde_json::from_str(r#"{"address":"8.8.8.8"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ScanClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client.scan("8.8.8.8".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, ScanError::Transport(_)), "got {:?}", err);
    }
}
