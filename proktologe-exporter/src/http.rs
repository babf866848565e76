//! HTTP server for the metrics endpoint and landing page.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::collector::SharedCollector;
use crate::error::Result;
use crate::mapping::render;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    metrics_path: String,
}

/// Create the HTTP router.
pub fn create_router(collector: SharedCollector, metrics_path: &str) -> Router {
    let state = AppState {
        collector,
        metrics_path: metrics_path.to_string(),
    };

    let router = Router::new().route(metrics_path, get(metrics_handler));
    let router = if metrics_path == "/" {
        router
    } else {
        router.route("/", get(landing_handler))
    };

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Handler for the metrics endpoint. Runs one scrape per request.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let samples = state.collector.collect().await;
    debug!(samples = samples.len(), "Scrape complete");

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        render(&samples),
    )
        .into_response()
}

/// Handler for the landing page.
async fn landing_handler(State(state): State<AppState>) -> Html<String> {
    Html(landing_page(&state.metrics_path))
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>\n\
         <head><title>Proktologe Exporter</title></head>\n\
         <body>\n\
         <h1>Proktologe Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        metrics_path
    )
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the listen address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            path = %self.metrics_path,
            "HTTP server listening"
        );
        Ok(listener)
    }

    /// Serve on `listener` until the shutdown signal is received.
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = create_router(self.collector, &self.metrics_path);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // Wait for shutdown signal
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Bind and serve until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScanCollector;
    use crate::resolver::StaticResolver;
    use crate::scan::ScanClient;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn make_collector() -> SharedCollector {
        // No interfaces: every scrape ends after `up`
        Arc::new(ScanCollector::new(
            Arc::new(StaticResolver::default()),
            ScanClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = create_router(make_collector(), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("proktologe_up 1"));
        assert!(!body.contains("proktologe_open"));
    }

    #[tokio::test]
    async fn test_landing_page() {
        let router = create_router(make_collector(), "/metrics");

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("<title>Proktologe Exporter</title>"));
        assert!(body.contains("<a href='/metrics'>Metrics</a>"));
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = create_router(make_collector(), "/probe/metrics");

        // Custom path should work
        let response = router
            .clone()
            .oneshot(Request::get("/probe/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Default path should 404
        let response = router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Landing page links to the custom path
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("href='/probe/metrics'"));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = HttpServer::new(make_collector(), addr, "/metrics".to_string());
        assert!(server.bind().await.is_err());
    }
}
