//! API server. Serves the kiosk and management REST surfaces plus the
//! Prometheus exporter.

use crate::kiosk_rest::kiosk_router;
use crate::rest::{self, AppState};
use axum::routing::get;
use axum::Router;
use rewards_core::config::AppConfig;
use rewards_kiosk::KioskController;
use rewards_management::{management_router, ManagementState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Assemble every route with the shared middleware stack.
pub fn build_app(node_id: &str, kiosk: Arc<KioskController>, management: ManagementState) -> Router {
    let ops = Router::new()
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(AppState {
            node_id: node_id.to_string(),
            start_time: Instant::now(),
        });

    Router::new()
        .merge(kiosk_router(kiosk))
        .merge(management_router(management))
        .merge(ops)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    config: AppConfig,
    kiosk: Arc<KioskController>,
    management: ManagementState,
}

impl ApiServer {
    pub fn new(config: AppConfig, kiosk: Arc<KioskController>, management: ManagementState) -> Self {
        Self {
            config,
            kiosk,
            management,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = build_app(&self.config.node_id, self.kiosk.clone(), self.management.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            return Ok(());
        }
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
