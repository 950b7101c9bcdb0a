//! Management API router. Mounts all management endpoints under /api/v1/management.

use crate::admin::AdminService;
use crate::auth;
use crate::campaigns::CampaignManager;
use crate::handlers::{self, ManagementState};
use crate::store::ManagementStore;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use rewards_core::config::AppConfig;
use rewards_loyalty::LoyaltyEngine;
use std::sync::Arc;

impl ManagementState {
    pub fn new(store: Arc<ManagementStore>, engine: Arc<LoyaltyEngine>, config: &AppConfig) -> Self {
        let backend = engine.backend().clone();
        Self {
            admin: Arc::new(AdminService::new(store.clone(), engine)),
            campaigns: Arc::new(CampaignManager::new(store.clone(), backend.clone(), &config.campaigns)),
            store,
            backend,
            auth: config.auth.clone(),
        }
    }
}

/// Build the management router. Everything except login requires a bearer
/// token.
pub fn management_router(state: ManagementState) -> Router {
    const BASE: &str = "/api/v1/management";
    let path = |p: &str| format!("{BASE}{p}");

    Router::new()
        // Customers
        .route(&path("/customers"), get(handlers::list_customers).post(handlers::create_customer))
        .route(&path("/customers/:id"), get(handlers::get_customer).put(handlers::update_customer))
        .route(&path("/customers/:id/points"), post(handlers::grant_points))
        // Rewards
        .route(&path("/rewards"), get(handlers::list_rewards).post(handlers::create_reward))
        .route(&path("/rewards/:id"), axum::routing::put(handlers::update_reward).delete(handlers::delete_reward))
        .route(&path("/rewards/:id/toggle"), post(handlers::toggle_reward))
        // Segments
        .route(&path("/segments"), get(handlers::list_segments))
        // Campaigns
        .route(&path("/campaigns"), get(handlers::list_campaigns).post(handlers::create_campaign))
        .route(&path("/campaigns/preview"), post(handlers::preview_message))
        .route(&path("/campaigns/:id"), get(handlers::get_campaign).put(handlers::update_campaign).delete(handlers::delete_campaign))
        .route(&path("/campaigns/:id/send"), post(handlers::send_campaign))
        .route(&path("/campaigns/:id/cancel"), post(handlers::cancel_campaign))
        .route(&path("/campaigns/:id/history"), get(handlers::campaign_history))
        // Reports
        .route(&path("/reports"), get(handlers::report))
        // Settings
        .route(&path("/settings"), get(handlers::get_settings).put(handlers::update_settings))
        // Audit log
        .route(&path("/audit-log"), get(handlers::audit_log))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        // Auth
        .route(&path("/auth/login"), post(handlers::handle_login))
        .with_state(state)
}
