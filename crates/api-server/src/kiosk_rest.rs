//! Kiosk REST API endpoints. Every route is scoped to one kiosk id; the
//! response is always the kiosk's current screen.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rewards_kiosk::{KioskController, KioskView};
use rewards_loyalty::RegistrationForm;
use rewards_management::ApiError;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

type ViewResult = Result<Json<KioskView>, ApiError>;

/// Shared state for kiosk endpoints.
#[derive(Clone)]
pub struct KioskApiState {
    pub controller: Arc<KioskController>,
}

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    pub points: u32,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub reward_id: Uuid,
    #[serde(default)]
    pub staff_pin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirmed: bool,
}

/// GET /api/v1/kiosk/:kiosk_id
pub async fn handle_view(State(state): State<KioskApiState>, Path(kiosk_id): Path<String>) -> ViewResult {
    Ok(Json(state.controller.view(&kiosk_id).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/start: tap to check in.
pub async fn handle_start(State(state): State<KioskApiState>, Path(kiosk_id): Path<String>) -> ViewResult {
    Ok(Json(state.controller.start(&kiosk_id).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/phone
pub async fn handle_phone(
    State(state): State<KioskApiState>,
    Path(kiosk_id): Path<String>,
    Json(req): Json<PhoneRequest>,
) -> ViewResult {
    Ok(Json(state.controller.submit_phone(&kiosk_id, &req.phone).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/register
pub async fn handle_register(
    State(state): State<KioskApiState>,
    Path(kiosk_id): Path<String>,
    Json(form): Json<RegistrationForm>,
) -> ViewResult {
    Ok(Json(state.controller.register(&kiosk_id, form).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/skip: register with placeholder details.
pub async fn handle_skip(State(state): State<KioskApiState>, Path(kiosk_id): Path<String>) -> ViewResult {
    Ok(Json(state.controller.skip_registration(&kiosk_id).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/points
pub async fn handle_points(
    State(state): State<KioskApiState>,
    Path(kiosk_id): Path<String>,
    Json(req): Json<PointsRequest>,
) -> ViewResult {
    let view = state.controller.add_points(&kiosk_id, req.points).await?;
    metrics::counter!("kiosk.api.checkins").increment(1);
    Ok(Json(view))
}

/// POST /api/v1/kiosk/:kiosk_id/redeem
pub async fn handle_redeem(
    State(state): State<KioskApiState>,
    Path(kiosk_id): Path<String>,
    Json(req): Json<RedeemRequest>,
) -> ViewResult {
    let view = state
        .controller
        .redeem(&kiosk_id, req.reward_id, req.staff_pin.as_deref())
        .await?;
    metrics::counter!("kiosk.api.redemptions").increment(1);
    Ok(Json(view))
}

/// POST /api/v1/kiosk/:kiosk_id/reset-points
pub async fn handle_reset_points(
    State(state): State<KioskApiState>,
    Path(kiosk_id): Path<String>,
    Json(req): Json<ResetRequest>,
) -> ViewResult {
    Ok(Json(state.controller.reset_points(&kiosk_id, req.confirmed).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/done: next customer.
pub async fn handle_done(State(state): State<KioskApiState>, Path(kiosk_id): Path<String>) -> ViewResult {
    Ok(Json(state.controller.done(&kiosk_id).await?))
}

/// POST /api/v1/kiosk/:kiosk_id/cancel
pub async fn handle_cancel(State(state): State<KioskApiState>, Path(kiosk_id): Path<String>) -> ViewResult {
    Ok(Json(state.controller.cancel(&kiosk_id).await?))
}

pub fn kiosk_router(controller: Arc<KioskController>) -> Router {
    Router::new()
        .route("/api/v1/kiosk/:kiosk_id", get(handle_view))
        .route("/api/v1/kiosk/:kiosk_id/start", post(handle_start))
        .route("/api/v1/kiosk/:kiosk_id/phone", post(handle_phone))
        .route("/api/v1/kiosk/:kiosk_id/register", post(handle_register))
        .route("/api/v1/kiosk/:kiosk_id/skip", post(handle_skip))
        .route("/api/v1/kiosk/:kiosk_id/points", post(handle_points))
        .route("/api/v1/kiosk/:kiosk_id/redeem", post(handle_redeem))
        .route("/api/v1/kiosk/:kiosk_id/reset-points", post(handle_reset_points))
        .route("/api/v1/kiosk/:kiosk_id/done", post(handle_done))
        .route("/api/v1/kiosk/:kiosk_id/cancel", post(handle_cancel))
        .with_state(KioskApiState { controller })
}
