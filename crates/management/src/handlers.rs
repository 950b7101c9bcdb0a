//! Axum REST handlers for the management API.

use crate::admin::AdminService;
use crate::auth;
use crate::campaigns::CampaignManager;
use crate::error::ApiError;
use crate::models::*;
use crate::reports;
use crate::store::{AdminSession, ManagementStore};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use rewards_core::config::AuthConfig;
use rewards_core::types::{Business, Customer, NewReward, Reward, RewardPatch};
use rewards_core::RewardsBackend;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<ManagementStore>,
    pub admin: Arc<AdminService>,
    pub campaigns: Arc<CampaignManager>,
    pub backend: Arc<dyn RewardsBackend>,
    pub auth: AuthConfig,
}

// ─── Auth ──────────────────────────────────────────────────────────────────

pub async fn handle_login(
    State(state): State<ManagementState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    Ok(Json(auth::authenticate(&state.store, &state.auth, &req)?))
}

// ─── Customers ─────────────────────────────────────────────────────────────

pub async fn list_customers(
    State(state): State<ManagementState>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Vec<Customer>> {
    Ok(Json(state.admin.list_customers(&query).await?))
}

pub async fn get_customer(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CustomerDetail> {
    let customer = state.admin.get_customer(id).await?;
    Ok(Json(CustomerDetail {
        phone_display: customer.phone.display(),
        customer,
    }))
}

pub async fn create_customer(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.admin.create_customer(req, &session.user).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerRequest>,
) -> ApiResult<Customer> {
    Ok(Json(state.admin.update_customer(id, req, &session.user).await?))
}

pub async fn grant_points(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantPointsRequest>,
) -> ApiResult<Customer> {
    Ok(Json(state.admin.grant_points(id, req.points, &session.user).await?))
}

// ─── Rewards ───────────────────────────────────────────────────────────────

pub async fn list_rewards(
    State(state): State<ManagementState>,
    Query(query): Query<RewardQuery>,
) -> ApiResult<Vec<Reward>> {
    Ok(Json(state.admin.list_rewards(&query).await?))
}

pub async fn create_reward(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Json(req): Json<NewReward>,
) -> Result<(StatusCode, Json<Reward>), ApiError> {
    let reward = state.admin.create_reward(req, &session.user).await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn update_reward(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<RewardPatch>,
) -> ApiResult<Reward> {
    Ok(Json(state.admin.update_reward(id, req, &session.user).await?))
}

pub async fn toggle_reward(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
) -> ApiResult<Reward> {
    Ok(Json(state.admin.toggle_reward(id, &session.user).await?))
}

pub async fn delete_reward(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.delete_reward(id, &session.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn list_segments(State(state): State<ManagementState>) -> ApiResult<Vec<SegmentSummary>> {
    Ok(Json(state.admin.list_segments().await?))
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(State(state): State<ManagementState>) -> Json<Vec<Campaign>> {
    Json(state.store.list_campaigns())
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    Ok(Json(state.store.get_campaign(id)?))
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Json(req): Json<CampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    let campaign = state.campaigns.create(req, &session.user).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn update_campaign(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<CampaignRequest>,
) -> ApiResult<Campaign> {
    Ok(Json(state.campaigns.update(id, req, &session.user).await?))
}

pub async fn send_campaign(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    // Delivery finishes in the background; callers poll the campaign.
    let (campaign, _delivery) = state.campaigns.send(id, &session.user).await?;
    Ok((StatusCode::ACCEPTED, Json(campaign)))
}

pub async fn cancel_campaign(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    Ok(Json(state.campaigns.cancel(id, &session.user)?))
}

pub async fn delete_campaign(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.campaigns.delete(id, &session.user)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn campaign_history(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<CampaignTransition>> {
    state.store.get_campaign(id)?;
    Ok(Json(state.store.campaign_history(id)))
}

pub async fn preview_message(Json(req): Json<PreviewRequest>) -> Json<PreviewResponse> {
    Json(PreviewResponse {
        preview: CampaignManager::preview(&req.message_template),
    })
}

// ─── Reports ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub period: ReportPeriod,
}

pub async fn report(
    State(state): State<ManagementState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Report> {
    Ok(Json(
        reports::build_report(state.backend.as_ref(), query.period, Utc::now()).await?,
    ))
}

// ─── Settings ──────────────────────────────────────────────────────────────

pub async fn get_settings(State(state): State<ManagementState>) -> ApiResult<Business> {
    Ok(Json(state.admin.get_settings().await?))
}

pub async fn update_settings(
    State(state): State<ManagementState>,
    Extension(session): Extension<AdminSession>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<Business> {
    Ok(Json(state.admin.update_settings(req, &session.user).await?))
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

pub async fn audit_log(State(state): State<ManagementState>) -> Json<Vec<AuditLogEntry>> {
    Json(state.store.get_audit_log())
}
