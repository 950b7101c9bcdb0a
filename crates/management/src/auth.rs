//! Bearer token authentication for the dashboard.
//!
//! A single admin account comes from configuration. Tokens are random and
//! held in the management store until they expire.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use rand::Rng;
use rewards_core::config::AuthConfig;
use rewards_core::error::{RewardsError, RewardsResult};
use tracing::{info, warn};

use crate::handlers::ManagementState;
use crate::models::{AuditAction, ErrorResponse, LoginRequest, LoginResponse};
use crate::store::{AdminSession, ManagementStore};

const TOKEN_PREFIX: &str = "rk_";

/// Validate a login request and issue a bearer token.
pub fn authenticate(
    store: &ManagementStore,
    config: &AuthConfig,
    req: &LoginRequest,
) -> RewardsResult<LoginResponse> {
    if req.username != config.admin_username || req.password != config.admin_password {
        warn!(user = %req.username, "Dashboard login rejected");
        metrics::counter!("management.login_failures").increment(1);
        return Err(RewardsError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(config.token_ttl_hours);
    store.insert_session(
        token.clone(),
        AdminSession {
            user: req.username.clone(),
            expires_at,
        },
    );
    store.log_audit(&req.username, AuditAction::Login, "session", "-", serde_json::json!({}));
    info!(user = %req.username, "Dashboard login");
    Ok(LoginResponse {
        token,
        user: req.username.clone(),
        expires_at,
    })
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

fn unauthorized(error: &str, message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Reject requests without a live bearer token. The authenticated user is
/// attached to the request as an [`AdminSession`] extension.
pub async fn require_bearer(
    State(state): State<ManagementState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized(
            "missing_auth",
            "Authorization header with Bearer token required",
        );
    };
    match state.store.session(token, Utc::now()) {
        Some(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        None => unauthorized("invalid_token", "Invalid or expired bearer token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate() {
        let store = ManagementStore::new();
        let config = AuthConfig::default();

        let bad = LoginRequest {
            username: "admin".to_string(),
            password: "nope".to_string(),
        };
        assert!(matches!(
            authenticate(&store, &config, &bad),
            Err(RewardsError::Unauthorized(_))
        ));

        let good = LoginRequest {
            username: "admin".to_string(),
            password: "admin".to_string(),
        };
        let resp = authenticate(&store, &config, &good).unwrap();
        assert!(resp.token.starts_with(TOKEN_PREFIX));
        assert_eq!(resp.token.len(), TOKEN_PREFIX.len() + 64);
        assert_eq!(store.session(&resp.token, Utc::now()).unwrap().user, "admin");
    }
}
