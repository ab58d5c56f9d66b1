//! API request handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CurrentUser, TokenRefresh};

use super::error::ApiResult;
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// The authenticated identity, echoed back to the caller.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    /// Roles granted through the configured frontend client specifically.
    pub client_roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Return the verified identity attached to this request.
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Json<IdentityResponse> {
    let client_roles = user
        .client_roles(state.auth.frontend_client())
        .to_vec();

    Json(IdentityResponse {
        user_id: user.id().to_string(),
        username: user.username().to_string(),
        email: user.email().to_string(),
        roles: user.roles().to_vec(),
        client_roles,
        permissions: user.permissions().to_vec(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Exchange a refresh token for a new token pair.
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenRefresh>> {
    let tokens = state
        .auth
        .provider()
        .refresh(&request.refresh_token)
        .await?;
    Ok(Json(tokens))
}

/// Provider reachability probe response.
#[derive(Debug, Serialize)]
pub struct AuthHealthResponse {
    pub status: &'static str,
    pub provider_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report whether the identity provider answers its discovery document.
pub async fn auth_health(State(state): State<AppState>) -> Json<AuthHealthResponse> {
    match state.auth.provider().health().await {
        Ok(health) => Json(AuthHealthResponse {
            status: "healthy",
            provider_available: true,
            realm: Some(health.realm),
            issuer: health.issuer,
            error: None,
        }),
        Err(err) => {
            warn!(error = %err, "identity provider health probe failed");
            Json(AuthHealthResponse {
                status: "unhealthy",
                provider_available: false,
                realm: None,
                issuer: None,
                error: Some(err.to_string()),
            })
        }
    }
}
