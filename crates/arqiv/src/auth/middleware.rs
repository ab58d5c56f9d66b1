//! Authentication gateway middleware and the access policy guard.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use futures::future::BoxFuture;
use tracing::warn;

use super::claims::CurrentUser;
use super::error::AuthError;
use super::provider::IdentityProvider;
use super::verifier::TokenVerifier;

/// Role that passes every role check.
pub const ADMIN_ROLE: &str = "admin";

/// Resource permission that passes every permission check.
pub const ALL_ACCESS_PERMISSION: &str = "api_all_endpoints";

/// Extract a Bearer token from an Authorization header value.
/// Exactly one scheme and one token; the scheme is case-insensitive.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    verifier: TokenVerifier,
    frontend_client: Arc<String>,
}

impl AuthState {
    /// Create auth state around a provider. `frontend_client` names the
    /// client whose role grants the frontend asks about directly.
    pub fn new(provider: Arc<dyn IdentityProvider>, frontend_client: impl Into<String>) -> Self {
        Self {
            verifier: TokenVerifier::new(provider),
            frontend_client: Arc::new(frontend_client.into()),
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        self.verifier.provider().clone()
    }

    pub fn frontend_client(&self) -> &str {
        &self.frontend_client
    }
}

/// Extract the authenticated identity from request extensions.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication gateway.
///
/// Requires a well-formed bearer header, verifies the token against the
/// identity provider, and injects [`CurrentUser`] into request extensions.
/// Header problems reject the request before the provider is ever contacted;
/// verification failures reject it before any handler runs.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;
    let header_value = header_value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = bearer_token_from_header(header_value)?;

    let verified = match auth.verifier().verify(token).await {
        Ok(verified) => verified,
        Err(err) => {
            warn!(error = %err, "token verification failed");
            return Err(err);
        }
    };

    let user = CurrentUser::new(verified.claims, verified.permissions);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// An access requirement attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(&'static str),
    Permission(&'static str),
}

/// The access policy: exact string membership with a universal override per
/// kind. No wildcards, no hierarchies.
pub fn authorize(user: &CurrentUser, required: Option<&Requirement>) -> Result<(), AuthError> {
    let Some(required) = required else {
        return Ok(());
    };

    match required {
        Requirement::Role(role) => {
            if user.has_role(role) || user.has_role(ADMIN_ROLE) {
                Ok(())
            } else {
                Err(AuthError::InsufficientPermissions(format!(
                    "role '{role}' required for this operation"
                )))
            }
        }
        Requirement::Permission(permission) => {
            if user.has_permission(permission) || user.has_permission(ALL_ACCESS_PERMISSION) {
                Ok(())
            } else {
                Err(AuthError::InsufficientPermissions(format!(
                    "permission '{permission}' required for this operation"
                )))
            }
        }
    }
}

async fn enforce(requirement: Requirement, req: Request, next: Next) -> Result<Response, AuthError> {
    {
        let user = req
            .extensions()
            .get::<CurrentUser>()
            .ok_or(AuthError::MissingAuthHeader)?;
        authorize(user, Some(&requirement))?;
    }
    Ok(next.run(req).await)
}

/// Route layer requiring a role; wrap with `middleware::from_fn`.
pub fn require_role(
    role: &'static str,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Result<Response, AuthError>> + Clone + Send + 'static
{
    move |req, next| Box::pin(enforce(Requirement::Role(role), req, next))
}

/// Route layer requiring a resource permission; wrap with
/// `middleware::from_fn`.
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Result<Response, AuthError>> + Clone + Send + 'static
{
    move |req, next| Box::pin(enforce(Requirement::Permission(permission), req, next))
}
