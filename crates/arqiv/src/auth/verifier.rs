//! Bearer token verification.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::claims::Claims;
use super::error::AuthError;
use super::provider::IdentityProvider;

/// Outcome of a successful verification: the introspected claims plus the
/// resolved resource permission names.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: Claims,
    pub permissions: Vec<String>,
}

/// Orders the provider calls for one bearer token and applies the activity
/// and expiry rules. Every request re-verifies; nothing is cached here.
#[derive(Clone)]
pub struct TokenVerifier {
    provider: Arc<dyn IdentityProvider>,
}

impl TokenVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Verify a bearer token.
    ///
    /// Signature, activity and expiry are each independently fatal. Expiry is
    /// checked against wall-clock time even when introspection reports the
    /// token active, so a stale introspection answer or skewed provider clock
    /// cannot keep an expired token alive. A missing `exp` claim counts as
    /// expired.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.provider.decode_and_validate(token).await?;

        let claims = self.provider.introspect(token).await?;
        if !claims.active {
            return Err(AuthError::TokenInactive);
        }

        let expired = claims.exp.is_none_or(|exp| Utc::now().timestamp() > exp);
        if expired {
            return Err(AuthError::TokenExpired);
        }

        // Resource permissions are additive; a failed lookup must not turn an
        // authenticated request into a rejected one.
        let permissions = match self.provider.fetch_resource_permissions(token).await {
            Ok(grants) => grants.into_iter().filter_map(|g| g.rsname).collect(),
            Err(err) => {
                warn!(error = %err, "resource permission lookup failed, continuing without grants");
                Vec::new()
            }
        };

        Ok(VerifiedToken {
            claims,
            permissions,
        })
    }
}
