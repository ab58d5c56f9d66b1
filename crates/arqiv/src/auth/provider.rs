//! Identity provider seam.
//!
//! The gateway talks to the provider through [`IdentityProvider`] so tests
//! (and any future provider) can substitute their own implementation.
//! [`KeycloakProvider`] is the production implementation over the standard
//! OpenID Connect / UMA endpoints of a Keycloak realm.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::claims::{Claims, UmaPermission};
use super::error::AuthError;
use crate::config::AuthSettings;

const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// The three verification calls the gateway needs, plus the token-lifecycle
/// operations the auth API exposes on top of them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate the token signature against the provider's published keys and
    /// return the decoded payload. Expiry is NOT checked here; the verifier
    /// owns that rule.
    async fn decode_and_validate(&self, token: &str) -> Result<Claims, AuthError>;

    /// Ask the provider whether the token is currently active, returning the
    /// introspected claims.
    async fn introspect(&self, token: &str) -> Result<Claims, AuthError>;

    /// Fetch the token's resource-level permission grants.
    async fn fetch_resource_permissions(&self, token: &str)
    -> Result<Vec<UmaPermission>, AuthError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, AuthError>;

    /// Probe the provider's discovery document.
    async fn health(&self) -> Result<ProviderHealth, AuthError>;
}

/// Token pair returned by a refresh exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Result of a provider reachability probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub realm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WellKnown {
    issuer: Option<String>,
}

/// Keycloak client for one realm.
pub struct KeycloakProvider {
    client: reqwest::Client,
    realm_url: String,
    realm: String,
    client_id: String,
    client_secret: String,
}

impl KeycloakProvider {
    /// Build a provider client from settings. The HTTP client carries an
    /// explicit timeout and never follows redirects: key material and token
    /// endpoints have fixed, well-known locations.
    pub fn new(settings: &AuthSettings, client_secret: String) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Other(format!("failed to build provider client: {e}")))?;

        let server_url = settings.server_url.trim_end_matches('/');
        Ok(Self {
            client,
            realm_url: format!("{}/realms/{}", server_url, settings.realm),
            realm: settings.realm.clone(),
            client_id: settings.client_id.clone(),
            client_secret,
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/protocol/openid-connect/{}", self.realm_url, suffix)
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(self.endpoint("certs"))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "signing key fetch returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::Other(format!("malformed signing key set: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn decode_and_validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidSignature("token header missing kid".to_string()))?;

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks.find(&kid).ok_or_else(|| {
            AuthError::InvalidSignature(format!("no signing key published for kid {kid}"))
        })?;

        let algorithm = jwk_algorithm(jwk)?;
        // A token claiming a different algorithm than its key is an attack,
        // not a configuration problem.
        if header.alg != algorithm {
            return Err(AuthError::InvalidSignature(format!(
                "token algorithm {:?} does not match key algorithm {:?}",
                header.alg, algorithm
            )));
        }
        let decoding_key = jwk_decoding_key(jwk)?;

        let mut validation = Validation::new(algorithm);
        // Expiry is enforced against the introspected claims by the verifier.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

        debug!(kid, "token signature verified");
        Ok(data.claims)
    }

    async fn introspect(&self, token: &str) -> Result<Claims, AuthError> {
        let response = self
            .client
            .post(self.endpoint("token/introspect"))
            .form(&[
                ("token", token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "introspection returned {}",
                response.status()
            )));
        }

        response
            .json::<Claims>()
            .await
            .map_err(|e| AuthError::Other(format!("malformed introspection response: {e}")))
    }

    async fn fetch_resource_permissions(
        &self,
        token: &str,
    ) -> Result<Vec<UmaPermission>, AuthError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .bearer_auth(token)
            .form(&[
                ("grant_type", UMA_TICKET_GRANT),
                ("audience", self.client_id.as_str()),
                ("response_mode", "permissions"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "permission lookup returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<UmaPermission>>()
            .await
            .map_err(|e| AuthError::Other(format!("malformed permission response: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, AuthError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "token refresh returned {}",
                response.status()
            )));
        }

        response
            .json::<TokenRefresh>()
            .await
            .map_err(|e| AuthError::Other(format!("malformed token response: {e}")))
    }

    async fn health(&self) -> Result<ProviderHealth, AuthError> {
        let response = self
            .client
            .get(format!("{}/.well-known/openid-configuration", self.realm_url))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "discovery document returned {}",
                response.status()
            )));
        }

        let well_known = response
            .json::<WellKnown>()
            .await
            .map_err(|e| AuthError::Other(format!("malformed discovery document: {e}")))?;

        Ok(ProviderHealth {
            realm: self.realm.clone(),
            issuer: well_known.issuer,
        })
    }
}

fn transport_error(err: reqwest::Error) -> AuthError {
    if err.is_connect() || err.is_timeout() {
        AuthError::ProviderUnreachable(err.to_string())
    } else {
        AuthError::Other(err.to_string())
    }
}

fn jwk_algorithm(jwk: &Jwk) -> Result<Algorithm, AuthError> {
    if let Some(alg) = &jwk.common.key_algorithm {
        return match alg {
            KeyAlgorithm::RS256 => Ok(Algorithm::RS256),
            KeyAlgorithm::RS384 => Ok(Algorithm::RS384),
            KeyAlgorithm::RS512 => Ok(Algorithm::RS512),
            KeyAlgorithm::ES256 => Ok(Algorithm::ES256),
            KeyAlgorithm::ES384 => Ok(Algorithm::ES384),
            other => Err(AuthError::InvalidSignature(format!(
                "unsupported key algorithm {other:?}"
            ))),
        };
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            _ => Err(AuthError::InvalidSignature(format!(
                "unsupported curve {:?}",
                ec.curve
            ))),
        },
        _ => Err(AuthError::InvalidSignature(
            "unsupported key type".to_string(),
        )),
    }
}

fn jwk_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| AuthError::InvalidSignature(e.to_string())),
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y)
            .map_err(|e| AuthError::InvalidSignature(e.to_string())),
        _ => Err(AuthError::InvalidSignature(
            "unsupported key type".to_string(),
        )),
    }
}
