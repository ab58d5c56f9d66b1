//! Token claims and the per-request identity derived from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Realm-level role grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Role grants scoped to one registered client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A resource-level permission record as returned by the provider's
/// authorization endpoint. Only the resource name feeds authorization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UmaPermission {
    pub rsname: Option<String>,
    pub rsid: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Claims of a bearer token, as decoded from the token payload or returned by
/// the provider's introspection endpoint. Unknown fields are carried along
/// untyped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Introspection activity flag; absent on a decoded payload.
    #[serde(default)]
    pub active: bool,

    /// Subject (user ID).
    pub sub: Option<String>,

    /// Expiration time (epoch seconds).
    pub exp: Option<i64>,

    /// Display name.
    pub name: Option<String>,

    /// Preferred username (OIDC claim).
    pub preferred_username: Option<String>,

    /// Email address.
    pub email: Option<String>,

    /// Realm-level roles.
    #[serde(default)]
    pub realm_access: RealmAccess,

    /// Per-client roles, keyed by client ID.
    #[serde(default)]
    pub resource_access: HashMap<String, ClientAccess>,

    /// All other claims.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Union of realm roles and every client's roles, deduplicated.
    pub fn all_roles(&self) -> Vec<String> {
        let mut roles = self.realm_access.roles.clone();
        for access in self.resource_access.values() {
            for role in &access.roles {
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
            }
        }
        roles
    }

    /// Roles granted through one specific client.
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.resource_access
            .get(client_id)
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }
}

/// The authenticated principal for one request.
///
/// Built by the gateway after successful verification, placed into request
/// extensions, and dropped with the request. Handlers only ever read it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Verified claims, as reported by introspection.
    pub claims: Claims,
    roles: Vec<String>,
    permissions: Vec<String>,
}

impl CurrentUser {
    /// Derive the identity from verified claims and resolved resource
    /// permissions.
    pub fn new(claims: Claims, permissions: Vec<String>) -> Self {
        let roles = claims.all_roles();
        Self {
            claims,
            roles,
            permissions,
        }
    }

    /// Subject (user ID).
    pub fn id(&self) -> &str {
        self.claims.sub.as_deref().unwrap_or_default()
    }

    /// Display name, falling back to the OIDC preferred username.
    pub fn username(&self) -> &str {
        self.claims
            .name
            .as_deref()
            .or(self.claims.preferred_username.as_deref())
            .unwrap_or_default()
    }

    /// Email address.
    pub fn email(&self) -> &str {
        self.claims.email.as_deref().unwrap_or_default()
    }

    /// Union of realm and per-client roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Resource names the caller holds permissions for.
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Roles granted through one specific client.
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.claims.client_roles(client_id)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
