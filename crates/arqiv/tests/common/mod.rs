//! Test utilities and common setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use tempfile::TempDir;

use arqiv::api::{self, AppState};
use arqiv::auth::{
    AuthError, AuthState, Claims, ClientAccess, IdentityProvider, ProviderHealth, RealmAccess,
    TokenRefresh, UmaPermission,
};
use arqiv::config::ServerConfig;
use arqiv_files::FilesState;

pub const FRONTEND_CLIENT: &str = "arqiv_fe";

/// Scripted identity provider. Every call is counted so tests can assert
/// which provider round trips a request actually triggered.
pub struct FakeProvider {
    signature_valid: bool,
    introspection: Claims,
    /// `None` simulates a provider failure during the permission fetch.
    permissions: Option<Vec<UmaPermission>>,
    pub decode_calls: AtomicUsize,
    pub introspect_calls: AtomicUsize,
    pub permission_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(introspection: Claims) -> Arc<Self> {
        Arc::new(Self::new_inner(introspection))
    }

    pub fn with_permissions(introspection: Claims, resources: &[&str]) -> Arc<Self> {
        let grants = resources
            .iter()
            .map(|name| UmaPermission {
                rsname: Some(name.to_string()),
                rsid: None,
                scopes: Vec::new(),
            })
            .collect();
        let mut provider = Self::new_inner(introspection);
        provider.permissions = Some(grants);
        Arc::new(provider)
    }

    /// Permission fetch fails; everything else succeeds.
    pub fn with_failing_permissions(introspection: Claims) -> Arc<Self> {
        let mut provider = Self::new_inner(introspection);
        provider.permissions = None;
        Arc::new(provider)
    }

    /// Signature validation fails outright.
    pub fn with_invalid_signature() -> Arc<Self> {
        let mut provider = Self::new_inner(claims());
        provider.signature_valid = false;
        Arc::new(provider)
    }

    fn new_inner(introspection: Claims) -> Self {
        Self {
            signature_valid: true,
            introspection,
            permissions: Some(Vec::new()),
            decode_calls: AtomicUsize::new(0),
            introspect_calls: AtomicUsize::new(0),
            permission_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        use std::sync::atomic::Ordering::SeqCst;
        self.decode_calls.load(SeqCst)
            + self.introspect_calls.load(SeqCst)
            + self.permission_calls.load(SeqCst)
            + self.refresh_calls.load(SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn decode_and_validate(&self, _token: &str) -> Result<Claims, AuthError> {
        use std::sync::atomic::Ordering::SeqCst;
        self.decode_calls.fetch_add(1, SeqCst);
        if self.signature_valid {
            Ok(self.introspection.clone())
        } else {
            Err(AuthError::InvalidSignature(
                "signature verification failed".to_string(),
            ))
        }
    }

    async fn introspect(&self, _token: &str) -> Result<Claims, AuthError> {
        use std::sync::atomic::Ordering::SeqCst;
        self.introspect_calls.fetch_add(1, SeqCst);
        Ok(self.introspection.clone())
    }

    async fn fetch_resource_permissions(
        &self,
        _token: &str,
    ) -> Result<Vec<UmaPermission>, AuthError> {
        use std::sync::atomic::Ordering::SeqCst;
        self.permission_calls.fetch_add(1, SeqCst);
        match &self.permissions {
            Some(grants) => Ok(grants.clone()),
            None => Err(AuthError::ProviderUnreachable(
                "connection refused".to_string(),
            )),
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenRefresh, AuthError> {
        use std::sync::atomic::Ordering::SeqCst;
        self.refresh_calls.fetch_add(1, SeqCst);
        Ok(TokenRefresh {
            access_token: "refreshed-access-token".to_string(),
            refresh_token: Some("refreshed-refresh-token".to_string()),
            expires_in: Some(300),
        })
    }

    async fn health(&self) -> Result<ProviderHealth, AuthError> {
        Ok(ProviderHealth {
            realm: "test-realm".to_string(),
            issuer: Some("http://localhost:8080/realms/test-realm".to_string()),
        })
    }
}

/// Active claims for the canonical test user.
pub fn claims() -> Claims {
    Claims {
        active: true,
        sub: Some("u1".to_string()),
        exp: Some(Utc::now().timestamp() + 3600),
        name: Some("Alice".to_string()),
        email: Some("a@x.com".to_string()),
        ..Claims::default()
    }
}

pub fn with_realm_roles(mut claims: Claims, roles: &[&str]) -> Claims {
    claims.realm_access = RealmAccess {
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };
    claims
}

pub fn with_client_roles(mut claims: Claims, client: &str, roles: &[&str]) -> Claims {
    claims.resource_access.insert(
        client.to_string(),
        ClientAccess {
            roles: roles.iter().map(|r| r.to_string()).collect(),
        },
    );
    claims
}

pub fn inactive(mut claims: Claims) -> Claims {
    claims.active = false;
    claims
}

pub fn expired(mut claims: Claims) -> Claims {
    claims.exp = Some(Utc::now().timestamp() - 60);
    claims
}

/// Build the real application router over a scripted provider and a
/// temporary storage tree. The TempDir must be kept alive by the caller.
pub fn test_app(provider: Arc<FakeProvider>) -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("create test storage dir");
    let files = FilesState::new(dir.path());
    files
        .ensure_directories()
        .expect("create storage subdirectories");

    let auth = AuthState::new(provider, FRONTEND_CLIENT);
    let state = AppState::new(auth, files);
    let router = api::create_router(state, &ServerConfig::default());
    (router, dir)
}

/// Path of the served document root inside the test storage tree.
pub fn remote_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("remote")
}

/// Path of the backup area inside the test storage tree.
pub fn backup_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("backup")
}

pub const MULTIPART_BOUNDARY: &str = "arqiv-test-boundary";

/// Build a single-file multipart body and its content type.
pub fn multipart_body(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    (content_type, body)
}
