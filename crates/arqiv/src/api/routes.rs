//! API route definitions.
//!
//! Route protection is explicit composition: the authentication gateway runs
//! as a router layer on everything protected, the viewer scope bridge runs
//! after it, and mutating file routes additionally carry a role requirement.

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get, routing::post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use arqiv_files::ViewerScope;

use crate::auth::{
    ADMIN_ROLE, ALL_ACCESS_PERMISSION, CurrentUser, auth_middleware, require_role,
};
use crate::config::ServerConfig;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(&server.allowed_origins);
    let max_body_size = server.max_upload_size_mb * 1024 * 1024;
    let trace_layer = TraceLayer::new_for_http();

    let auth_state = state.auth.clone();

    // Public routes (no authentication). Token refresh is public by nature:
    // the access token being replaced may already be expired.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/health", get(handlers::auth_health))
        .route("/api/auth/refresh", post(handlers::refresh))
        .with_state(state.clone());

    let auth_api = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .with_state(state.clone());

    // File routes: the read set is open to any authenticated caller, the
    // mutating set requires the admin role.
    let files_read = arqiv_files::routes::read_routes().with_state(state.files.clone());
    let files_admin = arqiv_files::routes::admin_routes()
        .route_layer(middleware::from_fn(require_role(ADMIN_ROLE)))
        .with_state(state.files.clone());
    let files_routes = Router::new().merge(files_read).merge(files_admin);

    let protected_routes = Router::new()
        .merge(auth_api)
        .nest("/api/files", files_routes)
        .layer(middleware::from_fn(scope_middleware))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(cors)
        .layer(trace_layer)
}

/// Bridge the verified identity into the file crate's view restriction.
async fn scope_middleware(mut req: Request, next: Next) -> Response {
    let scope = req.extensions().get::<CurrentUser>().map(|user| ViewerScope {
        full_access: user.has_role(ADMIN_ROLE) || user.has_permission(ALL_ACCESS_PERMISSION),
        resources: user.permissions().to_vec(),
    });
    if let Some(scope) = scope {
        req.extensions_mut().insert(scope);
    }
    next.run(req).await
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
    ];

    if allowed_origins.is_empty() {
        warn!("CORS: no origins configured, denying all cross-origin requests");
        return CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")))
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("CORS: skipping unparsable origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
