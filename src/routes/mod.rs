use axum::{
    extract::State,
    middleware::{self as axum_middleware},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::types::{ProfilePatch, Role, SessionStatus};
use crate::auth::{AuthManager, SessionReader};
use crate::error::AuthError;
use crate::middleware;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway_api_key: String,
    pub manager: Arc<AuthManager>,
    pub session: SessionReader,
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Session routes (require the gateway key)
pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/session",
            get(get_session_handler)
                .post(sign_in_handler)
                .delete(sign_out_handler),
        )
        .route("/v1/profile", patch(update_profile_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "EduVerse session gateway is running",
        "version": VERSION,
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
    }))
}

fn session_body(status: &SessionStatus) -> Value {
    json!({
        "status": status.label(),
        "session": status.session(),
    })
}

/// Current session status and, if authenticated, the (identity, profile) pair
async fn get_session_handler(State(state): State<AppState>) -> Json<Value> {
    Json(session_body(&state.session.current()))
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Sign in with role verification
async fn sign_in_handler(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Value>, AuthError> {
    let destination = state
        .manager
        .sign_in(&request.email, &request.password, request.role)
        .await?;

    let status = state.manager.status();
    Ok(Json(json!({
        "status": "signed_in",
        "redirect": destination.path(),
        "session": status.session(),
    })))
}

/// Sign out; a no-op success when already anonymous
async fn sign_out_handler(State(state): State<AppState>) -> Result<Json<Value>, AuthError> {
    let destination = state.manager.sign_out().await?;
    Ok(Json(json!({
        "status": "signed_out",
        "redirect": destination.path(),
    })))
}

/// Partial profile update for the authenticated user
async fn update_profile_handler(
    State(state): State<AppState>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Value>, AuthError> {
    let profile = state.manager.update_profile(patch).await?;
    Ok(Json(json!({
        "status": "updated",
        "profile": profile,
    })))
}
