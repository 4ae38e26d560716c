//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::{error::ApiError, middleware::auth_middleware, state::AppState};

pub mod accounts;
pub mod transactions;

/// Multipart framing allowance on top of the avatar size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let avatar_body_limit = state.avatar_max_bytes + MULTIPART_OVERHEAD;

    let protected_routes = Router::new()
        .route("/transactions/create", post(transactions::create_transaction))
        .route("/transactions/", get(transactions::list_transactions))
        .route("/transactions/categories", get(transactions::list_categories))
        .route("/transactions/summary", get(transactions::transaction_summary))
        .route("/transactions/:id", delete(transactions::delete_transaction))
        .route("/logout/", post(accounts::logout))
        .route("/profile/", get(accounts::profile))
        .route(
            "/avatar/",
            post(accounts::upload_avatar).layer(DefaultBodyLimit::max(avatar_body_limit)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/register/", post(accounts::register))
        .route("/token/", post(accounts::login));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        None => "memory",
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            Ok(false) | Err(_) => {
                warn!("Database health check failed");
                "unavailable"
            }
        },
    };

    Json(json!({
        "status": if database == "unavailable" { "degraded" } else { "ok" },
        "service": "finance-api",
        "database": database,
    }))
}

/// Unwrap a JSON body, reporting malformed payloads as invalid input
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::invalid("Request body must be a valid JSON object")
    })
}
