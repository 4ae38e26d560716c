//! Authentication middleware for API token validation

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiError, models::user::User, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Pull the presented token out of the `Authorization` header
///
/// Accepts `Bearer <token>` and the older `Token <token>` scheme.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Token "))
        .map(|token| token.trim().to_string())
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = presented_token(req.headers()).ok_or_else(|| {
        debug!("Request without usable Authorization header");
        ApiError::Unauthenticated
    })?;

    let user = state.authenticator.resolve(&token).await?;

    // Insert the user into the request extensions
    req.extensions_mut().insert(AuthUser::from(&user));

    Ok(next.run(req).await)
}
