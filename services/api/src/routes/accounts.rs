//! Account endpoints: registration, login, logout, profile and avatar

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::error::DatabaseError;
use rand::{Rng, distributions::Alphanumeric};
use tracing::{error, info, warn};

use super::json_body;
use crate::{
    auth::password::{hash_password, verify_password},
    error::ApiError,
    middleware::AuthUser,
    models::{
        MessageResponse,
        user::{
            AvatarResponse, LoginRequest, ProfileResponse, RegisterRequest, RegisterResponse,
            TokenResponse, User,
        },
    },
    state::AppState,
    validation::validate_registration,
};

fn profile_of(state: &AppState, user: &User) -> ProfileResponse {
    let avatar = user.avatar_key.as_deref().map(|key| state.avatars.url(key));
    ProfileResponse::new(user, avatar)
}

fn invalid_credentials() -> ApiError {
    ApiError::invalid("Invalid credentials")
}

/// Register a new user and return their first token
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (mut new_user, password) =
        validate_registration(json_body(payload)?).map_err(ApiError::InvalidInput)?;
    new_user.password_hash = hash_password(&password)?;

    let user = state.users.create(new_user).await.map_err(|e| match e {
        DatabaseError::Duplicate(field) if field == "username" => {
            ApiError::Conflict("Username is already taken".to_string())
        }
        DatabaseError::Duplicate(field) if field == "email" => {
            ApiError::Conflict("Email is already registered".to_string())
        }
        e => {
            error!("Failed to create user: {}", e);
            ApiError::InternalServerError
        }
    })?;

    let token = state.authenticator.issue_new(&user).await?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            token,
            user: profile_of(&state, &user),
        }),
    ))
}

/// Exchange username and password for an API token
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = json_body(payload)?;

    let user = state
        .users
        .find_by_username(&credentials.username)
        .await
        .map_err(|e| {
            error!("Failed to look up user for login: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active || !verify_password(&credentials.password, &user.password_hash) {
        warn!("Failed login attempt for user {}", user.id);
        return Err(invalid_credentials());
    }

    state
        .users
        .record_login(user.id, Utc::now())
        .await
        .map_err(|e| {
            error!("Failed to record login for user {}: {}", user.id, e);
            ApiError::InternalServerError
        })?;

    let token = state.authenticator.issue_or_reuse(&user).await?;

    Ok(Json(TokenResponse { token }))
}

/// Revoke the caller's tokens
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.authenticator.revoke(user.id).await?;
    info!("User {} logged out", user.username);

    Ok(Json(MessageResponse::new("Successfully logged out")))
}

async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(auth.id)
        .await
        .map_err(|e| {
            error!("Failed to load user {}: {}", auth.id, e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::Unauthenticated)
}

/// The caller's profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &user).await?;

    Ok(Json(profile_of(&state, &user)))
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::invalid(format!(
        "File is too large (maximum {}MB)",
        max_bytes / (1024 * 1024)
    ))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_bytes)
    } else {
        warn!("Malformed avatar upload: {}", e);
        ApiError::invalid("Invalid multipart body")
    }
}

/// File extension for a stored avatar, from the upload name or its MIME type
fn avatar_extension(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| {
        match content_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
        .to_string()
    })
}

/// Replace the caller's avatar with the uploaded `avatar` file
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = state.avatar_max_bytes;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let extension = avatar_extension(field.file_name(), &content_type);
        let body = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        upload = Some((body, content_type, extension));
        break;
    }

    let (body, content_type, extension) =
        upload.ok_or_else(|| ApiError::invalid("Avatar file is missing"))?;
    if body.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    let user = current_user(&state, &auth).await?;

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let key = format!("avatars/{}/{}.{}", user.id, suffix, extension);

    // The previous object is only removed once the user row points at the new one.
    state
        .avatars
        .put(&key, body, &content_type)
        .await
        .map_err(|e| {
            error!("Failed to store avatar for user {}: {:#}", user.id, e);
            ApiError::InternalServerError
        })?;

    if let Err(e) = state.users.set_avatar(user.id, Some(&key)).await {
        error!("Failed to record avatar for user {}: {}", user.id, e);
        if let Err(e) = state.avatars.delete(&key).await {
            warn!("Failed to remove unrecorded avatar {}: {:#}", key, e);
        }
        return Err(ApiError::InternalServerError);
    }

    if let Some(previous) = user.avatar_key.as_deref().filter(|previous| *previous != key) {
        if let Err(e) = state.avatars.delete(previous).await {
            warn!("Failed to delete previous avatar {}: {:#}", previous, e);
        }
    }

    info!("Updated avatar for user {}", user.id);

    Ok(Json(AvatarResponse {
        message: "Avatar updated successfully".to_string(),
        avatar: state.avatars.url(&key),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_the_file_name() {
        assert_eq!(avatar_extension(Some("me.PNG"), "image/jpeg"), "png");
        assert_eq!(avatar_extension(Some("me"), "image/jpeg"), "jpg");
        assert_eq!(avatar_extension(None, "image/webp"), "webp");
        assert_eq!(avatar_extension(Some("../../x.p/ng"), "text/plain"), "bin");
    }

    #[test]
    fn size_message_names_the_limit() {
        match too_large(5 * 1024 * 1024) {
            ApiError::InvalidInput(msg) => assert_eq!(msg, "File is too large (maximum 5MB)"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
