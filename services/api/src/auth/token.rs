//! Opaque bearer tokens
//!
//! A token is 40 random alphanumeric characters with no internal structure;
//! the token store is the only way to map it back to a user.

use common::error::DatabaseError;
use rand::{Rng, distributions::Alphanumeric};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::user::User,
    repositories::{TokenRepository, UserRepository},
};

/// Length of every issued token
pub const TOKEN_LENGTH: usize = 40;

/// Attempts at minting a token that does not collide with an existing one
const ISSUE_ATTEMPTS: usize = 3;

/// Generate a fresh random token
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// True when `token` could have been issued by [`generate_token`]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Resolves, issues and revokes API tokens
#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserRepository>,
}

impl Authenticator {
    pub fn new(tokens: Arc<dyn TokenRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { tokens, users }
    }

    /// Map a presented token to its active user
    ///
    /// Malformed tokens are rejected without touching the store.
    pub async fn resolve(&self, token: &str) -> ApiResult<User> {
        if !is_well_formed(token) {
            debug!("Rejecting malformed token");
            return Err(ApiError::Unauthenticated);
        }

        let user_id = self
            .tokens
            .find_user_id(token)
            .await
            .map_err(|e| {
                error!("Failed to look up token: {}", e);
                ApiError::InternalServerError
            })?
            .ok_or(ApiError::Unauthenticated)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                error!("Failed to load user {}: {}", user_id, e);
                ApiError::InternalServerError
            })?
            .ok_or(ApiError::Unauthenticated)?;

        if !user.is_active {
            warn!("Token presented for inactive user {}", user.id);
            return Err(ApiError::Unauthenticated);
        }

        Ok(user)
    }

    /// The user's current token, or a new one when none exists
    pub async fn issue_or_reuse(&self, user: &User) -> ApiResult<String> {
        for _ in 0..ISSUE_ATTEMPTS {
            match self.tokens.find_or_insert(user.id, &generate_token()).await {
                Ok(token) => return Ok(token),
                Err(DatabaseError::Duplicate(_)) => {
                    warn!("Generated token collided, retrying");
                }
                Err(e) => {
                    error!("Failed to look up token for user {}: {}", user.id, e);
                    return Err(ApiError::InternalServerError);
                }
            }
        }

        error!("Could not mint a unique token for user {}", user.id);
        Err(ApiError::InternalServerError)
    }

    /// Always mint and store a new token; earlier tokens stay valid
    pub async fn issue_new(&self, user: &User) -> ApiResult<String> {
        for _ in 0..ISSUE_ATTEMPTS {
            let token = generate_token();
            match self.tokens.insert(user.id, &token).await {
                Ok(()) => return Ok(token),
                Err(DatabaseError::Duplicate(_)) => {
                    warn!("Generated token collided, retrying");
                }
                Err(e) => {
                    error!("Failed to store token for user {}: {}", user.id, e);
                    return Err(ApiError::InternalServerError);
                }
            }
        }

        error!("Could not mint a unique token for user {}", user.id);
        Err(ApiError::InternalServerError)
    }

    /// Delete every token of the user; revoking nothing is not an error
    pub async fn revoke(&self, user_id: Uuid) -> ApiResult<()> {
        let removed = self.tokens.delete_for_user(user_id).await.map_err(|e| {
            error!("Failed to revoke tokens for user {}: {}", user_id, e);
            ApiError::InternalServerError
        })?;

        debug!("Revoked {} token(s) for user {}", removed, user_id);
        Ok(())
    }
}
