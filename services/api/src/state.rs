//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    auth::Authenticator,
    config::DEFAULT_AVATAR_MAX_BYTES,
    repositories::{
        MemoryRepository, PgTokenRepository, PgTransactionRepository, PgUserRepository,
        TransactionRepository, UserRepository,
    },
    storage::{AvatarStorage, MemoryAvatarStorage},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present when running on PostgreSQL; used by the health check
    pub db_pool: Option<PgPool>,
    pub users: Arc<dyn UserRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub authenticator: Authenticator,
    pub avatars: Arc<dyn AvatarStorage>,
    pub avatar_max_bytes: usize,
}

impl AppState {
    /// State backed by PostgreSQL repositories
    pub fn postgres(pool: PgPool, avatars: Arc<dyn AvatarStorage>, avatar_max_bytes: usize) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));

        Self {
            authenticator: Authenticator::new(
                Arc::new(PgTokenRepository::new(pool.clone())),
                users.clone(),
            ),
            transactions: Arc::new(PgTransactionRepository::new(pool.clone())),
            users,
            avatars,
            avatar_max_bytes,
            db_pool: Some(pool),
        }
    }

    /// State backed by a single in-memory repository
    pub fn memory(avatars: Arc<dyn AvatarStorage>, avatar_max_bytes: usize) -> Self {
        let repo = Arc::new(MemoryRepository::new());

        Self {
            db_pool: None,
            users: repo.clone(),
            transactions: repo.clone(),
            authenticator: Authenticator::new(repo.clone(), repo),
            avatars,
            avatar_max_bytes,
        }
    }

    /// Fully in-memory state with default limits
    pub fn in_memory() -> Self {
        Self::memory(
            Arc::new(MemoryAvatarStorage::new("/media")),
            DEFAULT_AVATAR_MAX_BYTES as usize,
        )
    }
}
