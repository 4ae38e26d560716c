//! API token repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Storage of opaque bearer tokens, each bound to exactly one user
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Owner of `token`, if the token exists
    async fn find_user_id(&self, token: &str) -> DatabaseResult<Option<Uuid>>;

    /// Most recently issued token of `user_id`, storing `candidate` when the
    /// user has none
    ///
    /// Lookup and insert are atomic per user, so concurrent callers for the
    /// same user all receive the same token.
    async fn find_or_insert(&self, user_id: Uuid, candidate: &str) -> DatabaseResult<String>;

    async fn insert(&self, user_id: Uuid, token: &str) -> DatabaseResult<()>;

    /// Remove every token of `user_id`, returning how many were removed
    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<u64>;
}

/// PostgreSQL-backed token repository
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    /// Create a new token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn find_user_id(&self, token: &str) -> DatabaseResult<Option<Uuid>> {
        let row = sqlx::query("SELECT user_id FROM auth_tokens WHERE key = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.map(|row| row.try_get("user_id"))
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_or_insert(&self, user_id: Uuid, candidate: &str) -> DatabaseResult<String> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        // Serializes concurrent logins of the same user
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

        let existing = sqlx::query(
            r#"
            SELECT key
            FROM auth_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let token = match existing {
            Some(row) => row.try_get("key").map_err(DatabaseError::Query)?,
            None => {
                sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)")
                    .bind(candidate)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from_query)?;
                candidate.to_string()
            }
        };

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(token)
    }

    async fn insert(&self, user_id: Uuid, token: &str) -> DatabaseResult<()> {
        sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }
}
