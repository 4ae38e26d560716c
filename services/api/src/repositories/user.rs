//! User repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::decode_error;
use crate::models::user::{Gender, NewUser, User};

/// Account store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with `Duplicate("username" | "email")` on a clash
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;

    /// Stamp `last_login`
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()>;

    /// Replace (or clear) the stored avatar key
    async fn set_avatar(&self, id: Uuid, avatar_key: Option<&str>) -> DatabaseResult<()>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     birth_date, gender, avatar_key, balance, is_active, last_login, date_joined";

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let gender = match row.try_get::<Option<String>, _>("gender")? {
        Some(raw) => Some(
            Gender::parse(raw.trim())
                .ok_or_else(|| decode_error(format!("unknown gender {raw:?}")))?,
        ),
        None => None,
    };

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        birth_date: row.try_get("birth_date")?,
        gender,
        avatar_key: row.try_get("avatar_key")?,
        balance: row.try_get("balance")?,
        is_active: row.try_get("is_active")?,
        last_login: row.try_get("last_login")?,
        date_joined: row.try_get("date_joined")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.username);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, birth_date, gender)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.birth_date)
        .bind(new_user.gender.map(Gender::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        user_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, avatar_key: Option<&str>) -> DatabaseResult<()> {
        info!("Updating avatar for user: {}", id);

        sqlx::query("UPDATE users SET avatar_key = $2 WHERE id = $1")
            .bind(id)
            .bind(avatar_key)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
