//! User models and account payloads

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Self-declared gender; absent when the user did not say
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
    O,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::O => "O",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "M" => Some(Gender::M),
            "F" => Some(Gender::F),
            "O" => Some(Gender::O),
            _ => None,
        }
    }
}

/// User entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    /// Storage key of the current avatar object
    pub avatar_key: Option<String>,
    pub balance: Decimal,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

/// New user creation payload
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Request for user registration
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
}

/// Request for user login
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Response carrying an opaque API token
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public view of a user; never includes credentials
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub balance: Decimal,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
    pub is_active: bool,
    pub avatar: Option<String>,
}

impl ProfileResponse {
    pub fn new(user: &User, avatar: Option<String>) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            birth_date: user.birth_date,
            gender: user.gender,
            balance: user.balance,
            last_login: user.last_login,
            date_joined: user.date_joined,
            is_active: user.is_active,
            avatar,
        }
    }
}

/// Response for a successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub user: ProfileResponse,
}

/// Response for an avatar upload
#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub message: String,
    pub avatar: String,
}
