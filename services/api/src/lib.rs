//! Personal-finance API: accounts, API tokens and owner-scoped transactions

pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod ownership;
pub mod query;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

pub use routes::create_router;
pub use state::AppState;

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
