//! Repositories for database operations
//!
//! Every store is a trait object so handlers can run against PostgreSQL in
//! production and against [`MemoryRepository`] in tests.

pub mod memory;
pub mod token;
pub mod transaction;
pub mod user;

pub use memory::MemoryRepository;
pub use token::{PgTokenRepository, TokenRepository};
pub use transaction::{PgTransactionRepository, TransactionRepository};
pub use user::{PgUserRepository, UserRepository};

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}
