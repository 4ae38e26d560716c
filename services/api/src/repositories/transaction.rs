//! Transaction repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::decode_error;
use crate::{
    models::transaction::{NewTransaction, Totals, Transaction, TransactionFilter, TransactionType},
    ownership::OwnerScope,
};

/// Transaction store
///
/// Every operation is confined to the rows of `owner`.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, owner: OwnerScope, new: NewTransaction) -> DatabaseResult<Transaction>;

    /// Matching rows, newest `date` first; same-date order is unspecified
    async fn list(
        &self,
        owner: OwnerScope,
        filter: TransactionFilter,
    ) -> DatabaseResult<Vec<Transaction>>;

    /// Distinct categories across all of the owner's rows
    async fn categories(&self, owner: OwnerScope) -> DatabaseResult<Vec<String>>;

    /// Income and expense sums over rows dated on or after `since`
    async fn totals_since(&self, owner: OwnerScope, since: NaiveDate) -> DatabaseResult<Totals>;

    /// Delete the row if it exists and belongs to `owner`; `false` otherwise
    async fn delete(&self, owner: OwnerScope, id: i64) -> DatabaseResult<bool>;
}

/// PostgreSQL-backed transaction repository
#[derive(Clone)]
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    /// Create a new transaction repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, sqlx::Error> {
    let raw_type: String = row.try_get("transaction_type")?;
    let transaction_type = TransactionType::parse(&raw_type)
        .ok_or_else(|| decode_error(format!("unknown transaction type {raw_type:?}")))?;

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        transaction_type,
        category: row.try_get("category")?,
        date: row.try_get("date")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn insert(&self, owner: OwnerScope, new: NewTransaction) -> DatabaseResult<Transaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount, transaction_type, category, date, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, amount, transaction_type, category, date, description
            "#,
        )
        .bind(owner.user_id())
        .bind(new.amount)
        .bind(new.transaction_type.as_str())
        .bind(&new.category)
        .bind(new.date)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        transaction_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn list(
        &self,
        owner: OwnerScope,
        filter: TransactionFilter,
    ) -> DatabaseResult<Vec<Transaction>> {
        // NULL parameters disable the corresponding predicate.
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, transaction_type, category, date, description
            FROM transactions
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR transaction_type = $2)
              AND ($3::DATE IS NULL OR date >= $3)
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(owner.user_id())
        .bind(filter.transaction_type.map(TransactionType::as_str))
        .bind(filter.since)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(transaction_from_row)
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Query)
    }

    async fn categories(&self, owner: OwnerScope) -> DatabaseResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT category FROM transactions WHERE user_id = $1")
            .bind(owner.user_id())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| row.try_get("category"))
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Query)
    }

    async fn totals_since(&self, owner: OwnerScope, since: NaiveDate) -> DatabaseResult<Totals> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE transaction_type = 'income'), 0)::NUMERIC(14, 2) AS income,
                COALESCE(SUM(amount) FILTER (WHERE transaction_type = 'expense'), 0)::NUMERIC(14, 2) AS expenses
            FROM transactions
            WHERE user_id = $1 AND date >= $2
            "#,
        )
        .bind(owner.user_id())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(Totals {
            income: row.try_get("income").map_err(DatabaseError::Query)?,
            expenses: row.try_get("expenses").map_err(DatabaseError::Query)?,
        })
    }

    async fn delete(&self, owner: OwnerScope, id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner.user_id())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
