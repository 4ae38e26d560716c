//! Transaction endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use super::json_body;
use crate::{
    error::ApiError,
    ledger,
    middleware::AuthUser,
    models::{
        MessageResponse,
        transaction::{
            CategoriesResponse, CreateTransactionRequest, CreatedTransactionResponse,
            SummaryResponse, TransactionItem, TransactionListQuery, TransactionListResponse,
        },
    },
    ownership::OwnerScope,
    query::TransactionQuery,
    state::AppState,
};

/// Record a new transaction for the caller
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let transaction =
        ledger::create(state.transactions.as_ref(), OwnerScope::from(&user), request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedTransactionResponse::from(transaction)),
    ))
}

/// List the caller's transactions, optionally filtered by type and period
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TransactionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = TransactionQuery::from_params(&params);
    let transactions = ledger::list(
        state.transactions.as_ref(),
        OwnerScope::from(&user),
        &query,
        Utc::now(),
    )
    .await?;

    Ok(Json(TransactionListResponse {
        transactions: transactions.into_iter().map(TransactionItem::from).collect(),
    }))
}

/// Distinct categories used by the caller
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let categories =
        ledger::categories(state.transactions.as_ref(), OwnerScope::from(&user)).await?;

    Ok(Json(CategoriesResponse { categories }))
}

/// Month-to-date income, expenses and balance
pub async fn transaction_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = ledger::summary(
        state.transactions.as_ref(),
        OwnerScope::from(&user),
        Utc::now(),
    )
    .await?;

    Ok(Json(SummaryResponse::from(summary)))
}

/// Delete one of the caller's transactions
pub async fn delete_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // A non-numeric id cannot name any row.
    let id: i64 = id.parse().map_err(|_| ledger::not_found())?;

    ledger::delete(state.transactions.as_ref(), OwnerScope::from(&user), id).await?;

    Ok(Json(MessageResponse::new("Transaction deleted successfully")))
}
