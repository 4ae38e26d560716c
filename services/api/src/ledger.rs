//! Transaction operations
//!
//! Validation of incoming transactions and the scoped create/list/summary/
//! delete operations the HTTP handlers delegate to. Every function takes the
//! caller's [`OwnerScope`]; there is no way to reach another user's rows from
//! here.

use chrono::{DateTime, NaiveDate, Utc};
use common::error::DatabaseError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;
use tracing::{error, info};

use crate::{
    error::{ApiError, ApiResult},
    models::transaction::{
        CreateTransactionRequest, NewTransaction, SummaryResponse, Transaction, TransactionType,
    },
    ownership::OwnerScope,
    query::{TransactionQuery, month_start},
    repositories::TransactionRepository,
    validation::parse_iso_date,
};

/// Longest accepted category, in characters
pub const MAX_CATEGORY_LEN: usize = 100;

/// Exclusive upper bound on an amount's magnitude (8 integer digits)
const AMOUNT_LIMIT: i64 = 100_000_000;

/// Month-to-date totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl From<Summary> for SummaryResponse {
    fn from(summary: Summary) -> Self {
        Self {
            income: summary.income,
            expenses: summary.expenses,
            balance: summary.balance,
            period_start: summary.period_start.date_naive(),
            period_end: summary.period_end.date_naive(),
        }
    }
}

fn required(value: Option<Value>, field: &str) -> ApiResult<Value> {
    match value {
        None | Some(Value::Null) => Err(ApiError::invalid(format!(
            "Missing required field: {field}"
        ))),
        Some(value) => Ok(value),
    }
}

fn parse_category(value: Value) -> ApiResult<String> {
    let Value::String(category) = value else {
        return Err(ApiError::invalid("Category must be a string"));
    };
    if category.trim().is_empty() {
        return Err(ApiError::invalid("Category cannot be empty"));
    }
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(ApiError::invalid(format!(
            "Category must be at most {MAX_CATEGORY_LEN} characters"
        )));
    }
    Ok(category)
}

fn parse_type(value: &Value) -> ApiResult<TransactionType> {
    value
        .as_str()
        .and_then(TransactionType::parse)
        .ok_or_else(|| ApiError::invalid("Invalid transaction type"))
}

fn out_of_range() -> ApiError {
    ApiError::invalid("Amount is out of range")
}

/// Finite numbers whose exponent `Decimal` cannot hold: huge ones are out of
/// range, tiny ones round to zero
fn outside_decimal_range(raw: &str) -> ApiResult<Decimal> {
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::invalid("Amount must be a valid number"))?;

    if value.abs() >= AMOUNT_LIMIT as f64 {
        Err(out_of_range())
    } else if value.abs() < 0.005 {
        Ok(Decimal::ZERO)
    } else {
        Decimal::try_from(value).map_err(|_| ApiError::invalid("Amount must be a valid number"))
    }
}

/// Parse an amount given as a JSON number or numeric string, rounded half away
/// from zero to cents
pub fn parse_amount(value: &Value) -> ApiResult<Decimal> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ApiError::invalid("Amount must be a valid number")),
    };

    let parsed = match Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)) {
        Ok(amount) => amount,
        Err(_) => outside_decimal_range(&raw)?,
    };

    let mut amount = parsed.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);

    if amount.abs() >= Decimal::from(AMOUNT_LIMIT) {
        return Err(out_of_range());
    }
    Ok(amount)
}

/// Parse a strict `YYYY-MM-DD` calendar date
pub fn parse_date(value: &Value) -> ApiResult<NaiveDate> {
    value
        .as_str()
        .and_then(parse_iso_date)
        .ok_or_else(|| ApiError::invalid("Invalid date format, expected YYYY-MM-DD"))
}

fn parse_description(value: Option<Value>) -> ApiResult<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(description)) => Ok(description),
        Some(_) => Err(ApiError::invalid("Description must be a string")),
    }
}

/// Validate a creation request; the first failing check wins
pub fn validate_new_transaction(request: CreateTransactionRequest) -> ApiResult<NewTransaction> {
    let amount = required(request.amount, "amount")?;
    let transaction_type = required(request.transaction_type, "transaction_type")?;
    let category = required(request.category, "category")?;
    let date = required(request.date, "date")?;

    let category = parse_category(category)?;
    let transaction_type = parse_type(&transaction_type)?;
    let amount = parse_amount(&amount)?;
    let date = parse_date(&date)?;
    let description = parse_description(request.description)?;

    Ok(NewTransaction {
        amount,
        transaction_type,
        category,
        date,
        description,
    })
}

fn store_failure(operation: &'static str, owner: OwnerScope) -> impl Fn(DatabaseError) -> ApiError {
    move |e| {
        error!("Failed to {} for user {}: {}", operation, owner.user_id(), e);
        ApiError::InternalServerError
    }
}

/// Validate and persist a new transaction owned by `owner`
pub async fn create(
    repo: &dyn TransactionRepository,
    owner: OwnerScope,
    request: CreateTransactionRequest,
) -> ApiResult<Transaction> {
    let new = validate_new_transaction(request)?;

    let transaction = repo
        .insert(owner, new)
        .await
        .map_err(store_failure("create transaction", owner))?;

    info!(
        "Created transaction {} for user {}",
        transaction.id,
        owner.user_id()
    );
    Ok(transaction)
}

/// The owner's transactions matching `query`, newest first
pub async fn list(
    repo: &dyn TransactionRepository,
    owner: OwnerScope,
    query: &TransactionQuery,
    now: DateTime<Utc>,
) -> ApiResult<Vec<Transaction>> {
    repo.list(owner, query.filter_at(now))
        .await
        .map_err(store_failure("list transactions", owner))
}

pub async fn categories(
    repo: &dyn TransactionRepository,
    owner: OwnerScope,
) -> ApiResult<Vec<String>> {
    repo.categories(owner)
        .await
        .map_err(store_failure("list categories", owner))
}

/// Income, expenses and balance from the start of `now`'s month up to `now`
pub async fn summary(
    repo: &dyn TransactionRepository,
    owner: OwnerScope,
    now: DateTime<Utc>,
) -> ApiResult<Summary> {
    let period_start = month_start(now);
    let totals = repo
        .totals_since(owner, period_start.date_naive())
        .await
        .map_err(store_failure("summarize transactions", owner))?;

    let mut balance = totals.income - totals.expenses;
    balance.rescale(2);

    Ok(Summary {
        income: totals.income,
        expenses: totals.expenses,
        balance,
        period_start,
        period_end: now,
    })
}

/// Delete one of the owner's transactions
///
/// A missing id and an id owned by someone else fail identically.
pub async fn delete(
    repo: &dyn TransactionRepository,
    owner: OwnerScope,
    id: i64,
) -> ApiResult<()> {
    let deleted = repo
        .delete(owner, id)
        .await
        .map_err(store_failure("delete transaction", owner))?;

    if !deleted {
        return Err(not_found());
    }

    info!("Deleted transaction {} for user {}", id, owner.user_id());
    Ok(())
}

/// Failure reported for absent and foreign transactions alike
pub fn not_found() -> ApiError {
    ApiError::NotFound("Transaction not found or not owned by user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::transaction::TransactionListQuery, repositories::MemoryRepository};
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn request(body: Value) -> CreateTransactionRequest {
        serde_json::from_value(body).unwrap()
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::InvalidInput(msg) | ApiError::NotFound(msg) => msg,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn valid_body() -> Value {
        json!({
            "amount": "123.45",
            "transaction_type": "expense",
            "category": "Food",
            "date": "2024-03-01",
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn params(transaction_type: Option<&str>, period: Option<&str>) -> TransactionQuery {
        TransactionQuery::from_params(&TransactionListQuery {
            transaction_type: transaction_type.map(str::to_string),
            period: period.map(str::to_string),
        })
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        let err = validate_new_transaction(request(json!({}))).unwrap_err();
        assert_eq!(message(err), "Missing required field: amount");

        let err = validate_new_transaction(request(json!({
            "amount": "1", "transaction_type": "income", "category": null
        })))
        .unwrap_err();
        assert_eq!(message(err), "Missing required field: category");

        let err = validate_new_transaction(request(json!({
            "amount": "1", "transaction_type": "income", "category": "Pay"
        })))
        .unwrap_err();
        assert_eq!(message(err), "Missing required field: date");
    }

    #[test]
    fn category_checks_precede_type_amount_and_date() {
        let err = validate_new_transaction(request(json!({
            "amount": "abc", "transaction_type": "invalid", "category": "   ", "date": "bad"
        })))
        .unwrap_err();
        assert_eq!(message(err), "Category cannot be empty");

        let err = validate_new_transaction(request(json!({
            "amount": "abc", "transaction_type": "invalid", "category": "Food", "date": "bad"
        })))
        .unwrap_err();
        assert_eq!(message(err), "Invalid transaction type");

        let err = validate_new_transaction(request(json!({
            "amount": "abc", "transaction_type": "income", "category": "Food", "date": "bad"
        })))
        .unwrap_err();
        assert_eq!(message(err), "Amount must be a valid number");

        let err = validate_new_transaction(request(json!({
            "amount": "1", "transaction_type": "income", "category": "Food", "date": "01/03/2024"
        })))
        .unwrap_err();
        assert_eq!(message(err), "Invalid date format, expected YYYY-MM-DD");
    }

    #[test]
    fn category_length_is_bounded() {
        let mut body = valid_body();
        body["category"] = json!("x".repeat(101));
        let err = validate_new_transaction(request(body)).unwrap_err();
        assert_eq!(message(err), "Category must be at most 100 characters");

        let mut body = valid_body();
        body["category"] = json!("x".repeat(100));
        assert!(validate_new_transaction(request(body)).is_ok());
    }

    #[test]
    fn amounts_accept_numbers_and_strings() {
        assert_eq!(parse_amount(&json!("123.45")).unwrap().to_string(), "123.45");
        assert_eq!(parse_amount(&json!(" 10 ")).unwrap().to_string(), "10.00");
        assert_eq!(parse_amount(&json!(2.5)).unwrap().to_string(), "2.50");
        assert_eq!(parse_amount(&json!(-7)).unwrap().to_string(), "-7.00");
        assert_eq!(parse_amount(&json!("1e2")).unwrap().to_string(), "100.00");
        assert_eq!(parse_amount(&json!("1e-40")).unwrap().to_string(), "0.00");
        assert_eq!(parse_amount(&json!(1e-40)).unwrap().to_string(), "0.00");
    }

    #[test]
    fn amounts_round_half_away_from_zero() {
        assert_eq!(parse_amount(&json!("0.125")).unwrap().to_string(), "0.13");
        assert_eq!(parse_amount(&json!("-0.125")).unwrap().to_string(), "-0.13");
        assert_eq!(parse_amount(&json!("0.124")).unwrap().to_string(), "0.12");
    }

    #[test]
    fn unusable_amounts_are_rejected() {
        for raw in [json!("NaN"), json!("inf"), json!(""), json!(true), json!([1])] {
            let err = parse_amount(&raw).unwrap_err();
            assert_eq!(message(err), "Amount must be a valid number");
        }

        for raw in [json!("100000000"), json!("1e100"), json!("-1e100"), json!(1e300)] {
            let err = parse_amount(&raw).unwrap_err();
            assert_eq!(message(err), "Amount is out of range", "{raw}");
        }
        assert!(parse_amount(&json!("99999999.99")).is_ok());
    }

    #[test]
    fn dates_must_be_strict_iso() {
        assert_eq!(
            parse_date(&json!("2024-03-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date(&json!("2024-3-1")).is_err());
        assert!(parse_date(&json!(" 2024-03-1")).is_err());
        assert!(parse_date(&json!("+2024-3-01")).is_err());
        assert!(parse_date(&json!("2024-02-30")).is_err());
        assert!(parse_date(&json!("2024-03-01T00:00:00")).is_err());
        assert!(parse_date(&json!(20240301)).is_err());
    }

    #[test]
    fn description_defaults_to_empty() {
        let new = validate_new_transaction(request(valid_body())).unwrap();
        assert_eq!(new.description, "");
        assert_eq!(new.category, "Food");

        let mut body = valid_body();
        body["description"] = json!(42);
        let err = validate_new_transaction(request(body)).unwrap_err();
        assert_eq!(message(err), "Description must be a string");
    }

    #[tokio::test]
    async fn created_transaction_is_listed_exactly_once() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        let created = create(&repo, owner, request(valid_body())).await.unwrap();

        for period in ["month", "year", "all"] {
            let rows = list(&repo, owner, &params(Some("expense"), Some(period)), now())
                .await
                .unwrap();
            assert_eq!(rows.iter().filter(|t| t.id == created.id).count(), 1);
        }

        let incomes = list(&repo, owner, &params(Some("income"), None), now())
            .await
            .unwrap();
        assert!(incomes.is_empty());
    }

    #[tokio::test]
    async fn rolling_window_excludes_older_rows() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());
        create(&repo, owner, request(valid_body())).await.unwrap();

        let later = Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap();
        let rows = list(&repo, owner, &params(None, Some("month")), later)
            .await
            .unwrap();
        assert!(rows.is_empty());

        let rows = list(&repo, owner, &params(None, Some("3months")), later)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn invalid_type_is_not_persisted() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        let mut body = valid_body();
        body["transaction_type"] = json!("invalid");
        assert!(matches!(
            create(&repo, owner, request(body)).await,
            Err(ApiError::InvalidInput(_))
        ));

        let rows = list(&repo, owner, &params(None, None), now()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn categories_are_distinct() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        for _ in 0..100 {
            create(&repo, owner, request(valid_body())).await.unwrap();
        }
        let mut body = valid_body();
        body["category"] = json!("Rent");
        create(&repo, owner, request(body)).await.unwrap();

        let mut found = categories(&repo, owner).await.unwrap();
        found.sort();
        assert_eq!(found, ["Food", "Rent"]);
    }

    #[tokio::test]
    async fn empty_summary_is_zero() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        let summary = summary(&repo, owner, now()).await.unwrap();
        assert_eq!(summary.income.to_string(), "0.00");
        assert_eq!(summary.expenses.to_string(), "0.00");
        assert_eq!(summary.balance.to_string(), "0.00");
        assert_eq!(summary.period_end, now());
        assert_eq!(
            summary.period_start,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn summary_covers_month_to_date_only() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        let entries = [
            ("1000.00", "income", "2024-03-01"),
            ("250.50", "expense", "2024-03-10"),
            ("999.99", "expense", "2024-02-29"),
            ("300.00", "expense", "2024-03-14"),
        ];
        for (amount, kind, date) in entries {
            create(
                &repo,
                owner,
                request(json!({
                    "amount": amount, "transaction_type": kind, "category": "Misc", "date": date
                })),
            )
            .await
            .unwrap();
        }

        let summary = summary(&repo, owner, now()).await.unwrap();
        assert_eq!(summary.income.to_string(), "1000.00");
        assert_eq!(summary.expenses.to_string(), "550.50");
        assert_eq!(summary.balance.to_string(), "449.50");

        let response = SummaryResponse::from(summary);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["balance"], "449.50");
        assert_eq!(json["period_start"], "2024-03-01");
        assert_eq!(json["period_end"], "2024-03-15");
    }

    #[tokio::test]
    async fn foreign_and_missing_ids_fail_identically() {
        let repo = MemoryRepository::new();
        let alice = OwnerScope::new(Uuid::new_v4());
        let bob = OwnerScope::new(Uuid::new_v4());

        let created = create(&repo, alice, request(valid_body())).await.unwrap();

        let foreign = message(delete(&repo, bob, created.id).await.unwrap_err());
        let missing = message(delete(&repo, bob, created.id + 1000).await.unwrap_err());
        assert_eq!(foreign, missing);
        assert_eq!(foreign, "Transaction not found or not owned by user");

        delete(&repo, alice, created.id).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_deletes_have_one_winner() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());
        let created = create(&repo, owner, request(valid_body())).await.unwrap();

        let (first, second) = tokio::join!(
            delete(&repo, owner, created.id),
            delete(&repo, owner, created.id)
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(ApiError::NotFound(_))))
                .count(),
            1
        );
    }
}
