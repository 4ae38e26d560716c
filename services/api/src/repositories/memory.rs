//! In-memory repositories
//!
//! A single [`MemoryRepository`] implements every repository trait over
//! maps guarded by one async mutex, so each operation is atomic with respect
//! to the others. Used by tests and by the `memory` storage backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::error::{DatabaseError, DatabaseResult};
use rust_decimal::Decimal;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{TokenRepository, TransactionRepository, UserRepository};
use crate::{
    models::{
        transaction::{NewTransaction, Totals, Transaction, TransactionFilter, TransactionType},
        user::{NewUser, User},
    },
    ownership::OwnerScope,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// token -> (owner, issue sequence)
    tokens: HashMap<String, (Uuid, u64)>,
    token_sequence: u64,
    transactions: BTreeMap<i64, Transaction>,
    last_transaction_id: i64,
}

impl MemoryState {
    fn insert_token(&mut self, user_id: Uuid, token: &str) -> DatabaseResult<()> {
        if self.tokens.contains_key(token) {
            return Err(DatabaseError::Duplicate("key".to_string()));
        }
        self.token_sequence += 1;
        self.tokens
            .insert(token.to_string(), (user_id, self.token_sequence));
        Ok(())
    }
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn create(&self, new_user: NewUser) -> DatabaseResult<User> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::Duplicate("username".to_string()));
        }
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Duplicate("email".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            birth_date: new_user.birth_date,
            gender: new_user.gender,
            avatar_key: None,
            balance: Decimal::new(0, 2),
            is_active: true,
            last_login: None,
            date_joined: Utc::now(),
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DatabaseResult<()> {
        if let Some(user) = self.state.lock().await.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, avatar_key: Option<&str>) -> DatabaseResult<()> {
        if let Some(user) = self.state.lock().await.users.get_mut(&id) {
            user.avatar_key = avatar_key.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for MemoryRepository {
    async fn find_user_id(&self, token: &str) -> DatabaseResult<Option<Uuid>> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(token).map(|(user_id, _)| *user_id))
    }

    async fn find_or_insert(&self, user_id: Uuid, candidate: &str) -> DatabaseResult<String> {
        let mut state = self.state.lock().await;
        let latest = state
            .tokens
            .iter()
            .filter(|(_, (owner, _))| *owner == user_id)
            .max_by_key(|(_, (_, seq))| *seq)
            .map(|(token, _)| token.clone());

        match latest {
            Some(token) => Ok(token),
            None => {
                state.insert_token(user_id, candidate)?;
                Ok(candidate.to_string())
            }
        }
    }

    async fn insert(&self, user_id: Uuid, token: &str) -> DatabaseResult<()> {
        self.state.lock().await.insert_token(user_id, token)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, (owner, _)| *owner != user_id);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl TransactionRepository for MemoryRepository {
    async fn insert(&self, owner: OwnerScope, new: NewTransaction) -> DatabaseResult<Transaction> {
        let mut state = self.state.lock().await;
        state.last_transaction_id += 1;

        let transaction = Transaction {
            id: state.last_transaction_id,
            user_id: owner.user_id(),
            amount: new.amount,
            transaction_type: new.transaction_type,
            category: new.category,
            date: new.date,
            description: new.description,
        };
        state
            .transactions
            .insert(transaction.id, transaction.clone());

        Ok(transaction)
    }

    async fn list(
        &self,
        owner: OwnerScope,
        filter: TransactionFilter,
    ) -> DatabaseResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| owner.permits(t.user_id) && filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(rows)
    }

    async fn categories(&self, owner: OwnerScope) -> DatabaseResult<Vec<String>> {
        let state = self.state.lock().await;
        let distinct: BTreeSet<&str> = state
            .transactions
            .values()
            .filter(|t| owner.permits(t.user_id))
            .map(|t| t.category.as_str())
            .collect();

        Ok(distinct.into_iter().map(str::to_string).collect())
    }

    async fn totals_since(&self, owner: OwnerScope, since: NaiveDate) -> DatabaseResult<Totals> {
        let state = self.state.lock().await;
        let mut totals = Totals {
            income: Decimal::new(0, 2),
            expenses: Decimal::new(0, 2),
        };

        for t in state
            .transactions
            .values()
            .filter(|t| owner.permits(t.user_id) && t.date >= since)
        {
            match t.transaction_type {
                TransactionType::Income => totals.income += t.amount,
                TransactionType::Expense => totals.expenses += t.amount,
            }
        }

        Ok(totals)
    }

    async fn delete(&self, owner: OwnerScope, id: i64) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        let owned = state
            .transactions
            .get(&id)
            .is_some_and(|t| owner.permits(t.user_id));

        if owned {
            state.transactions.remove(&id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            birth_date: None,
            gender: None,
        }
    }

    fn expense(amount: &str, category: &str, date: &str) -> NewTransaction {
        NewTransaction {
            amount: Decimal::from_str(amount).unwrap(),
            transaction_type: TransactionType::Expense,
            category: category.to_string(),
            date: NaiveDate::from_str(date).unwrap(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_rejected() {
        let repo = MemoryRepository::new();
        repo.create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = UserRepository::create(&repo, new_user("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_of("username"));

        let err = UserRepository::create(&repo, new_user("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_of("email"));
    }

    #[tokio::test]
    async fn new_users_start_with_a_zero_balance() {
        let repo = MemoryRepository::new();
        let user = repo
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(user.balance.to_string(), "0.00");
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn latest_token_is_returned_for_user() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();

        TokenRepository::insert(&repo, user_id, "first").await.unwrap();
        TokenRepository::insert(&repo, user_id, "second").await.unwrap();

        assert_eq!(repo.find_or_insert(user_id, "third").await.unwrap(), "second");
        assert_eq!(repo.find_user_id("third").await.unwrap(), None);
        assert_eq!(repo.find_user_id("first").await.unwrap(), Some(user_id));
        assert_eq!(repo.delete_for_user(user_id).await.unwrap(), 2);
        assert_eq!(repo.delete_for_user(user_id).await.unwrap(), 0);
        assert_eq!(repo.find_user_id("first").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rows_of_other_owners_are_invisible() {
        let repo = MemoryRepository::new();
        let alice = OwnerScope::new(Uuid::new_v4());
        let bob = OwnerScope::new(Uuid::new_v4());

        let owned = TransactionRepository::insert(&repo, alice, expense("5.00", "Food", "2024-03-01"))
            .await
            .unwrap();

        assert!(
            repo.list(bob, TransactionFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
        assert!(repo.categories(bob).await.unwrap().is_empty());
        assert!(!repo.delete(bob, owned.id).await.unwrap());
        assert_eq!(
            repo.list(alice, TransactionFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let repo = MemoryRepository::new();
        let owner = OwnerScope::new(Uuid::new_v4());

        for date in ["2024-01-15", "2024-03-01", "2024-02-10"] {
            TransactionRepository::insert(&repo, owner, expense("1.00", "Misc", date))
                .await
                .unwrap();
        }

        let dates: Vec<String> = repo
            .list(owner, TransactionFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.date.to_string())
            .collect();
        assert_eq!(dates, ["2024-03-01", "2024-02-10", "2024-01-15"]);
    }
}
