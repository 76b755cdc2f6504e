use async_trait::async_trait;
use shared::{NewTransaction, Transaction};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Persistence boundary for transactions. Each call is its own transactional scope:
/// it either commits fully or leaves the store untouched.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: NewTransaction) -> Result<Transaction, StoreError>;

    /// Returns the oldest transaction carrying `transaction_id`, if any.
    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    rows: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<Transaction> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let mut rows = self.rows.write().await;
        let id = rows.last().map(|t| t.id + 1).unwrap_or(1);
        let created = transaction.into_transaction(id);
        rows.push(created.clone());
        Ok(created)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned())
    }

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|t| t.id == transaction.id)
            .ok_or(StoreError::RowNotFound(transaction.id))?;
        *row = transaction.clone();
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::{generate_transaction_id, CheckoutCommand, TransactionStatus};

    fn new_transaction(email: &str, amount: f64) -> NewTransaction {
        let command = CheckoutCommand::new(Some(amount), Some(email.to_string())).unwrap();
        NewTransaction::pending(command, generate_transaction_id(), Utc::now())
    }

    #[tokio::test]
    async fn insert_then_find_round_trips() {
        let store = InMemoryTransactionStore::new();
        let inserted = store.insert(new_transaction("a@b.com", 12.5)).await.unwrap();

        let found = store
            .find_by_transaction_id(&inserted.transaction_id)
            .await
            .unwrap()
            .expect("transaction should be found");

        assert_eq!(found.email, "a@b.com");
        assert_eq!(found.amount, 12.5);
        assert_eq!(found.status, TransactionStatus::Pending);
        assert_eq!(found, inserted);
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = InMemoryTransactionStore::new();
        let first = store.insert(new_transaction("a@b.com", 1.0)).await.unwrap();
        let second = store.insert(new_transaction("c@d.com", 2.0)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn update_of_unknown_row_fails() {
        let store = InMemoryTransactionStore::new();
        let ghost = new_transaction("a@b.com", 1.0).into_transaction(99);
        let err = store.update(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound(99)));
    }

    #[tokio::test]
    async fn find_unknown_returns_none() {
        let store = InMemoryTransactionStore::new();
        assert!(store
            .find_by_transaction_id("doesnotexist")
            .await
            .unwrap()
            .is_none());
    }
}
