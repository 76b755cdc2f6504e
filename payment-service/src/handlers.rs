use chrono::Utc;
use shared::*;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::store::TransactionStore;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub payment_url: String,
    pub transaction_id: String,
}

/// Runs checkout and webhook operations against an injected store. Holds no state of
/// its own between calls.
pub struct TransactionHandler {
    store: Arc<dyn TransactionStore>,
    payment_base_url: Arc<str>,
}

impl TransactionHandler {
    pub fn new(store: Arc<dyn TransactionStore>, payment_base_url: Arc<str>) -> Self {
        Self {
            store,
            payment_base_url,
        }
    }

    pub async fn create_checkout(&self, command: CheckoutCommand) -> Result<CheckoutReceipt> {
        let transaction_id = generate_transaction_id();
        let payment_url = payment_url(&self.payment_base_url, &transaction_id);

        let new_transaction = NewTransaction::pending(command, transaction_id, Utc::now());
        let created = self.store.insert(new_transaction).await.map_err(|e| {
            error!("Failed to persist checkout: {}", e);
            AppError::from(e)
        })?;

        info!(
            "Created pending transaction {} (row {}) for {}",
            created.transaction_id, created.id, created.amount
        );

        Ok(CheckoutReceipt {
            payment_url,
            transaction_id: created.transaction_id,
        })
    }

    pub async fn apply_webhook(&self, command: WebhookCommand) -> Result<Transaction> {
        info!(
            "Webhook {} for transaction {}: status {}",
            command.event_id, command.transaction_id, command.update.status
        );

        let mut transaction = self
            .store
            .find_by_transaction_id(&command.transaction_id)
            .await?
            .ok_or_else(|| {
                warn!("Webhook for unknown transaction {}", command.transaction_id);
                AppError::NotFound
            })?;

        let previous = transaction.status.clone();
        transaction.apply(&command.update, Utc::now());

        let updated = self.store.update(&transaction).await.map_err(|e| {
            error!(
                "Failed to update transaction {}: {}",
                command.transaction_id, e
            );
            AppError::from(e)
        })?;

        info!(
            "Transaction {} moved from {} to {}",
            updated.transaction_id, previous, updated.status
        );

        Ok(updated)
    }
}
