use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use num_traits::ToPrimitive;
use shared::{NewTransaction, Transaction, TransactionStatus};
use std::str::FromStr;

use crate::error::StoreError;

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct DbTransaction {
    pub id: i64,
    pub email: String,
    pub amount: BigDecimal,
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct NewDbTransaction {
    pub email: String,
    pub amount: BigDecimal,
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns a webhook may touch. `id`, `transaction_id` and `created_at` never change.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::transactions)]
pub struct TransactionChanges {
    pub email: String,
    pub amount: BigDecimal,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Goes through the shortest decimal rendering of the float so `NUMERIC` holds `100.1`,
/// not its binary expansion.
fn to_numeric(amount: f64) -> Result<BigDecimal, StoreError> {
    if !amount.is_finite() {
        return Err(StoreError::Data(format!("amount {} is not representable", amount)));
    }
    BigDecimal::from_str(&amount.to_string())
        .map_err(|e| StoreError::Data(format!("amount {}: {}", amount, e)))
}

impl TryFrom<NewTransaction> for NewDbTransaction {
    type Error = StoreError;

    fn try_from(transaction: NewTransaction) -> Result<Self, Self::Error> {
        Ok(Self {
            email: transaction.email,
            amount: to_numeric(transaction.amount)?,
            status: transaction.status.to_string(),
            transaction_id: transaction.transaction_id,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        })
    }
}

impl TryFrom<&Transaction> for TransactionChanges {
    type Error = StoreError;

    fn try_from(transaction: &Transaction) -> Result<Self, Self::Error> {
        Ok(Self {
            email: transaction.email.clone(),
            amount: to_numeric(transaction.amount)?,
            status: transaction.status.to_string(),
            updated_at: transaction.updated_at,
        })
    }
}

impl TryFrom<DbTransaction> for Transaction {
    type Error = StoreError;

    fn try_from(row: DbTransaction) -> Result<Self, Self::Error> {
        let amount = row
            .amount
            .to_f64()
            .ok_or_else(|| StoreError::Data(format!("amount {} out of range", row.amount)))?;
        let status = TransactionStatus::from(row.status);

        Ok(Self {
            id: row.id,
            email: row.email,
            amount,
            status,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
