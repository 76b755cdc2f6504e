use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Length of the external transaction identifier handed out at checkout.
pub const TRANSACTION_ID_LEN: usize = 16;

pub const DEFAULT_PAYMENT_BASE_URL: &str = "https://fake.coinbase.com/pay";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing amount")]
    MissingAmount,
    #[error("Amount must be greater than 0")]
    NonPositiveAmount,
    #[error("Missing email")]
    MissingEmail,
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Missing event_id")]
    MissingEventId,
    #[error("Missing transaction_id")]
    MissingTransactionId,
    #[error("Missing status")]
    MissingStatus,
}

/// Lifecycle status. Providers may report values outside the known set; those are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Pending,
    Created,
    Completed,
    Failed,
    Expired,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Created => "created",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TransactionStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => TransactionStatus::Pending,
            "created" => TransactionStatus::Created,
            "completed" => TransactionStatus::Completed,
            "failed" => TransactionStatus::Failed,
            "expired" => TransactionStatus::Expired,
            other => TransactionStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        TransactionStatus::from(s.as_str())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// A field of a partial update: either supplied by the caller or left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Absent,
    Present(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Present(v),
            None => Patch::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub email: String,
    pub amount: f64,
    pub status: TransactionStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub email: String,
    pub amount: f64,
    pub status: TransactionStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookUpdate {
    pub status: TransactionStatus,
    pub email: Patch<String>,
    pub amount: Patch<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCommand {
    pub amount: f64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookCommand {
    pub event_id: String,
    pub transaction_id: String,
    pub update: WebhookUpdate,
}

impl CheckoutCommand {
    pub fn new(amount: Option<f64>, email: Option<String>) -> Result<Self, ValidationError> {
        let amount = amount.ok_or(ValidationError::MissingAmount)?;
        if !is_positive_amount(amount) {
            return Err(ValidationError::NonPositiveAmount);
        }

        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(ValidationError::MissingEmail)?;
        validate_email(&email)?;

        Ok(Self { amount, email })
    }
}

impl WebhookCommand {
    /// Validates a raw webhook delivery. Empty strings count as missing for the
    /// identifier fields; an empty e-mail leaves the stored one untouched.
    pub fn new(
        event_id: Option<String>,
        transaction_id: Option<String>,
        status: Option<String>,
        email: Option<String>,
        amount: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let transaction_id =
            non_empty(transaction_id).ok_or(ValidationError::MissingTransactionId)?;
        let status = non_empty(status).ok_or(ValidationError::MissingStatus)?;
        let event_id = non_empty(event_id).ok_or(ValidationError::MissingEventId)?;

        let status = TransactionStatus::from(status);

        let email = match non_empty(email) {
            Some(e) => {
                validate_email(&e)?;
                Patch::Present(e)
            }
            None => Patch::Absent,
        };

        Ok(Self {
            event_id,
            transaction_id,
            update: WebhookUpdate {
                status,
                email,
                amount: Patch::from(amount),
            },
        })
    }
}

impl NewTransaction {
    pub fn pending(command: CheckoutCommand, transaction_id: String, now: DateTime<Utc>) -> Self {
        Self {
            email: command.email,
            amount: command.amount,
            status: TransactionStatus::Pending,
            transaction_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_transaction(self, id: i64) -> Transaction {
        Transaction {
            id,
            email: self.email,
            amount: self.amount,
            status: self.status,
            transaction_id: self.transaction_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Transaction {
    /// Applies a webhook update. Status is always overwritten, e-mail only when present.
    /// A present amount replaces the stored one only when positive; zero and negatives
    /// leave it as is. `updated_at` moves forward by at least one microsecond so it stays
    /// strictly increasing at the store's timestamp precision.
    pub fn apply(&mut self, update: &WebhookUpdate, now: DateTime<Utc>) {
        self.status = update.status.clone();

        if let Patch::Present(email) = &update.email {
            self.email = email.clone();
        }
        if let Patch::Present(amount) = update.amount {
            if is_positive_amount(amount) {
                self.amount = amount;
            }
        }

        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = if now > floor { now } else { floor };
    }
}

/// 128 random bits, URL-safe base64 without padding, cut to [`TRANSACTION_ID_LEN`].
pub fn generate_transaction_id() -> String {
    let encoded = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
    encoded[..TRANSACTION_ID_LEN].to_string()
}

pub fn payment_url(base_url: &str, transaction_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), transaction_id)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail(email.to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
    {
        return Err(invalid());
    }

    Ok(())
}

fn is_positive_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pending(now: DateTime<Utc>) -> Transaction {
        let command = CheckoutCommand::new(Some(100.0), Some("a@b.com".into())).unwrap();
        NewTransaction::pending(command, generate_transaction_id(), now).into_transaction(1)
    }

    #[test]
    fn transaction_id_is_sixteen_url_safe_chars() {
        for _ in 0..200 {
            let id = generate_transaction_id();
            assert_eq!(id.len(), TRANSACTION_ID_LEN);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn transaction_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_transaction_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn payment_url_embeds_identifier() {
        assert_eq!(
            payment_url("https://fake.coinbase.com/pay/", "abc"),
            "https://fake.coinbase.com/pay/abc"
        );
        assert_eq!(
            payment_url(DEFAULT_PAYMENT_BASE_URL, "xyz"),
            "https://fake.coinbase.com/pay/xyz"
        );
    }

    #[test]
    fn checkout_rejects_non_positive_amounts() {
        for amount in [0.0, -0.01, -100.0, f64::NAN] {
            let err = CheckoutCommand::new(Some(amount), Some("a@b.com".into())).unwrap_err();
            assert_eq!(err, ValidationError::NonPositiveAmount);
        }
        assert_eq!(
            CheckoutCommand::new(None, Some("a@b.com".into())).unwrap_err(),
            ValidationError::MissingAmount
        );
    }

    #[test]
    fn checkout_requires_valid_email() {
        assert_eq!(
            CheckoutCommand::new(Some(1.0), None).unwrap_err(),
            ValidationError::MissingEmail
        );
        assert!(matches!(
            CheckoutCommand::new(Some(1.0), Some("not-an-email".into())),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn email_format() {
        for bad in ["user@", "@example.com", "user@nodot", "a@b@c.com", "user@.com", "us er@x.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
        for good in ["a@b.com", "user+tag@example.com", "u@sub.example.co"] {
            assert!(validate_email(good).is_ok(), "{good} should be accepted");
        }
    }

    #[test]
    fn webhook_requires_transaction_id_and_status() {
        let err = WebhookCommand::new(Some("evt".into()), None, Some("completed".into()), None, None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTransactionId);

        let err = WebhookCommand::new(Some("evt".into()), Some("T".into()), Some("".into()), None, None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingStatus);
    }

    #[test]
    fn webhook_keeps_unrecognised_status_verbatim() {
        let command = WebhookCommand::new(
            Some("evt".into()),
            Some("T".into()),
            Some("complete".into()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            command.update.status,
            TransactionStatus::Other("complete".into())
        );
        assert_eq!(command.update.status.as_str(), "complete");
    }

    #[test]
    fn webhook_accepts_zero_amount_as_present() {
        let command = WebhookCommand::new(
            Some("evt".into()),
            Some("T".into()),
            Some("completed".into()),
            None,
            Some(0.0),
        )
        .unwrap();
        assert_eq!(command.update.amount, Patch::Present(0.0));
    }

    #[test]
    fn apply_ignores_non_positive_amount_but_updates_status() {
        let now = Utc::now();
        for amount in [0.0, -5.0] {
            let mut tx = pending(now);
            let update = WebhookUpdate {
                status: TransactionStatus::Completed,
                email: Patch::Absent,
                amount: Patch::Present(amount),
            };

            tx.apply(&update, now);

            assert_eq!(tx.amount, 100.0);
            assert_eq!(tx.status, TransactionStatus::Completed);
        }
    }

    #[test]
    fn webhook_empty_email_is_absent() {
        let command = WebhookCommand::new(
            Some("evt".into()),
            Some("T".into()),
            Some("failed".into()),
            Some("".into()),
            None,
        )
        .unwrap();
        assert_eq!(command.update.email, Patch::Absent);
        assert_eq!(command.update.amount, Patch::Absent);
        assert_eq!(command.update.status, TransactionStatus::Failed);
    }

    #[test]
    fn apply_overwrites_status_and_keeps_absent_fields() {
        let now = Utc::now();
        let mut tx = pending(now);
        let update = WebhookUpdate {
            status: TransactionStatus::Completed,
            email: Patch::Absent,
            amount: Patch::Absent,
        };

        tx.apply(&update, now + Duration::seconds(1));

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.email, "a@b.com");
        assert_eq!(tx.amount, 100.0);
        assert_eq!(tx.created_at, now);
    }

    #[test]
    fn apply_overwrites_present_fields() {
        let now = Utc::now();
        let mut tx = pending(now);
        let update = WebhookUpdate {
            status: TransactionStatus::Expired,
            email: Patch::Present("new@example.com".into()),
            amount: Patch::Present(42.5),
        };

        tx.apply(&update, now);

        assert_eq!(tx.email, "new@example.com");
        assert_eq!(tx.amount, 42.5);
        assert_eq!(tx.status, TransactionStatus::Expired);
    }

    #[test]
    fn updated_at_strictly_increases_even_with_stale_clock() {
        let now = Utc::now();
        let mut tx = pending(now);
        let update = WebhookUpdate {
            status: TransactionStatus::Completed,
            email: Patch::Absent,
            amount: Patch::Absent,
        };

        tx.apply(&update, now - Duration::seconds(5));
        assert!(tx.updated_at > now);

        let previous = tx.updated_at;
        tx.apply(&update, previous);
        assert!(tx.updated_at > previous);
    }

    #[test]
    fn status_round_trips_through_json() {
        assert_eq!(
            serde_json::to_value(TransactionStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
        assert_eq!(
            serde_json::to_value(TransactionStatus::Other("complete".into())).unwrap(),
            serde_json::json!("complete")
        );

        let parsed: TransactionStatus = serde_json::from_value(serde_json::json!("expired")).unwrap();
        assert_eq!(parsed, TransactionStatus::Expired);
        let parsed: TransactionStatus = serde_json::from_value(serde_json::json!("refunded")).unwrap();
        assert_eq!(parsed, TransactionStatus::Other("refunded".into()));
    }
}
