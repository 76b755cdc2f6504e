use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::{bb8::Pool, AsyncDieselConnectionManager};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use shared::{NewTransaction, Transaction};
use tracing::info;

use crate::error::StoreError;
use crate::models::*;
use crate::schema::*;
use crate::store::TransactionStore;

pub type DbPool = Pool<AsyncPgConnection>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_migrations(database_url: &str) -> Result<()> {
    info!("Running database migrations...");
    let mut conn = PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");
    Ok(())
}

pub async fn connect(database_url: &str) -> Result<DbPool> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder().build(config).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PgTransactionStore {
    pool: DbPool,
}

impl PgTransactionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let new_row = NewDbTransaction::try_from(transaction)?;
        let mut conn = self.pool.get().await?;

        let row = conn
            .transaction::<_, StoreError, _>(|conn| {
                Box::pin(async move {
                    let row = diesel::insert_into(transactions::table)
                        .values(&new_row)
                        .get_result::<DbTransaction>(conn)
                        .await?;
                    Ok(row)
                })
            })
            .await?;

        Transaction::try_from(row)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row = transactions::table
            .filter(transactions::transaction_id.eq(transaction_id))
            .order(transactions::id.asc())
            .first::<DbTransaction>(&mut conn)
            .await
            .optional()?;

        row.map(Transaction::try_from).transpose()
    }

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        let changes = TransactionChanges::try_from(transaction)?;
        let id = transaction.id;
        let mut conn = self.pool.get().await?;

        let row = conn
            .transaction::<_, StoreError, _>(|conn| {
                Box::pin(async move {
                    let row = diesel::update(transactions::table.find(id))
                        .set(&changes)
                        .get_result::<DbTransaction>(conn)
                        .await?;
                    Ok(row)
                })
            })
            .await?;

        Transaction::try_from(row)
    }
}
