pub mod api;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod store;

pub use api::{create_router, AppState};
pub use error::{AppError, StoreError};
pub use store::{InMemoryTransactionStore, TransactionStore};
