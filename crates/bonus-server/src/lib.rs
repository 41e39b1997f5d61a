//! Bonus Server - loyalty bonus ledger and order settlement API
//!
//! This crate provides the REST API that settles storefront orders against
//! each customer's bonus balance and keeps the audit ledger of every change.

pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use config::{ConfigError, LedgerSettings, ServerConfig};
pub use error::AppError;
pub use intake::{OrderIntakeService, OrderReceipt, PlaceOrder};
pub use ledger::{BonusLedger, LedgerVerification, RetryPolicy};
pub use routes::create_router;
pub use state::AppState;
pub use store::{BonusStore, MemoryBonusStore, PgBonusStore};
