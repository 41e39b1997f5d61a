//! Database models for the bonus ledger.

pub mod customer_account;
pub mod ledger_entry;
pub mod order;

pub use customer_account::CustomerAccount;
pub use ledger_entry::{EntryReason, LedgerEntry, NewLedgerEntry};
pub use order::{NewOrder, Order, OrderLineItem, OrderStatus};
