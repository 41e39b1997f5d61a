// Bonus Core - loyalty bonus rules for the storefront order settlement

pub mod balance;
pub mod digest;
pub mod error;
pub mod key;
pub mod ledger;
pub mod order;
pub mod rate;

pub use balance::{BalanceDelta, BalanceState};
pub use digest::{canonical_bytes, ledger_digest, sha256_hex};
pub use error::{BonusError, ErrorKind};
pub use key::CustomerKey;
pub use ledger::{ledger_lines, replay, LedgerLine, LedgerReason, ReplayError};
pub use order::{order_amount, LineItem, Quote, Settlement};
pub use rate::EarnRate;
