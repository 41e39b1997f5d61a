//! Shared handler state.

use std::sync::Arc;

use crate::config::LedgerSettings;
use crate::intake::OrderIntakeService;
use crate::ledger::BonusLedger;
use crate::store::BonusStore;

#[derive(Clone)]
pub struct AppState {
    pub ledger: BonusLedger,
    pub intake: OrderIntakeService,
}

impl AppState {
    pub fn new(store: Arc<dyn BonusStore>, settings: LedgerSettings) -> Self {
        let ledger = BonusLedger::new(store, &settings);
        let intake = OrderIntakeService::new(ledger.clone(), &settings);
        Self { ledger, intake }
    }
}
