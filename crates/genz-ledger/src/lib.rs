//! Balance-affecting operations of the rewards platform.
//!
//! Every public operation opens one unit of work on the configured
//! [`LedgerStore`], performs all of its reads and writes through it and
//! commits once at the end. An error anywhere drops the transaction, so
//! callers never observe a half-applied approval or withdrawal.

mod commission;
mod earnings;
mod enrollment;
mod quiz;
mod withdrawals;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use genz_core::{CommissionSchedule, FiveLevelSchedule, LedgerStore};
use rust_decimal::Decimal;

pub use commission::{CommissionPropagator, UplineStep};
pub use earnings::{Approval, NewSubmission};
pub use enrollment::NewMember;
pub use withdrawals::WithdrawalRequest;

#[derive(Clone)]
pub struct RewardsLedger {
    store: Arc<dyn LedgerStore>,
    schedule: Arc<dyn CommissionSchedule>,
    default_rate: Decimal,
}

impl RewardsLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            schedule: Arc::new(FiveLevelSchedule),
            default_rate: default_rate_per_unit(),
        }
    }

    pub fn with_schedule(mut self, schedule: Arc<dyn CommissionSchedule>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Rate applied when a category has no active rate row.
    pub fn with_default_rate(mut self, rate: Decimal) -> Self {
        self.default_rate = rate;
        self
    }

    pub fn default_rate(&self) -> Decimal {
        self.default_rate
    }

    pub fn schedule(&self) -> &dyn CommissionSchedule {
        self.schedule.as_ref()
    }
}

pub fn default_rate_per_unit() -> Decimal {
    Decimal::new(200, 2) // 2.00 per unit
}
