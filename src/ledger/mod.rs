//! The balance ledger and its storage.
//!
//! [`LeaveBalanceLedger`] is the only writer of balances, adjustments and
//! comp-off credits. It serializes work per key with [`KeyLocks`] and
//! persists through a [`LedgerStore`]; [`InMemoryStore`] is the bundled
//! implementation.

mod comp_off;
mod encashment;
mod locks;
mod outcomes;
mod reports;
mod requests;
mod service;
mod store;
#[cfg(test)]
mod testing;
mod year_end;

pub use locks::{KeyGuard, KeyLocks, LockKey};
pub use outcomes::{ConsumptionOutcome, LedgerOutcome, ReversalOutcome};
pub use reports::{
    ExpiringCarryForward, ExpiryUrgency, LeaveTypeSummary, expiring_carry_forwards,
    summarize_balances,
};
pub use requests::{
    AdjustmentKind, InitialBalanceEntry, LeaveConsumption, MAX_DAYS, MAX_REASON_LEN,
    ManualAdjustment,
};
pub use service::LeaveBalanceLedger;
pub use store::{BalanceWrite, Changeset, InMemoryStore, LedgerStore};
