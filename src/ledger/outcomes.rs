//! Results returned by ledger operations.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{BalanceAdjustment, BalanceSnapshot, ConsumptionRecord};

/// The result of a balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerOutcome {
    /// The balance after the operation.
    pub snapshot: BalanceSnapshot,
    /// The recorded adjustment; `None` when the operation had nothing to do.
    pub adjustment: Option<BalanceAdjustment>,
}

impl LedgerOutcome {
    pub(crate) fn applied(snapshot: BalanceSnapshot, adjustment: BalanceAdjustment) -> Self {
        Self {
            snapshot,
            adjustment: Some(adjustment),
        }
    }

    pub(crate) fn unchanged(snapshot: BalanceSnapshot) -> Self {
        Self {
            snapshot,
            adjustment: None,
        }
    }

    /// Returns true if nothing was recorded.
    pub fn is_noop(&self) -> bool {
        self.adjustment.is_none()
    }
}

/// The result of taking leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionOutcome {
    /// The standard balance after the consumption.
    pub snapshot: BalanceSnapshot,
    /// The consumption adjustment; its `days` is the standard-balance portion.
    pub adjustment: BalanceAdjustment,
    /// The carry-forward expiry applied first, when the leave fell on or
    /// after a pending expiry date.
    pub carry_forward_expiry: Option<BalanceAdjustment>,
    /// The linkage between the leave request and what it consumed.
    pub record: ConsumptionRecord,
}

impl ConsumptionOutcome {
    /// Days taken from the standard balance.
    pub fn standard_days(&self) -> Decimal {
        self.record.standard_days
    }

    /// Days paid with comp-off credits.
    pub fn comp_off_days(&self) -> Decimal {
        self.record.comp_off_days
    }
}

/// The result of reversing a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReversalOutcome {
    /// The consumption was reversed by this call.
    Reversed {
        /// The balance after the reversal.
        snapshot: BalanceSnapshot,
        /// The reversal adjustment.
        adjustment: BalanceAdjustment,
        /// Credits returned to the available pool.
        restored_credit_ids: Vec<Uuid>,
    },
    /// An earlier call already reversed the consumption; nothing changed.
    AlreadyReversed {
        /// The current balance.
        snapshot: BalanceSnapshot,
    },
}

impl ReversalOutcome {
    /// The balance after the call.
    pub fn snapshot(&self) -> &BalanceSnapshot {
        match self {
            ReversalOutcome::Reversed { snapshot, .. }
            | ReversalOutcome::AlreadyReversed { snapshot } => snapshot,
        }
    }

    /// Returns true if this call performed the reversal.
    pub fn was_reversed(&self) -> bool {
        matches!(self, ReversalOutcome::Reversed { .. })
    }
}
