//! Audit records for balance mutations.
//!
//! Every change to an employee's available leave is recorded as exactly one
//! [`BalanceAdjustment`]. Adjustments are append-only: once the store has
//! assigned a sequence number the record is never modified.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::BalanceKey;

/// The kind of mutation an adjustment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// The first balance set for a year by an administrator.
    InitialBalance,
    /// A manual grant.
    Add,
    /// A manual deduction.
    Deduct,
    /// A periodic entitlement increase.
    Accrual,
    /// Creation of a new year's row at rollover.
    CarryForward,
    /// Forfeiture of unused carried-forward days.
    Expiry,
    /// Days converted to a payout.
    Encashment,
    /// Days taken as leave.
    Consumption,
    /// Days returned after a leave was cancelled.
    Reversal,
}

impl AdjustmentType {
    /// Returns the snake_case name used in storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentType::InitialBalance => "initial_balance",
            AdjustmentType::Add => "add",
            AdjustmentType::Deduct => "deduct",
            AdjustmentType::Accrual => "accrual",
            AdjustmentType::CarryForward => "carry_forward",
            AdjustmentType::Expiry => "expiry",
            AdjustmentType::Encashment => "encashment",
            AdjustmentType::Consumption => "consumption",
            AdjustmentType::Reversal => "reversal",
        }
    }

    /// Returns true for adjustments made by hand rather than by the scheduler
    /// or the leave workflow. Manual adjustments must carry a reason.
    pub fn is_manual(self) -> bool {
        match self {
            AdjustmentType::InitialBalance | AdjustmentType::Add | AdjustmentType::Deduct => true,
            AdjustmentType::Accrual
            | AdjustmentType::CarryForward
            | AdjustmentType::Expiry
            | AdjustmentType::Encashment
            | AdjustmentType::Consumption
            | AdjustmentType::Reversal => false,
        }
    }
}

impl fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_balance" => Ok(AdjustmentType::InitialBalance),
            "add" => Ok(AdjustmentType::Add),
            "deduct" => Ok(AdjustmentType::Deduct),
            "accrual" => Ok(AdjustmentType::Accrual),
            "carry_forward" => Ok(AdjustmentType::CarryForward),
            "expiry" => Ok(AdjustmentType::Expiry),
            "encashment" => Ok(AdjustmentType::Encashment),
            "consumption" => Ok(AdjustmentType::Consumption),
            "reversal" => Ok(AdjustmentType::Reversal),
            other => Err(format!("unknown adjustment type: {other}")),
        }
    }
}

/// Who initiated a ledger operation.
///
/// Every ledger call takes an explicit actor; the ledger never looks up a
/// current user on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// The scheduler or another automated process.
    System,
    /// A person, identified by user id.
    User(String),
}

impl Actor {
    /// Creates a user actor.
    pub fn user(id: impl Into<String>) -> Self {
        Actor::User(id.into())
    }

    /// Returns the user id, or `None` for the system actor.
    pub fn id(&self) -> Option<&str> {
        match self {
            Actor::System => None,
            Actor::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// One immutable row of the balance audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    /// Unique identifier.
    pub id: Uuid,
    /// Store-assigned, strictly increasing across the whole ledger.
    pub sequence: u64,
    /// The employee the balance belongs to.
    pub employee_id: String,
    /// The leave type id.
    pub leave_type_id: String,
    /// The balance year.
    pub year: i32,
    /// What kind of mutation this was.
    pub adjustment_type: AdjustmentType,
    /// Absolute change of available leave.
    pub days: Decimal,
    /// Available leave before the mutation.
    pub balance_before: Decimal,
    /// Available leave after the mutation.
    pub balance_after: Decimal,
    /// Free-form reason; required for manual adjustments.
    pub reason: String,
    /// The business date the mutation applies to.
    pub effective_date: NaiveDate,
    /// The user who made the change, `None` for system events.
    pub created_by: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// The leave request behind a consumption or reversal.
    pub leave_request_id: Option<String>,
    /// Structured calculation detail.
    pub meta: Option<serde_json::Value>,
}

impl BalanceAdjustment {
    /// Creates a new adjustment with a zero sequence number.
    ///
    /// `days` is derived as the absolute difference between the two balances.
    pub fn new(
        key: &BalanceKey,
        adjustment_type: AdjustmentType,
        balance_before: Decimal,
        balance_after: Decimal,
        effective_date: NaiveDate,
        actor: &Actor,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            employee_id: key.employee_id.clone(),
            leave_type_id: key.leave_type_id.clone(),
            year: key.year,
            adjustment_type,
            days: (balance_after - balance_before).abs(),
            balance_before,
            balance_after,
            reason: reason.into(),
            effective_date,
            created_by: actor.id().map(str::to_string),
            created_at: Utc::now(),
            leave_request_id: None,
            meta: None,
        }
    }

    /// Links the adjustment to a leave request.
    pub fn with_leave_request(mut self, leave_request_id: impl Into<String>) -> Self {
        self.leave_request_id = Some(leave_request_id.into());
        self
    }

    /// Attaches structured calculation detail.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Assigns the sequence number used for ordering and replay.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the key of the balance this adjustment belongs to.
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id.clone(), self.leave_type_id.clone(), self.year)
    }
}

/// A gap in an adjustment chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainBreak {
    /// An adjustment does not start where the previous one ended.
    #[error("adjustment {sequence} starts at {balance_before} but previous ended at {previous_after}")]
    Discontinuity {
        /// Sequence of the offending adjustment.
        sequence: u64,
        /// Its recorded starting balance.
        balance_before: Decimal,
        /// The previous adjustment's ending balance.
        previous_after: Decimal,
    },
    /// Sequences are not strictly increasing.
    #[error("adjustment sequence {sequence} does not follow {previous}")]
    OutOfOrder {
        /// Sequence of the offending adjustment.
        sequence: u64,
        /// Sequence of the adjustment before it.
        previous: u64,
    },
    /// `days` does not match the recorded balances.
    #[error("adjustment {sequence} records {days} days for a change of {delta}")]
    DaysMismatch {
        /// Sequence of the offending adjustment.
        sequence: u64,
        /// The recorded days.
        days: Decimal,
        /// The actual absolute change.
        delta: Decimal,
    },
}

/// Verifies that one balance's adjustments form an unbroken chain.
///
/// Each adjustment's `balance_before` must equal the previous one's
/// `balance_after`, sequences must strictly increase, and `days` must equal
/// the absolute balance change.
///
/// # Example
///
/// ```
/// use leave_ledger::models::{verify_chain, Actor, AdjustmentType, BalanceAdjustment, BalanceKey};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let key = BalanceKey::new("emp_001", "earned", 2025);
/// let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let first = BalanceAdjustment::new(
///     &key, AdjustmentType::InitialBalance, Decimal::ZERO, Decimal::from(10), date, &Actor::System, "setup",
/// ).with_sequence(1);
/// let second = BalanceAdjustment::new(
///     &key, AdjustmentType::Deduct, Decimal::from(10), Decimal::from(7), date, &Actor::System, "correction",
/// ).with_sequence(2);
///
/// assert!(verify_chain(&[first, second]).is_ok());
/// ```
pub fn verify_chain(adjustments: &[BalanceAdjustment]) -> Result<(), ChainBreak> {
    for adjustment in adjustments {
        let delta = (adjustment.balance_after - adjustment.balance_before).abs();
        if adjustment.days != delta {
            return Err(ChainBreak::DaysMismatch {
                sequence: adjustment.sequence,
                days: adjustment.days,
                delta,
            });
        }
    }

    for pair in adjustments.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.sequence <= previous.sequence {
            return Err(ChainBreak::OutOfOrder {
                sequence: current.sequence,
                previous: previous.sequence,
            });
        }
        if current.balance_before != previous.balance_after {
            return Err(ChainBreak::Discontinuity {
                sequence: current.sequence,
                balance_before: current.balance_before,
                previous_after: previous.balance_after,
            });
        }
    }

    Ok(())
}
