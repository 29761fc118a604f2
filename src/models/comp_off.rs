//! Compensatory-off credits and leave consumption records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BalanceKey;

/// Lifecycle state of a comp-off credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompOffStatus {
    /// Can be used for leave.
    Available,
    /// Used by a leave request.
    Consumed,
    /// Lapsed unused.
    Expired,
}

impl CompOffStatus {
    /// Returns the snake_case name used in storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CompOffStatus::Available => "available",
            CompOffStatus::Consumed => "consumed",
            CompOffStatus::Expired => "expired",
        }
    }
}

/// Compensatory time earned for working on a non-working day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompOffCredit {
    /// Unique identifier.
    pub id: Uuid,
    /// The employee who earned the credit.
    pub employee_id: String,
    /// The non-working day that was worked.
    pub earned_date: NaiveDate,
    /// Days of leave the credit is worth.
    pub comp_off_days: Decimal,
    /// Last day the credit can be used, if it lapses at all.
    pub expiry_date: Option<NaiveDate>,
    /// Current lifecycle state.
    pub status: CompOffStatus,
    /// The leave request that consumed the credit.
    pub consumed_by_leave_request_id: Option<String>,
    /// The leave date the credit was consumed for.
    pub consumed_on: Option<NaiveDate>,
}

impl CompOffCredit {
    /// Creates an available credit.
    pub fn new(
        employee_id: impl Into<String>,
        earned_date: NaiveDate,
        comp_off_days: Decimal,
        expiry_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.into(),
            earned_date,
            comp_off_days,
            expiry_date,
            status: CompOffStatus::Available,
            consumed_by_leave_request_id: None,
            consumed_on: None,
        }
    }

    /// Returns true if the credit can pay for leave taken on `date`: it is
    /// available, was earned on or before `date`, and has not lapsed.
    pub fn is_usable_on(&self, date: NaiveDate) -> bool {
        self.status == CompOffStatus::Available
            && self.earned_date <= date
            && self.expiry_date.is_none_or(|expiry| date <= expiry)
    }

    /// Returns true if the credit is still available but lapsed before `as_of`.
    pub fn has_lapsed(&self, as_of: NaiveDate) -> bool {
        self.status == CompOffStatus::Available
            && self.expiry_date.is_some_and(|expiry| expiry < as_of)
    }

    /// Marks the credit as consumed by a leave request.
    pub fn consume(&mut self, leave_request_id: &str, leave_date: NaiveDate) {
        self.status = CompOffStatus::Consumed;
        self.consumed_by_leave_request_id = Some(leave_request_id.to_string());
        self.consumed_on = Some(leave_date);
    }

    /// Returns a consumed credit to the available pool.
    pub fn restore(&mut self) {
        self.status = CompOffStatus::Available;
        self.consumed_by_leave_request_id = None;
        self.consumed_on = None;
    }

    /// Marks the credit as lapsed.
    pub fn expire(&mut self) {
        self.status = CompOffStatus::Expired;
    }
}

/// Links a leave request to what it consumed.
///
/// Comp-off credits have their own ledger, so the comp-off side of a
/// consumption is recorded here rather than as a balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// The leave request id; unique across the ledger.
    pub leave_request_id: String,
    /// The balance the standard portion was taken from.
    pub key: BalanceKey,
    /// The first day of the leave.
    pub leave_date: NaiveDate,
    /// Days taken from the standard balance.
    pub standard_days: Decimal,
    /// Credits consumed, oldest first.
    pub comp_off_credit_ids: Vec<Uuid>,
    /// Days covered by the credits.
    pub comp_off_days: Decimal,
    /// When the consumption was committed.
    pub consumed_at: DateTime<Utc>,
    /// Set once the consumption has been reversed.
    pub reversed: bool,
}
