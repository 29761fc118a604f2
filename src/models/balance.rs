//! Balance rows and their keys.
//!
//! This module defines [`EmployeeLeaveBalance`], the mutable per-year
//! balance row, the [`BalanceKey`] that identifies it, and the read-only
//! [`BalanceSnapshot`] handed back to callers.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifies one balance row: an employee, a leave type and a year.
///
/// # Example
///
/// ```
/// use leave_ledger::models::BalanceKey;
///
/// let key = BalanceKey::new("emp_001", "earned", 2025);
/// assert_eq!(key.to_string(), "emp_001/earned/2025");
/// assert_eq!(key.with_year(2026).year, 2026);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// The employee the balance belongs to.
    pub employee_id: String,
    /// The leave type id.
    pub leave_type_id: String,
    /// The calendar year.
    pub year: i32,
}

impl BalanceKey {
    /// Creates a new key.
    pub fn new(employee_id: impl Into<String>, leave_type_id: impl Into<String>, year: i32) -> Self {
        Self {
            employee_id: employee_id.into(),
            leave_type_id: leave_type_id.into(),
            year,
        }
    }

    /// Returns the same employee and leave type in another year.
    pub fn with_year(&self, year: i32) -> Self {
        Self {
            employee_id: self.employee_id.clone(),
            leave_type_id: self.leave_type_id.clone(),
            year,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.employee_id, self.leave_type_id, self.year)
    }
}

/// An employee's balance for one leave type in one year.
///
/// Available leave is derived from the four base quantities and is never
/// stored on the row:
///
/// ```text
/// available = entitled + carried_forward + additional - used
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeLeaveBalance {
    /// The employee the balance belongs to.
    pub employee_id: String,
    /// The leave type id.
    pub leave_type_id: String,
    /// The calendar year.
    pub year: i32,
    /// Base entitlement, grown by accrual.
    pub entitled_leaves: Decimal,
    /// Days brought in from the previous year.
    pub carried_forward_leaves: Decimal,
    /// Date on which the carried-forward days expire.
    pub carry_forward_expiry_date: Option<NaiveDate>,
    /// Set once the carry-forward expiry has been applied.
    #[serde(default)]
    pub carry_forward_expired: bool,
    /// Manual grants less manual deductions.
    pub additional_leaves: Decimal,
    /// Days consumed or encashed.
    pub used_leaves: Decimal,
    /// Optimistic concurrency token; bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl EmployeeLeaveBalance {
    /// Creates an empty, not-yet-persisted balance row for the key.
    pub fn new(key: &BalanceKey) -> Self {
        Self {
            employee_id: key.employee_id.clone(),
            leave_type_id: key.leave_type_id.clone(),
            year: key.year,
            entitled_leaves: Decimal::ZERO,
            carried_forward_leaves: Decimal::ZERO,
            carry_forward_expiry_date: None,
            carry_forward_expired: false,
            additional_leaves: Decimal::ZERO,
            used_leaves: Decimal::ZERO,
            version: 0,
        }
    }

    /// Returns the key of this row.
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id.clone(), self.leave_type_id.clone(), self.year)
    }

    /// Returns the derived available balance.
    ///
    /// # Example
    ///
    /// ```
    /// use leave_ledger::models::{BalanceKey, EmployeeLeaveBalance};
    /// use rust_decimal::Decimal;
    ///
    /// let mut balance = EmployeeLeaveBalance::new(&BalanceKey::new("emp_001", "earned", 2025));
    /// balance.entitled_leaves = Decimal::from(10);
    /// balance.carried_forward_leaves = Decimal::from(2);
    /// balance.used_leaves = Decimal::from(3);
    /// assert_eq!(balance.available_leaves(), Decimal::from(9));
    /// ```
    pub fn available_leaves(&self) -> Decimal {
        self.entitled_leaves + self.carried_forward_leaves + self.additional_leaves
            - self.used_leaves
    }

    /// Returns a read-only copy of the balance for callers.
    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            key: self.key(),
            entitled_leaves: self.entitled_leaves,
            carried_forward_leaves: self.carried_forward_leaves,
            carry_forward_expiry_date: self.carry_forward_expiry_date,
            carry_forward_expired: self.carry_forward_expired,
            additional_leaves: self.additional_leaves,
            used_leaves: self.used_leaves,
            available_leaves: self.available_leaves(),
        }
    }
}

/// A point-in-time view of a balance, including the derived available days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// The balance key.
    pub key: BalanceKey,
    /// Base entitlement.
    pub entitled_leaves: Decimal,
    /// Days brought in from the previous year.
    pub carried_forward_leaves: Decimal,
    /// Date on which the carried-forward days expire.
    pub carry_forward_expiry_date: Option<NaiveDate>,
    /// Whether the carry-forward expiry has been applied.
    pub carry_forward_expired: bool,
    /// Manual grants less manual deductions.
    pub additional_leaves: Decimal,
    /// Days consumed or encashed.
    pub used_leaves: Decimal,
    /// `entitled + carried_forward + additional - used`.
    pub available_leaves: Decimal,
}

impl BalanceSnapshot {
    /// A snapshot of a balance that has not been created yet.
    pub fn empty(key: &BalanceKey) -> Self {
        EmployeeLeaveBalance::new(key).snapshot()
    }
}
