//! Year-end carry-forward evaluation.
//!
//! At rollover, unused days move into the next year up to the leave type's
//! `max_carry_forward`. Carried days may expire a number of months into the
//! new year; this module decides how much carries and how much of it is
//! forfeited when the expiry date passes.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use crate::config::LeaveTypePolicy;
use crate::error::{LedgerError, LedgerResult};
use crate::models::EmployeeLeaveBalance;

/// The outcome of a carry-forward evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryForward {
    /// Days moved into the new year.
    pub amount: Decimal,
    /// When the carried days expire, if they do.
    pub expiry_date: Option<NaiveDate>,
    /// Whether `max_carry_forward` reduced the amount.
    pub capped: bool,
}

/// Returns 1 January of `year`.
pub fn year_start(year: i32) -> LedgerResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| LedgerError::validation("year", format!("year {year} is out of range")))
}

/// Computes how many of `available` days carry into `to_year`.
///
/// Nothing carries when the policy disallows carry-forward or nothing is
/// available. Otherwise the amount is `min(available, max_carry_forward)`,
/// uncapped when no maximum is set. The expiry date is 1 January of
/// `to_year` plus `carry_forward_expiry_months`.
///
/// # Example
///
/// ```
/// use leave_ledger::calculation::compute_carry_forward;
/// use leave_ledger::config::ConfigLoader;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// let earned = loader.get_policy("earned").unwrap();
///
/// let result = compute_carry_forward(Decimal::from(20), earned, 2025).unwrap();
/// assert_eq!(result.amount, Decimal::from(15));
/// assert!(result.capped);
/// assert_eq!(result.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 1));
/// ```
pub fn compute_carry_forward(
    available: Decimal,
    policy: &LeaveTypePolicy,
    to_year: i32,
) -> LedgerResult<CarryForward> {
    if !policy.allow_carry_forward || available <= Decimal::ZERO {
        return Ok(CarryForward {
            amount: Decimal::ZERO,
            expiry_date: None,
            capped: false,
        });
    }

    let (amount, capped) = match policy.max_carry_forward {
        Some(max) if available > max => (max, true),
        _ => (available, false),
    };

    let expiry_date = match policy.carry_forward_expiry_months {
        Some(months) if amount > Decimal::ZERO => Some(
            year_start(to_year)?
                .checked_add_months(Months::new(months))
                .ok_or_else(|| {
                    LedgerError::validation("to_year", format!("year {to_year} is out of range"))
                })?,
        ),
        _ => None,
    };

    Ok(CarryForward {
        amount,
        expiry_date,
        capped,
    })
}

/// Days of carry-forward forfeited when it expires.
///
/// Carried days are consumed before the current year's entitlement, so only
/// `carried - used` is still unconsumed. The forfeit is further bounded by
/// the available balance so expiry never drives it negative.
///
/// # Example
///
/// ```
/// use leave_ledger::calculation::forfeitable_carry_forward;
/// use leave_ledger::models::{BalanceKey, EmployeeLeaveBalance};
/// use rust_decimal::Decimal;
///
/// let mut balance = EmployeeLeaveBalance::new(&BalanceKey::new("emp_001", "earned", 2025));
/// balance.entitled_leaves = Decimal::from(12);
/// balance.carried_forward_leaves = Decimal::from(5);
/// balance.used_leaves = Decimal::from(2);
///
/// assert_eq!(forfeitable_carry_forward(&balance), Decimal::from(3));
/// ```
pub fn forfeitable_carry_forward(balance: &EmployeeLeaveBalance) -> Decimal {
    if balance.carry_forward_expired || balance.carried_forward_leaves <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let unconsumed = (balance.carried_forward_leaves - balance.used_leaves).max(Decimal::ZERO);
    unconsumed
        .min(balance.available_leaves())
        .max(Decimal::ZERO)
}

/// Carried days a reversal would bring back on an expired balance.
///
/// Once expiry has run, the row keeps only the carry that was already
/// consumed. Returning `restored_days` to the balance must not turn that
/// consumed carry back into available days, so the part of it no longer
/// covered by `used_leaves` is revived and has to be dropped. `balance` is
/// the row after `used_leaves` was lowered by `restored_days`.
pub fn revived_carry_forward(balance: &EmployeeLeaveBalance, restored_days: Decimal) -> Decimal {
    if !balance.carry_forward_expired || restored_days <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let carried = balance.carried_forward_leaves;
    let uncovered_after = (carried - balance.used_leaves).max(Decimal::ZERO);
    let uncovered_before = (carried - balance.used_leaves - restored_days).max(Decimal::ZERO);
    uncovered_after - uncovered_before
}
