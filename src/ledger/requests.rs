//! Request types and input validation for ledger operations.
//!
//! Validation here only looks at the shape of the input. It runs before the
//! ledger reads any state, so a rejected request never takes a lock.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Largest day quantity any single operation accepts.
pub const MAX_DAYS: Decimal = Decimal::from_parts(365, 0, 0, false, 0);

/// Smallest manual adjustment.
pub const MIN_ADJUSTMENT_DAYS: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Longest accepted adjustment reason, in characters.
pub const MAX_REASON_LEN: usize = 500;

/// Earliest balance year.
pub const MIN_YEAR: i32 = 2000;

/// Latest balance year.
pub const MAX_YEAR: i32 = 2100;

/// Smallest comp-off credit.
pub const MIN_COMP_OFF_DAYS: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Largest comp-off credit.
pub const MAX_COMP_OFF_DAYS: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Direction of a manual adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Grant extra days.
    Add,
    /// Take days away.
    Deduct,
}

/// A manual add or deduct by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    /// The employee.
    pub employee_id: String,
    /// The leave type id.
    pub leave_type_id: String,
    /// Add or deduct.
    pub kind: AdjustmentKind,
    /// Days to add or deduct.
    pub days: Decimal,
    /// Why the balance is being changed.
    pub reason: String,
    /// The date the change applies to; also selects the balance year.
    pub effective_date: NaiveDate,
}

impl ManualAdjustment {
    /// Checks the request's shape.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if:
    /// - an id is empty
    /// - `days` is outside 0.5..=365
    /// - the reason is blank or longer than 500 characters
    pub fn validate(&self) -> LedgerResult<()> {
        validate_id("employee_id", &self.employee_id)?;
        validate_id("leave_type_id", &self.leave_type_id)?;
        if self.days < MIN_ADJUSTMENT_DAYS || self.days > MAX_DAYS {
            return Err(LedgerError::validation(
                "days",
                format!("must be between {} and {}", MIN_ADJUSTMENT_DAYS, MAX_DAYS),
            ));
        }
        validate_reason(&self.reason)?;
        validate_year(self.effective_date.year())
    }
}

/// Approved leave to take from a balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveConsumption {
    /// The employee.
    pub employee_id: String,
    /// The leave type id.
    pub leave_type_id: String,
    /// Days of leave.
    pub days: Decimal,
    /// Pay with comp-off credits first.
    pub use_comp_off: bool,
    /// The leave request; each request consumes at most once.
    pub leave_request_id: String,
    /// The first day of the leave; selects the balance year.
    pub leave_date: NaiveDate,
}

impl LeaveConsumption {
    /// Checks the request's shape.
    ///
    /// Half-day granularity depends on the leave type and is checked by
    /// [`validate_granularity`] once the policy is known.
    pub fn validate(&self) -> LedgerResult<()> {
        validate_id("employee_id", &self.employee_id)?;
        validate_id("leave_type_id", &self.leave_type_id)?;
        validate_id("leave_request_id", &self.leave_request_id)?;
        validate_days("days", self.days)?;
        validate_year(self.leave_date.year())
    }
}

/// One employee's entry in a bulk initial balance import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialBalanceEntry {
    /// The employee.
    pub employee_id: String,
    /// Starting entitlement.
    pub entitled_leaves: Decimal,
}

impl InitialBalanceEntry {
    /// Creates an entry.
    pub fn new(employee_id: impl Into<String>, entitled_leaves: Decimal) -> Self {
        Self {
            employee_id: employee_id.into(),
            entitled_leaves,
        }
    }
}

/// Rejects blank identifiers.
pub fn validate_id(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Requires a positive day quantity of at most 365.
pub fn validate_days(field: &str, days: Decimal) -> LedgerResult<()> {
    if days <= Decimal::ZERO {
        return Err(LedgerError::validation(field, "must be positive"));
    }
    if days > MAX_DAYS {
        return Err(LedgerError::validation(field, format!("must not exceed {}", MAX_DAYS)));
    }
    Ok(())
}

/// Requires an entitlement between 0 and 365.
pub fn validate_entitlement(days: Decimal) -> LedgerResult<()> {
    if days < Decimal::ZERO || days > MAX_DAYS {
        return Err(LedgerError::validation(
            "entitled_leaves",
            format!("must be between 0 and {}", MAX_DAYS),
        ));
    }
    Ok(())
}

/// Requires a year between 2000 and 2100.
pub fn validate_year(year: i32) -> LedgerResult<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(LedgerError::validation(
            "year",
            format!("must be between {} and {}", MIN_YEAR, MAX_YEAR),
        ));
    }
    Ok(())
}

/// Requires a non-blank reason of at most 500 characters.
pub fn validate_reason(reason: &str) -> LedgerResult<()> {
    if reason.trim().is_empty() {
        return Err(LedgerError::validation("reason", "must not be empty"));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(LedgerError::validation(
            "reason",
            format!("must not exceed {} characters", MAX_REASON_LEN),
        ));
    }
    Ok(())
}

/// Requires whole days, or multiples of half a day when allowed.
pub fn validate_granularity(field: &str, days: Decimal, allow_half_day: bool) -> LedgerResult<()> {
    if allow_half_day {
        if !(days * Decimal::TWO).fract().is_zero() {
            return Err(LedgerError::validation(field, "must be a multiple of 0.5"));
        }
    } else if !days.fract().is_zero() {
        return Err(LedgerError::validation(field, "must be a whole number of days"));
    }
    Ok(())
}

/// Requires a half-day multiple between 0.5 and 5.
pub fn validate_comp_off_days(days: Decimal) -> LedgerResult<()> {
    if days < MIN_COMP_OFF_DAYS || days > MAX_COMP_OFF_DAYS {
        return Err(LedgerError::validation(
            "comp_off_days",
            format!("must be between {} and {}", MIN_COMP_OFF_DAYS, MAX_COMP_OFF_DAYS),
        ));
    }
    validate_granularity("comp_off_days", days, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn adjustment(days: &str, reason: &str) -> ManualAdjustment {
        ManualAdjustment {
            employee_id: "emp_001".to_string(),
            leave_type_id: "casual".to_string(),
            kind: AdjustmentKind::Add,
            days: dec(days),
            reason: reason.to_string(),
            effective_date: date(2025, 3, 1),
        }
    }

    fn field_of(result: LedgerResult<()>) -> String {
        match result {
            Err(LedgerError::Validation { field, .. }) => field,
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(MAX_DAYS, dec("365"));
        assert_eq!(MIN_ADJUSTMENT_DAYS, dec("0.5"));
        assert_eq!(MIN_COMP_OFF_DAYS, dec("0.5"));
        assert_eq!(MAX_COMP_OFF_DAYS, dec("5"));
    }

    #[test]
    fn test_valid_adjustment() {
        assert!(adjustment("2", "Year-end bonus").validate().is_ok());
    }

    #[test]
    fn test_adjustment_days_bounds() {
        assert_eq!(field_of(adjustment("0.25", "x").validate()), "days");
        assert_eq!(field_of(adjustment("366", "x").validate()), "days");
        assert!(adjustment("365", "x").validate().is_ok());
    }

    #[test]
    fn test_adjustment_reason_rules() {
        assert_eq!(field_of(adjustment("1", "   ").validate()), "reason");
        assert_eq!(field_of(adjustment("1", &"r".repeat(501)).validate()), "reason");
        assert!(adjustment("1", &"r".repeat(500)).validate().is_ok());
    }

    #[test]
    fn test_adjustment_year_range() {
        let mut request = adjustment("1", "x");
        request.effective_date = date(1999, 12, 31);
        assert_eq!(field_of(request.validate()), "year");
    }

    #[test]
    fn test_consumption_requires_request_id_and_positive_days() {
        let mut request = LeaveConsumption {
            employee_id: "emp_001".to_string(),
            leave_type_id: "casual".to_string(),
            days: dec("1"),
            use_comp_off: false,
            leave_request_id: String::new(),
            leave_date: date(2025, 3, 3),
        };
        assert_eq!(field_of(request.validate()), "leave_request_id");

        request.leave_request_id = "lr_1".to_string();
        request.days = Decimal::ZERO;
        assert_eq!(field_of(request.validate()), "days");

        request.days = dec("1");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_granularity() {
        assert!(validate_granularity("days", dec("1.5"), true).is_ok());
        assert!(validate_granularity("days", dec("1.25"), true).is_err());
        assert!(validate_granularity("days", dec("1.5"), false).is_err());
        assert!(validate_granularity("days", dec("2"), false).is_ok());
    }

    #[test]
    fn test_entitlement_and_year() {
        assert!(validate_entitlement(Decimal::ZERO).is_ok());
        assert!(validate_entitlement(dec("-1")).is_err());
        assert!(validate_entitlement(dec("365.5")).is_err());
        assert!(validate_year(2000).is_ok());
        assert!(validate_year(2101).is_err());
    }

    #[test]
    fn test_comp_off_days() {
        assert!(validate_comp_off_days(dec("0.5")).is_ok());
        assert!(validate_comp_off_days(dec("5")).is_ok());
        assert!(validate_comp_off_days(dec("5.5")).is_err());
        assert!(validate_comp_off_days(dec("0.75")).is_err());
    }
}
