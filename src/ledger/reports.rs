//! Read-only balance reports.
//!
//! Two views over the stored balances: per-leave-type totals for a year,
//! and carried-forward days that are about to expire.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::calculation::forfeitable_carry_forward;
use crate::config::PolicyCatalog;
use crate::models::{BalanceKey, EmployeeLeaveBalance};

/// Totals for one leave type in one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveTypeSummary {
    /// The leave type id.
    pub leave_type_id: String,
    /// The leave type name, or the id when the type is no longer configured.
    pub leave_type_name: String,
    /// The year summarized.
    pub year: i32,
    /// Number of employees with a balance row.
    pub employees: usize,
    /// Sum of entitled days.
    pub total_entitled: Decimal,
    /// Sum of carried-forward days.
    pub total_carried_forward: Decimal,
    /// Sum of manual adjustments.
    pub total_additional: Decimal,
    /// Sum of used days.
    pub total_used: Decimal,
    /// Sum of available days.
    pub total_available: Decimal,
}

/// Sums a year's balances per leave type, ordered by leave type id.
pub fn summarize_balances(
    balances: &[EmployeeLeaveBalance],
    policies: &PolicyCatalog,
    year: i32,
) -> Vec<LeaveTypeSummary> {
    let mut by_type: BTreeMap<&str, LeaveTypeSummary> = BTreeMap::new();

    for balance in balances.iter().filter(|balance| balance.year == year) {
        let summary = by_type
            .entry(balance.leave_type_id.as_str())
            .or_insert_with(|| LeaveTypeSummary {
                leave_type_id: balance.leave_type_id.clone(),
                leave_type_name: policies
                    .get(&balance.leave_type_id)
                    .map(|policy| policy.name.clone())
                    .unwrap_or_else(|_| balance.leave_type_id.clone()),
                year,
                employees: 0,
                total_entitled: Decimal::ZERO,
                total_carried_forward: Decimal::ZERO,
                total_additional: Decimal::ZERO,
                total_used: Decimal::ZERO,
                total_available: Decimal::ZERO,
            });
        summary.employees += 1;
        summary.total_entitled += balance.entitled_leaves;
        summary.total_carried_forward += balance.carried_forward_leaves;
        summary.total_additional += balance.additional_leaves;
        summary.total_used += balance.used_leaves;
        summary.total_available += balance.available_leaves();
    }

    by_type.into_values().collect()
}

/// How soon carried-forward days expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryUrgency {
    /// The expiry date has passed but expiry has not been applied.
    Expired,
    /// Seven days or fewer remain.
    Critical,
    /// Fourteen days or fewer remain.
    High,
    /// More than fourteen days remain.
    Normal,
}

impl ExpiryUrgency {
    /// Classifies a number of days until expiry.
    pub fn from_days_remaining(days_remaining: i64) -> Self {
        match days_remaining {
            d if d < 0 => ExpiryUrgency::Expired,
            0..=7 => ExpiryUrgency::Critical,
            8..=14 => ExpiryUrgency::High,
            _ => ExpiryUrgency::Normal,
        }
    }
}

/// A balance whose carried-forward days expire soon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringCarryForward {
    /// The balance key.
    pub key: BalanceKey,
    /// Days carried into the year.
    pub carried_forward_leaves: Decimal,
    /// Days that would be forfeited if expiry ran today.
    pub forfeitable_days: Decimal,
    /// The expiry date.
    pub expiry_date: NaiveDate,
    /// Days from `as_of` to the expiry date; negative once past.
    pub days_remaining: i64,
    /// Urgency bucket.
    pub urgency: ExpiryUrgency,
}

/// Lists unexpired carry-forwards expiring on or before `as_of + within_days`,
/// soonest first. Carry-forwards already past their date but not yet expired
/// are included with [`ExpiryUrgency::Expired`].
pub fn expiring_carry_forwards(
    balances: &[EmployeeLeaveBalance],
    as_of: NaiveDate,
    within_days: u32,
) -> Vec<ExpiringCarryForward> {
    let horizon = as_of
        .checked_add_days(Days::new(u64::from(within_days)))
        .unwrap_or(NaiveDate::MAX);

    let mut expiring: Vec<ExpiringCarryForward> = balances
        .iter()
        .filter(|balance| {
            !balance.carry_forward_expired && balance.carried_forward_leaves > Decimal::ZERO
        })
        .filter_map(|balance| {
            let expiry_date = balance.carry_forward_expiry_date?;
            if expiry_date > horizon {
                return None;
            }
            let days_remaining = (expiry_date - as_of).num_days();
            Some(ExpiringCarryForward {
                key: balance.key(),
                carried_forward_leaves: balance.carried_forward_leaves,
                forfeitable_days: forfeitable_carry_forward(balance),
                expiry_date,
                days_remaining,
                urgency: ExpiryUrgency::from_days_remaining(days_remaining),
            })
        })
        .collect();

    expiring.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then_with(|| a.key.cmp(&b.key)));
    expiring
}
