//! FIFO selection of compensatory-off credits.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::CompOffCredit;

/// Credits selected to cover part of a leave request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompOffAllocation {
    /// Selected credit ids, oldest first.
    pub credit_ids: Vec<Uuid>,
    /// Total days the selected credits cover.
    pub covered_days: Decimal,
}

impl CompOffAllocation {
    /// Returns true if no credit was selected.
    pub fn is_empty(&self) -> bool {
        self.credit_ids.is_empty()
    }
}

/// Selects whole credits, oldest first, to cover up to `requested_days`.
///
/// Only credits usable on `leave_date` are considered. Credits are taken in
/// `earned_date` order (ties broken by id) while the running total stays
/// within the request; selection stops at the first credit that does not
/// fit, so a younger credit is never used ahead of an older one. Credits are
/// never split, which means the covered days may fall short of the request.
///
/// # Example
///
/// ```
/// use leave_ledger::calculation::allocate_comp_off;
/// use leave_ledger::models::CompOffCredit;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let day = |m| NaiveDate::from_ymd_opt(2025, m, 1).unwrap();
/// let credits = vec![
///     CompOffCredit::new("emp_001", day(3), Decimal::ONE, None),
///     CompOffCredit::new("emp_001", day(1), Decimal::ONE, None),
///     CompOffCredit::new("emp_001", day(2), Decimal::ONE, None),
/// ];
///
/// let allocation = allocate_comp_off(&credits, Decimal::from(2), day(4));
/// assert_eq!(allocation.covered_days, Decimal::from(2));
/// assert_eq!(allocation.credit_ids, vec![credits[1].id, credits[2].id]);
/// ```
pub fn allocate_comp_off(
    credits: &[CompOffCredit],
    requested_days: Decimal,
    leave_date: NaiveDate,
) -> CompOffAllocation {
    let mut usable: Vec<&CompOffCredit> = credits
        .iter()
        .filter(|credit| credit.is_usable_on(leave_date))
        .collect();
    usable.sort_by(|a, b| a.earned_date.cmp(&b.earned_date).then(a.id.cmp(&b.id)));

    let mut allocation = CompOffAllocation::default();
    for credit in usable {
        let next = allocation.covered_days + credit.comp_off_days;
        if next > requested_days {
            break;
        }
        allocation.covered_days = next;
        allocation.credit_ids.push(credit.id);
    }
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompOffStatus;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn credit(m: u32, days: &str) -> CompOffCredit {
        CompOffCredit::new("emp_001", date(m, 1), dec(days), None)
    }

    #[test]
    fn test_takes_oldest_credits_first() {
        let credits = vec![credit(1, "1"), credit(2, "1"), credit(3, "1")];
        let allocation = allocate_comp_off(&credits, dec("2"), date(3, 10));

        assert_eq!(allocation.credit_ids, vec![credits[0].id, credits[1].id]);
        assert_eq!(allocation.covered_days, dec("2"));
    }

    #[test]
    fn test_stops_at_first_credit_that_does_not_fit() {
        // Feb credit (2 days) does not fit in the 0.5 remaining; the Mar
        // half-day is not used ahead of it.
        let credits = vec![credit(1, "1"), credit(2, "2"), credit(3, "0.5")];
        let allocation = allocate_comp_off(&credits, dec("1.5"), date(3, 10));

        assert_eq!(allocation.credit_ids, vec![credits[0].id]);
        assert_eq!(allocation.covered_days, dec("1"));
    }

    #[test]
    fn test_fewer_credits_than_requested_covers_partially() {
        let credits = vec![credit(1, "1")];
        let allocation = allocate_comp_off(&credits, dec("3"), date(2, 1));
        assert_eq!(allocation.covered_days, dec("1"));
    }

    #[test]
    fn test_skips_unusable_credits() {
        let mut consumed = credit(1, "1");
        consumed.status = CompOffStatus::Consumed;
        let mut lapsed = credit(1, "1");
        lapsed.expiry_date = Some(date(2, 1));
        let future = credit(6, "1");
        let usable = credit(2, "1");

        let credits = vec![consumed, lapsed, future, usable.clone()];
        let allocation = allocate_comp_off(&credits, dec("3"), date(3, 1));

        assert_eq!(allocation.credit_ids, vec![usable.id]);
    }

    #[test]
    fn test_no_credits_is_empty() {
        let allocation = allocate_comp_off(&[], dec("2"), date(3, 1));
        assert!(allocation.is_empty());
        assert_eq!(allocation.covered_days, Decimal::ZERO);
    }

    #[test]
    fn test_same_day_credits_ordered_by_id() {
        let a = credit(1, "1");
        let b = credit(1, "1");
        let allocation = allocate_comp_off(&[a.clone(), b.clone()], dec("1"), date(2, 1));
        assert_eq!(allocation.credit_ids, vec![a.id.min(b.id)]);
    }
}
