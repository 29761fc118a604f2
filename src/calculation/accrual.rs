//! Periodic accrual calculation.
//!
//! Accruing leave types grant `accrual_rate` days on every tick of their
//! frequency: the first of each month, the first of each quarter
//! (January, April, July, October) or the first of January. The ledger
//! remembers the last tick it granted through the `effective_date` of the
//! latest accrual adjustment; this module turns that anchor and an as-of
//! date into a grant.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;

use crate::config::{AccrualFrequency, LeaveTypePolicy};
use crate::error::{LedgerError, LedgerResult};

/// The outcome of an accrual calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualComputation {
    /// Whole periods between the anchor and the as-of date.
    pub periods: u32,
    /// `periods × accrual_rate` before the cap.
    pub raw_days: Decimal,
    /// Days actually granted after applying `max_accrual_limit`.
    pub granted_days: Decimal,
    /// Whether the cap reduced the grant.
    pub capped: bool,
    /// The anchor the periods were counted from.
    pub anchor_date: NaiveDate,
    /// The last tick covered; becomes the next anchor.
    pub effective_date: NaiveDate,
    /// Human-readable explanation.
    pub reasoning: String,
}

impl AccrualComputation {
    /// Returns true if the computation grants nothing.
    pub fn is_empty(&self) -> bool {
        self.granted_days <= Decimal::ZERO
    }

    /// Calculation detail for the adjustment's `meta` field.
    pub fn to_meta(&self, frequency: AccrualFrequency, rate: Decimal) -> serde_json::Value {
        serde_json::json!({
            "frequency": frequency.as_str(),
            "accrual_rate": rate.normalize().to_string(),
            "periods": self.periods,
            "raw_days": self.raw_days.normalize().to_string(),
            "granted_days": self.granted_days.normalize().to_string(),
            "capped": self.capped,
            "anchor_date": self.anchor_date.to_string(),
        })
    }
}

/// Counts whole accrual periods between two dates.
///
/// Monthly counts whole months, quarterly whole three-month blocks and
/// yearly whole years. Month arithmetic clamps to the end of the month, so
/// one month after 31 January is the last day of February. Returns 0 when
/// `as_of_date` is on or before `last_accrual_date`.
///
/// # Example
///
/// ```
/// use leave_ledger::calculation::periods_elapsed;
/// use leave_ledger::config::AccrualFrequency;
/// use chrono::NaiveDate;
///
/// let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let apr = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
///
/// assert_eq!(periods_elapsed(AccrualFrequency::Monthly, jan, apr), 3);
/// assert_eq!(periods_elapsed(AccrualFrequency::Quarterly, jan, apr), 1);
/// assert_eq!(periods_elapsed(AccrualFrequency::Yearly, jan, apr), 0);
/// assert_eq!(periods_elapsed(AccrualFrequency::Monthly, apr, jan), 0);
/// ```
pub fn periods_elapsed(
    frequency: AccrualFrequency,
    last_accrual_date: NaiveDate,
    as_of_date: NaiveDate,
) -> u32 {
    if as_of_date <= last_accrual_date {
        return 0;
    }

    let step = frequency.months();
    let months_between = (as_of_date.year() - last_accrual_date.year()) * 12
        + as_of_date.month() as i32
        - last_accrual_date.month() as i32;
    let mut periods = u32::try_from(months_between).unwrap_or(0) / step;

    // The calendar-month difference overshoots when the day of month has
    // not been reached yet.
    while periods > 0 {
        let reached = last_accrual_date
            .checked_add_months(Months::new(periods * step))
            .is_some_and(|tick| tick <= as_of_date);
        if reached {
            break;
        }
        periods -= 1;
    }

    periods
}

/// The anchor used when a year has no accrual yet: one period before
/// 1 January, so the January tick is the first one granted.
pub fn initial_anchor(frequency: AccrualFrequency, year: i32) -> LedgerResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|start| start.checked_sub_months(Months::new(frequency.months())))
        .ok_or_else(|| LedgerError::validation("as_of_date", format!("year {year} is out of range")))
}

/// Computes the accrual due for a balance.
///
/// # Arguments
///
/// * `policy` - The leave type policy; must have accrual enabled
/// * `entitled` - The balance's current `entitled_leaves`
/// * `last_accrual_date` - Effective date of the latest accrual this year, if any
/// * `as_of_date` - The date accrual is evaluated for
///
/// # Errors
///
/// Returns [`LedgerError::InvalidPolicy`] if the policy has no frequency.
pub fn compute_accrual(
    policy: &LeaveTypePolicy,
    entitled: Decimal,
    last_accrual_date: Option<NaiveDate>,
    as_of_date: NaiveDate,
) -> LedgerResult<AccrualComputation> {
    let frequency = policy.accrual_frequency.ok_or_else(|| LedgerError::InvalidPolicy {
        leave_type: policy.id.clone(),
        message: "accrual is enabled but accrual_frequency is not set".to_string(),
    })?;

    let anchor_date = match last_accrual_date {
        Some(date) => date,
        None => initial_anchor(frequency, as_of_date.year())?,
    };

    let periods = periods_elapsed(frequency, anchor_date, as_of_date);
    let raw_days = policy.accrual_rate * Decimal::from(periods);

    let (granted_days, capped) = match policy.max_accrual_limit {
        Some(limit) => {
            let headroom = (limit - entitled).max(Decimal::ZERO);
            if raw_days > headroom {
                (headroom, true)
            } else {
                (raw_days, false)
            }
        }
        None => (raw_days, false),
    };

    let effective_date = anchor_date
        .checked_add_months(Months::new(periods * frequency.months()))
        .unwrap_or(anchor_date);

    let reasoning = if capped {
        format!(
            "{} {} period(s) × {} = {} days, capped at {} by max_accrual_limit",
            periods,
            frequency.as_str(),
            policy.accrual_rate.normalize(),
            raw_days.normalize(),
            granted_days.normalize()
        )
    } else {
        format!(
            "{} {} period(s) × {} = {} days",
            periods,
            frequency.as_str(),
            policy.accrual_rate.normalize(),
            granted_days.normalize()
        )
    };

    Ok(AccrualComputation {
        periods,
        raw_days,
        granted_days,
        capped,
        anchor_date,
        effective_date,
        reasoning,
    })
}
