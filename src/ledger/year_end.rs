//! Year-end rollover and carry-forward expiry.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::calculation::{compute_carry_forward, forfeitable_carry_forward, year_start};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Actor, AdjustmentType, BalanceAdjustment, BalanceKey, EmployeeLeaveBalance};

use super::locks::LockKey;
use super::outcomes::LedgerOutcome;
use super::requests::{validate_id, validate_year};
use super::service::LeaveBalanceLedger;
use super::store::LedgerStore;

impl<S: LedgerStore> LeaveBalanceLedger<S> {
    /// Opens `to_year` from `from_year`, carrying unused days forward.
    ///
    /// The new row gets the policy's default entitlement and the capped
    /// carry-forward with its expiry date. One `carry_forward` adjustment is
    /// recorded on the new row.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] unless `to_year` is `from_year + 1`
    /// - [`LedgerError::NotFound`] if `from_year` has no row
    /// - [`LedgerError::AlreadyRolledOver`] if `to_year` already has a row
    pub fn rollover_year(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        from_year: i32,
        to_year: i32,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        validate_id("employee_id", employee_id)?;
        validate_year(from_year)?;
        validate_year(to_year)?;
        if to_year != from_year + 1 {
            return Err(LedgerError::validation(
                "to_year",
                format!("must be {} when rolling over from {}", from_year + 1, from_year),
            ));
        }
        let policy = self.policy(leave_type_id)?;

        let from_key = BalanceKey::new(employee_id, leave_type_id, from_year);
        let to_key = from_key.with_year(to_year);
        let _guard = self.lock(vec![
            LockKey::Balance(from_key.clone()),
            LockKey::Balance(to_key.clone()),
        ])?;

        let from = self.require_balance(&from_key)?;
        if self.store.balance(&to_key)?.is_some() {
            warn!(key = %to_key, "Rollover rejected: target year already exists");
            return Err(LedgerError::AlreadyRolledOver {
                key: to_key.to_string(),
            });
        }

        let available = from.available_leaves();
        let carry = compute_carry_forward(available, policy, to_year)?;

        let mut balance = EmployeeLeaveBalance::new(&to_key);
        balance.entitled_leaves = policy.default_entitlement;
        balance.carried_forward_leaves = carry.amount;
        balance.carry_forward_expiry_date = carry.expiry_date;

        let adjustment = BalanceAdjustment::new(
            &to_key,
            AdjustmentType::CarryForward,
            Decimal::ZERO,
            balance.available_leaves(),
            year_start(to_year)?,
            actor,
            format!(
                "Rollover from {}: {} of {} days carried forward",
                from_year,
                carry.amount.normalize(),
                available.normalize()
            ),
        )
        .with_meta(serde_json::json!({
            "from_year": from_year,
            "available_in_from_year": available.normalize().to_string(),
            "carried_forward": carry.amount.normalize().to_string(),
            "capped": carry.capped,
            "entitlement": policy.default_entitlement.normalize().to_string(),
            "carry_forward_expiry_date": carry.expiry_date.map(|date| date.to_string()),
        }));

        self.commit_single(balance, None, adjustment, actor)
    }

    /// Forfeits unconsumed carried-forward days once they expire.
    ///
    /// Applies when `as_of_date` is on or after the expiry date, the row has
    /// carried-forward days and expiry has not run yet. Carried days are
    /// consumed first, so only the unconsumed part is forfeited. Otherwise a
    /// no-op.
    ///
    /// Leave and encashment dated on or after the expiry date apply a
    /// pending expiry themselves, so a late run here finds nothing the
    /// carry-forward should not have covered.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if the balance row does not exist.
    pub fn expire_carry_forward(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
        as_of_date: NaiveDate,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        validate_id("employee_id", employee_id)?;
        validate_year(year)?;
        self.policy(leave_type_id)?;

        let key = BalanceKey::new(employee_id, leave_type_id, year);
        let _guard = self.lock(vec![LockKey::Balance(key.clone())])?;

        let mut balance = self.require_balance(&key)?;
        let expected_version = Some(balance.version);
        match expire_due_carry_forward(&mut balance, as_of_date, actor) {
            Some(adjustment) => self.commit_single(balance, expected_version, adjustment, actor),
            None => {
                debug!(key = %key, as_of = %as_of_date, "Carry-forward expiry skipped");
                Ok(LedgerOutcome::unchanged(balance.snapshot()))
            }
        }
    }
}

/// Applies a carry-forward expiry that is due on `as_of`.
///
/// Returns the `expiry` adjustment when `balance` holds carried days whose
/// expiry date is on or before `as_of` and expiry has not run; `balance` is
/// updated in place. Returns `None` and leaves `balance` alone otherwise.
pub(super) fn expire_due_carry_forward(
    balance: &mut EmployeeLeaveBalance,
    as_of: NaiveDate,
    actor: &Actor,
) -> Option<BalanceAdjustment> {
    let expiry_date = balance.carry_forward_expiry_date?;
    if as_of < expiry_date
        || balance.carry_forward_expired
        || balance.carried_forward_leaves <= Decimal::ZERO
    {
        return None;
    }

    let before = balance.available_leaves();
    let carried = balance.carried_forward_leaves;
    let forfeited = forfeitable_carry_forward(balance);
    balance.carried_forward_leaves -= forfeited;
    balance.carry_forward_expired = true;

    let adjustment = BalanceAdjustment::new(
        &balance.key(),
        AdjustmentType::Expiry,
        before,
        balance.available_leaves(),
        expiry_date,
        actor,
        format!(
            "Carry-forward expired on {}: {} of {} days forfeited",
            expiry_date,
            forfeited.normalize(),
            carried.normalize()
        ),
    )
    .with_meta(serde_json::json!({
        "carried_forward": carried.normalize().to_string(),
        "forfeited": forfeited.normalize().to_string(),
        "used": balance.used_leaves.normalize().to_string(),
    }));
    Some(adjustment)
}
