//! Leave encashment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::warn;

use crate::calculation::{EncashmentEligibility, encashment_eligibility};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Actor, AdjustmentType, BalanceAdjustment, BalanceKey};

use super::locks::LockKey;
use super::outcomes::LedgerOutcome;
use super::requests::{validate_days, validate_granularity, validate_id, validate_year};
use super::service::LeaveBalanceLedger;
use super::store::LedgerStore;
use super::year_end::expire_due_carry_forward;

impl<S: LedgerStore> LeaveBalanceLedger<S> {
    /// How many days of a balance can still be encashed this year.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if the balance row does not exist.
    pub fn encashment_eligibility(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
    ) -> LedgerResult<EncashmentEligibility> {
        let policy = self.policy(leave_type_id)?;
        let key = BalanceKey::new(employee_id, leave_type_id, year);
        let balance = self.require_balance(&key)?;
        Ok(encashment_eligibility(
            policy,
            balance.available_leaves(),
            self.encashed_days(&key)?,
        ))
    }

    /// Converts days into a payout by adding them to `used_leaves`.
    ///
    /// An encashment dated on or after a pending carry-forward expiry
    /// applies that expiry first, in the same commit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EncashmentNotAllowed`] if the leave type forbids
    ///   encashment or `days` exceeds the eligible days
    /// - [`LedgerError::NotFound`] if the balance row does not exist
    pub fn encash(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
        days: Decimal,
        effective_date: NaiveDate,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        validate_id("employee_id", employee_id)?;
        validate_year(year)?;
        validate_days("days", days)?;
        let policy = self.policy(leave_type_id)?;
        validate_granularity("days", days, policy.allow_half_day)?;

        let key = BalanceKey::new(employee_id, leave_type_id, year);
        if !policy.allow_encashment {
            return Err(LedgerError::EncashmentNotAllowed {
                key: key.to_string(),
                message: format!("leave type '{}' cannot be encashed", leave_type_id),
            });
        }

        let _guard = self.lock(vec![LockKey::Balance(key.clone())])?;

        let mut balance = self.require_balance(&key)?;
        let expected_version = Some(balance.version);
        let carry_forward_expiry = expire_due_carry_forward(&mut balance, effective_date, actor);

        let before = balance.available_leaves();
        let eligibility = encashment_eligibility(policy, before, self.encashed_days(&key)?);
        if days > eligibility.eligible_days {
            warn!(
                key = %key,
                requested = %days,
                eligible = %eligibility.eligible_days,
                "Encashment rejected: exceeds eligible days"
            );
            return Err(LedgerError::EncashmentNotAllowed {
                key: key.to_string(),
                message: format!(
                    "requested {} days but only {} are eligible",
                    days,
                    eligibility.eligible_days
                ),
            });
        }
        balance.used_leaves += days;

        let adjustment = BalanceAdjustment::new(
            &key,
            AdjustmentType::Encashment,
            before,
            balance.available_leaves(),
            effective_date,
            actor,
            format!("Encashed {} days", days.normalize()),
        )
        .with_meta(serde_json::json!({
            "already_encashed": eligibility.already_encashed.normalize().to_string(),
            "eligible_days": eligibility.eligible_days.normalize().to_string(),
        }));

        let (_, outcome) = self.commit_with_expiry(
            balance,
            expected_version,
            carry_forward_expiry,
            adjustment,
            actor,
        )?;
        Ok(outcome)
    }

    fn encashed_days(&self, key: &BalanceKey) -> LedgerResult<Decimal> {
        Ok(self
            .store
            .adjustments(key)?
            .iter()
            .filter(|adjustment| adjustment.adjustment_type == AdjustmentType::Encashment)
            .map(|adjustment| adjustment.days)
            .sum())
    }
}
