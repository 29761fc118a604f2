//! Comp-off credit lifecycle: grant, lapse and balance.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Actor, CompOffCredit};

use super::locks::LockKey;
use super::requests::{validate_comp_off_days, validate_id, validate_year};
use super::service::LeaveBalanceLedger;
use super::store::{Changeset, LedgerStore};

impl<S: LedgerStore> LeaveBalanceLedger<S> {
    /// Registers an approved comp-off credit.
    ///
    /// The credit expires `comp_off_validity_months` after `earned_date`, or
    /// never when the validity is zero.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] unless `days` is a half-day
    /// multiple between 0.5 and 5.
    pub fn grant_comp_off(
        &self,
        employee_id: &str,
        earned_date: NaiveDate,
        days: Decimal,
        actor: &Actor,
    ) -> LedgerResult<CompOffCredit> {
        validate_id("employee_id", employee_id)?;
        validate_year(earned_date.year())?;
        validate_comp_off_days(days)?;

        let validity = self.config.settings().comp_off_validity_months;
        let expiry_date = if validity == 0 {
            None
        } else {
            Some(
                earned_date
                    .checked_add_months(Months::new(validity))
                    .ok_or_else(|| LedgerError::validation("earned_date", "out of range"))?,
            )
        };

        let _guard = self.lock(vec![LockKey::CompOff(employee_id.to_string())])?;

        let credit = CompOffCredit::new(employee_id, earned_date, days, expiry_date);
        self.store
            .commit(Changeset::new().with_credits([credit.clone()]))?;

        info!(
            employee_id = %employee_id,
            credit_id = %credit.id,
            earned_date = %earned_date,
            days = %days,
            actor = %actor,
            "Comp-off credit granted"
        );
        Ok(credit)
    }

    /// Marks available credits whose expiry date is before `as_of` as
    /// expired. Returns the credits expired by this call.
    pub fn expire_comp_offs(
        &self,
        employee_id: &str,
        as_of: NaiveDate,
        actor: &Actor,
    ) -> LedgerResult<Vec<CompOffCredit>> {
        validate_id("employee_id", employee_id)?;
        let _guard = self.lock(vec![LockKey::CompOff(employee_id.to_string())])?;

        let expired: Vec<CompOffCredit> = self
            .store
            .comp_off_credits(employee_id)?
            .into_iter()
            .filter(|credit| credit.has_lapsed(as_of))
            .map(|mut credit| {
                credit.expire();
                credit
            })
            .collect();

        if expired.is_empty() {
            debug!(employee_id = %employee_id, as_of = %as_of, "No comp-off credits to expire");
            return Ok(expired);
        }

        self.store
            .commit(Changeset::new().with_credits(expired.iter().cloned()))?;
        info!(
            employee_id = %employee_id,
            expired = expired.len(),
            actor = %actor,
            "Comp-off credits expired"
        );
        Ok(expired)
    }

    /// Days of comp-off usable for leave on `as_of`.
    pub fn comp_off_balance(&self, employee_id: &str, as_of: NaiveDate) -> LedgerResult<Decimal> {
        Ok(self
            .store
            .comp_off_credits(employee_id)?
            .iter()
            .filter(|credit| credit.is_usable_on(as_of))
            .map(|credit| credit.comp_off_days)
            .sum())
    }

    /// All of an employee's comp-off credits in the order they were granted.
    pub fn comp_off_credits(&self, employee_id: &str) -> LedgerResult<Vec<CompOffCredit>> {
        self.store.comp_off_credits(employee_id)
    }
}
