//! The leave balance ledger.
//!
//! [`LeaveBalanceLedger`] owns every mutation of balances and comp-off
//! credits. Each mutating call follows the same shape:
//!
//! 1. validate the input without touching state
//! 2. lock every key the operation touches
//! 3. read current state and compute the change with the pure calculators
//! 4. commit one [`Changeset`] holding the new rows and the operation's
//!    [`BalanceAdjustment`], preceded by an `expiry` adjustment when the
//!    operation settles a carry-forward that lapsed before its date
//!
//! A failure at any step leaves the store untouched.
//!
//! Year-end work lives in `year_end`, comp-off credits in `comp_off` and
//! encashment in `encashment`; they extend this type with further `impl`
//! blocks.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calculation::{
    allocate_comp_off, compute_accrual, revived_carry_forward, year_start,
};
use crate::config::{LeaveTypePolicy, LedgerConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Actor, AdjustmentType, BalanceAdjustment, BalanceKey, BalanceSnapshot, CompOffCredit,
    ConsumptionRecord, EmployeeLeaveBalance,
};

use super::locks::{KeyGuard, KeyLocks, LockKey};
use super::outcomes::{ConsumptionOutcome, LedgerOutcome, ReversalOutcome};
use super::reports::{
    ExpiringCarryForward, LeaveTypeSummary, expiring_carry_forwards, summarize_balances,
};
use super::requests::{
    AdjustmentKind, InitialBalanceEntry, LeaveConsumption, ManualAdjustment,
    validate_entitlement, validate_granularity, validate_id, validate_year,
};
use super::store::{Changeset, InMemoryStore, LedgerStore};
use super::year_end::expire_due_carry_forward;

/// Authoritative store of leave balances and their audit trail.
///
/// Operations on the same balance key are serialized; operations on
/// different keys run in parallel. A caller that cannot get its keys within
/// the configured lock timeout receives [`LedgerError::Busy`] and may retry.
///
/// # Example
///
/// ```
/// use leave_ledger::config::ConfigLoader;
/// use leave_ledger::ledger::{AdjustmentKind, LeaveBalanceLedger, ManualAdjustment};
/// use leave_ledger::models::Actor;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let config = ConfigLoader::load("./config/default").unwrap().into_config();
/// let ledger = LeaveBalanceLedger::in_memory(config);
/// let admin = Actor::user("hr_admin");
///
/// ledger.set_initial_balance("emp_001", "casual", 2025, Decimal::from(10), &admin).unwrap();
///
/// let outcome = ledger.adjust_balance(
///     &ManualAdjustment {
///         employee_id: "emp_001".to_string(),
///         leave_type_id: "casual".to_string(),
///         kind: AdjustmentKind::Deduct,
///         days: Decimal::from(3),
///         reason: "Unrecorded absence".to_string(),
///         effective_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
///     },
///     &admin,
/// ).unwrap();
///
/// assert_eq!(outcome.snapshot.available_leaves, Decimal::from(7));
/// ```
#[derive(Debug)]
pub struct LeaveBalanceLedger<S: LedgerStore = InMemoryStore> {
    pub(super) store: S,
    pub(super) config: LedgerConfig,
    pub(super) locks: KeyLocks,
}

impl LeaveBalanceLedger<InMemoryStore> {
    /// Creates a ledger backed by an empty in-memory store.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(InMemoryStore::new(), config)
    }
}

impl<S: LedgerStore> LeaveBalanceLedger<S> {
    /// Creates a ledger over a store.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyLocks::new(),
        }
    }

    /// Returns the ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ==========================================================================
    // Balance setup
    // ==========================================================================

    /// Creates a year's balance row with a starting entitlement.
    ///
    /// Records an `initial_balance` adjustment effective on 1 January.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if the entitlement is outside 0..=365 or
    ///   the year outside 2000..=2100
    /// - [`LedgerError::NotFound`] for an unknown leave type
    /// - [`LedgerError::AlreadyExists`] if the row exists
    pub fn set_initial_balance(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
        entitled_leaves: Decimal,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        validate_id("employee_id", employee_id)?;
        validate_year(year)?;
        validate_entitlement(entitled_leaves)?;
        self.policy(leave_type_id)?;

        let key = BalanceKey::new(employee_id, leave_type_id, year);
        let _guard = self.lock(vec![LockKey::Balance(key.clone())])?;

        if self.store.balance(&key)?.is_some() {
            warn!(key = %key, "Initial balance rejected: row already exists");
            return Err(LedgerError::AlreadyExists {
                key: key.to_string(),
            });
        }

        let (balance, adjustment) = initial_balance_row(&key, entitled_leaves, actor)?;
        self.commit_single(balance, None, adjustment, actor)
    }

    /// Creates balance rows for many employees at once.
    ///
    /// Either every row is created or none is.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] for an empty list, a repeated employee,
    ///   or any invalid entry
    /// - [`LedgerError::AlreadyExists`] if any employee already has a row
    pub fn bulk_set_initial_balance(
        &self,
        leave_type_id: &str,
        year: i32,
        entries: &[InitialBalanceEntry],
        actor: &Actor,
    ) -> LedgerResult<Vec<LedgerOutcome>> {
        validate_year(year)?;
        if entries.is_empty() {
            return Err(LedgerError::validation("entries", "must not be empty"));
        }
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            validate_id("employee_id", &entry.employee_id)?;
            validate_entitlement(entry.entitled_leaves)?;
            if !seen.insert(entry.employee_id.as_str()) {
                return Err(LedgerError::validation(
                    "entries",
                    format!("employee '{}' appears more than once", entry.employee_id),
                ));
            }
        }
        self.policy(leave_type_id)?;

        let keys: Vec<BalanceKey> = entries
            .iter()
            .map(|entry| BalanceKey::new(entry.employee_id.clone(), leave_type_id, year))
            .collect();
        let _guard = self.lock(keys.iter().cloned().map(LockKey::Balance).collect())?;

        for key in &keys {
            if self.store.balance(key)?.is_some() {
                warn!(key = %key, "Bulk initial balance rejected: row already exists");
                return Err(LedgerError::AlreadyExists {
                    key: key.to_string(),
                });
            }
        }

        let mut changeset = Changeset::new();
        let mut snapshots = Vec::with_capacity(entries.len());
        for (key, entry) in keys.iter().zip(entries) {
            let (balance, adjustment) = initial_balance_row(key, entry.entitled_leaves, actor)?;
            snapshots.push(balance.snapshot());
            changeset = changeset.with_balance(balance, None).with_adjustment(adjustment);
        }

        let committed = self.store.commit(changeset)?;
        info!(
            leave_type_id = %leave_type_id,
            year,
            employees = committed.len(),
            actor = %actor,
            "Bulk initial balances created"
        );

        Ok(snapshots
            .into_iter()
            .zip(committed)
            .map(|(snapshot, adjustment)| LedgerOutcome::applied(snapshot, adjustment))
            .collect())
    }

    // ==========================================================================
    // Manual adjustments
    // ==========================================================================

    /// Adds or deducts days by hand.
    ///
    /// The balance year is the year of `effective_date`. Adds and deducts
    /// change `additional_leaves`. An `add` is the only way to give back
    /// carried-forward days that expired.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] for a malformed request
    /// - [`LedgerError::NotFound`] if the balance row does not exist
    /// - [`LedgerError::InsufficientBalance`] if a deduction exceeds the
    ///   available balance
    pub fn adjust_balance(
        &self,
        request: &ManualAdjustment,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        request.validate()?;
        self.policy(&request.leave_type_id)?;

        let key = BalanceKey::new(
            request.employee_id.clone(),
            request.leave_type_id.clone(),
            request.effective_date.year(),
        );
        let _guard = self.lock(vec![LockKey::Balance(key.clone())])?;

        let mut balance = self.require_balance(&key)?;
        let expected_version = Some(balance.version);
        let before = balance.available_leaves();

        let adjustment_type = match request.kind {
            AdjustmentKind::Add => {
                balance.additional_leaves += request.days;
                AdjustmentType::Add
            }
            AdjustmentKind::Deduct => {
                if request.days > before {
                    return Err(insufficient(&key, before, request.days));
                }
                balance.additional_leaves -= request.days;
                AdjustmentType::Deduct
            }
        };

        let adjustment = BalanceAdjustment::new(
            &key,
            adjustment_type,
            before,
            balance.available_leaves(),
            request.effective_date,
            actor,
            request.reason.trim(),
        );
        self.commit_single(balance, expected_version, adjustment, actor)
    }

    // ==========================================================================
    // Accrual
    // ==========================================================================

    /// Grants the accrual due up to `as_of_date`.
    ///
    /// Periods are counted from the latest accrual recorded for the year, so
    /// calling again for the same period grants nothing. The first granting
    /// accrual of a year creates the balance row. Returns a no-op outcome when
    /// accrual is disabled or nothing is due.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] for an unknown leave type
    /// - [`LedgerError::InvalidPolicy`] if the policy lacks a frequency
    pub fn apply_accrual(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        as_of_date: NaiveDate,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        validate_id("employee_id", employee_id)?;
        validate_year(as_of_date.year())?;
        let policy = self.policy(leave_type_id)?;

        let key = BalanceKey::new(employee_id, leave_type_id, as_of_date.year());
        if !policy.accrual_enabled {
            debug!(key = %key, "Accrual skipped: not enabled for leave type");
            return Ok(LedgerOutcome::unchanged(self.snapshot_or_empty(&key)?));
        }

        let _guard = self.lock(vec![LockKey::Balance(key.clone())])?;

        let existing = self.store.balance(&key)?;
        let last_accrual = self
            .store
            .latest_adjustment(&key, AdjustmentType::Accrual)?
            .map(|adjustment| adjustment.effective_date);
        let entitled = existing
            .as_ref()
            .map_or(Decimal::ZERO, |balance| balance.entitled_leaves);

        let computation = compute_accrual(policy, entitled, last_accrual, as_of_date)?;
        if computation.is_empty() {
            debug!(
                key = %key,
                periods = computation.periods,
                capped = computation.capped,
                "Accrual skipped: nothing due"
            );
            let snapshot = existing
                .map(|balance| balance.snapshot())
                .unwrap_or_else(|| BalanceSnapshot::empty(&key));
            return Ok(LedgerOutcome::unchanged(snapshot));
        }

        let expected_version = existing.as_ref().map(|balance| balance.version);
        let mut balance = existing.unwrap_or_else(|| EmployeeLeaveBalance::new(&key));
        let before = balance.available_leaves();
        balance.entitled_leaves += computation.granted_days;

        let meta = match policy.accrual_frequency {
            Some(frequency) => computation.to_meta(frequency, policy.accrual_rate),
            None => serde_json::Value::Null,
        };
        let adjustment = BalanceAdjustment::new(
            &key,
            AdjustmentType::Accrual,
            before,
            balance.available_leaves(),
            computation.effective_date,
            actor,
            computation.reasoning.clone(),
        )
        .with_meta(meta);

        self.commit_single(balance, expected_version, adjustment, actor)
    }

    // ==========================================================================
    // Consumption
    // ==========================================================================

    /// Takes approved leave from a balance.
    ///
    /// With `use_comp_off`, the employee's oldest usable comp-off credits pay
    /// first (whole credits only) and the remainder comes out of the standard
    /// balance. Credit updates, the balance write, the `consumption`
    /// adjustment and the [`ConsumptionRecord`] commit together or not at all.
    ///
    /// Leave dated on or after a carry-forward expiry date that has not been
    /// applied yet applies it first, so the lapsed days cannot pay for it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] for a malformed request, including
    ///   fractional days the leave type does not allow
    /// - [`LedgerError::AlreadyConsumed`] if the leave request already consumed
    /// - [`LedgerError::NotFound`] if the balance row does not exist
    /// - [`LedgerError::InsufficientBalance`] if the standard portion exceeds
    ///   the available balance
    pub fn consume_for_leave(
        &self,
        request: &LeaveConsumption,
        actor: &Actor,
    ) -> LedgerResult<ConsumptionOutcome> {
        request.validate()?;
        let policy = self.policy(&request.leave_type_id)?;
        validate_granularity("days", request.days, policy.allow_half_day)?;

        let key = BalanceKey::new(
            request.employee_id.clone(),
            request.leave_type_id.clone(),
            request.leave_date.year(),
        );
        let _guard = self.lock(vec![
            LockKey::Balance(key.clone()),
            LockKey::CompOff(request.employee_id.clone()),
            LockKey::LeaveRequest(request.leave_request_id.clone()),
        ])?;

        if self.store.consumption(&request.leave_request_id)?.is_some() {
            warn!(
                leave_request_id = %request.leave_request_id,
                "Consumption rejected: leave request already consumed"
            );
            return Err(LedgerError::AlreadyConsumed {
                leave_request_id: request.leave_request_id.clone(),
            });
        }

        let mut balance = self.require_balance(&key)?;
        let expected_version = Some(balance.version);
        let carry_forward_expiry =
            expire_due_carry_forward(&mut balance, request.leave_date, actor);

        let (credits, allocation) = if request.use_comp_off && !policy.is_comp_off_type {
            let credits = self.store.comp_off_credits(&request.employee_id)?;
            let allocation = allocate_comp_off(&credits, request.days, request.leave_date);
            (credits, allocation)
        } else {
            (Vec::new(), Default::default())
        };

        let standard_days = request.days - allocation.covered_days;
        let before = balance.available_leaves();
        if standard_days > before {
            return Err(insufficient(&key, before, standard_days));
        }
        balance.used_leaves += standard_days;

        let consumed_credits: Vec<CompOffCredit> = credits
            .into_iter()
            .filter(|credit| allocation.credit_ids.contains(&credit.id))
            .map(|mut credit| {
                credit.consume(&request.leave_request_id, request.leave_date);
                credit
            })
            .collect();

        let adjustment = BalanceAdjustment::new(
            &key,
            AdjustmentType::Consumption,
            before,
            balance.available_leaves(),
            request.leave_date,
            actor,
            format!("Leave request {}", request.leave_request_id),
        )
        .with_leave_request(request.leave_request_id.clone())
        .with_meta(serde_json::json!({
            "requested_days": request.days.normalize().to_string(),
            "comp_off_days": allocation.covered_days.normalize().to_string(),
            "standard_days": standard_days.normalize().to_string(),
            "comp_off_credit_ids": allocation.credit_ids,
        }));

        let record = ConsumptionRecord {
            leave_request_id: request.leave_request_id.clone(),
            key: key.clone(),
            leave_date: request.leave_date,
            standard_days,
            comp_off_credit_ids: allocation.credit_ids.clone(),
            comp_off_days: allocation.covered_days,
            consumed_at: adjustment.created_at,
            reversed: false,
        };

        let snapshot = balance.snapshot();
        let changeset = Changeset::new()
            .with_balance(balance, expected_version)
            .with_adjustments(carry_forward_expiry)
            .with_adjustment(adjustment)
            .with_credits(consumed_credits)
            .with_consumption(record.clone());
        let (carry_forward_expiry, adjustment) = self.commit_changeset(changeset)?;

        if let Some(expiry) = &carry_forward_expiry {
            log_settled_expiry(expiry, actor);
        }
        info!(
            key = %key,
            leave_request_id = %request.leave_request_id,
            standard_days = %standard_days,
            comp_off_days = %record.comp_off_days,
            comp_off_credits = record.comp_off_credit_ids.len(),
            balance_after = %adjustment.balance_after,
            actor = %actor,
            "Leave consumed"
        );

        Ok(ConsumptionOutcome {
            snapshot,
            adjustment,
            carry_forward_expiry,
            record,
        })
    }

    /// Reverses a leave request's consumption.
    ///
    /// Restores the standard days it took and returns its comp-off credits
    /// to the available pool. On a row whose carry-forward already expired,
    /// carried days the restored usage had covered are dropped instead of
    /// becoming available again. Reversing an already reversed request
    /// changes nothing and returns [`ReversalOutcome::AlreadyReversed`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NothingToReverse`] if the leave request never
    /// consumed anything.
    pub fn reverse_consumption(
        &self,
        leave_request_id: &str,
        actor: &Actor,
    ) -> LedgerResult<ReversalOutcome> {
        validate_id("leave_request_id", leave_request_id)?;

        let nothing_to_reverse = || LedgerError::NothingToReverse {
            leave_request_id: leave_request_id.to_string(),
        };
        let key = self
            .store
            .consumption(leave_request_id)?
            .ok_or_else(nothing_to_reverse)?
            .key;

        let _guard = self.lock(vec![
            LockKey::Balance(key.clone()),
            LockKey::CompOff(key.employee_id.clone()),
            LockKey::LeaveRequest(leave_request_id.to_string()),
        ])?;

        let mut record = self
            .store
            .consumption(leave_request_id)?
            .ok_or_else(nothing_to_reverse)?;
        if record.reversed {
            debug!(leave_request_id = %leave_request_id, "Reversal skipped: already reversed");
            return Ok(ReversalOutcome::AlreadyReversed {
                snapshot: self.snapshot_or_empty(&key)?,
            });
        }

        let mut balance = self.require_balance(&key)?;
        let expected_version = Some(balance.version);
        let before = balance.available_leaves();
        balance.used_leaves -= record.standard_days;
        let revoked_carry_forward = revived_carry_forward(&balance, record.standard_days);
        balance.carried_forward_leaves -= revoked_carry_forward;

        let restored: Vec<CompOffCredit> = self
            .store
            .comp_off_credits(&key.employee_id)?
            .into_iter()
            .filter(|credit| {
                record.comp_off_credit_ids.contains(&credit.id)
                    && credit.consumed_by_leave_request_id.as_deref() == Some(leave_request_id)
            })
            .map(|mut credit| {
                credit.restore();
                credit
            })
            .collect();
        let restored_credit_ids: Vec<Uuid> = restored.iter().map(|credit| credit.id).collect();

        record.reversed = true;
        let adjustment = BalanceAdjustment::new(
            &key,
            AdjustmentType::Reversal,
            before,
            balance.available_leaves(),
            record.leave_date,
            actor,
            format!("Reversal of leave request {}", leave_request_id),
        )
        .with_leave_request(leave_request_id)
        .with_meta(serde_json::json!({
            "standard_days": record.standard_days.normalize().to_string(),
            "revoked_carry_forward": revoked_carry_forward.normalize().to_string(),
            "restored_comp_off_credit_ids": restored_credit_ids,
        }));

        let snapshot = balance.snapshot();
        let changeset = Changeset::new()
            .with_balance(balance, expected_version)
            .with_adjustment(adjustment)
            .with_credits(restored)
            .with_consumption(record);
        let (_, adjustment) = self.commit_changeset(changeset)?;

        info!(
            key = %key,
            leave_request_id = %leave_request_id,
            restored_days = %adjustment.days,
            revoked_carry_forward = %revoked_carry_forward,
            restored_credits = restored_credit_ids.len(),
            actor = %actor,
            "Leave consumption reversed"
        );

        Ok(ReversalOutcome::Reversed {
            snapshot,
            adjustment,
            restored_credit_ids,
        })
    }

    // ==========================================================================
    // Reads
    // ==========================================================================

    /// The current balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if the balance row does not exist.
    pub fn balance(&self, key: &BalanceKey) -> LedgerResult<BalanceSnapshot> {
        Ok(self.require_balance(key)?.snapshot())
    }

    /// A balance's adjustments ordered by sequence.
    pub fn history(&self, key: &BalanceKey) -> LedgerResult<Vec<BalanceAdjustment>> {
        self.store.adjustments(key)
    }

    /// The consumption record of a leave request, if it consumed anything.
    pub fn consumption(&self, leave_request_id: &str) -> LedgerResult<Option<ConsumptionRecord>> {
        self.store.consumption(leave_request_id)
    }

    /// Per-leave-type totals for a year.
    pub fn balance_summary(&self, year: i32) -> LedgerResult<Vec<LeaveTypeSummary>> {
        let balances = self.store.balances_for_year(year)?;
        Ok(summarize_balances(&balances, self.config.policies(), year))
    }

    /// Carry-forwards expiring within `within_days` of `as_of`; the
    /// configured `expiring_window_days` when `None`.
    pub fn expiring_carry_forwards(
        &self,
        as_of: NaiveDate,
        within_days: Option<u32>,
    ) -> LedgerResult<Vec<ExpiringCarryForward>> {
        let within_days = within_days.unwrap_or(self.config.settings().expiring_window_days);
        let balances = self.store.all_balances()?;
        Ok(expiring_carry_forwards(&balances, as_of, within_days))
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    pub(super) fn policy(&self, leave_type_id: &str) -> LedgerResult<&LeaveTypePolicy> {
        self.config.policies().get(leave_type_id)
    }

    pub(super) fn lock(&self, keys: Vec<LockKey>) -> LedgerResult<KeyGuard<'_>> {
        self.locks
            .acquire(keys, self.config.settings().lock_timeout())
            .inspect_err(|err| warn!(error = %err, "Lock acquisition timed out"))
    }

    pub(super) fn require_balance(&self, key: &BalanceKey) -> LedgerResult<EmployeeLeaveBalance> {
        self.store
            .balance(key)?
            .ok_or_else(|| LedgerError::not_found("leave balance", key))
    }

    fn snapshot_or_empty(&self, key: &BalanceKey) -> LedgerResult<BalanceSnapshot> {
        Ok(self
            .store
            .balance(key)?
            .map(|balance| balance.snapshot())
            .unwrap_or_else(|| BalanceSnapshot::empty(key)))
    }

    /// Commits a changeset whose last adjustment belongs to the operation.
    ///
    /// Returns the committed carry-forward expiry, if the changeset settled
    /// one ahead of it, and the operation's own adjustment.
    fn commit_changeset(
        &self,
        changeset: Changeset,
    ) -> LedgerResult<(Option<BalanceAdjustment>, BalanceAdjustment)> {
        let mut committed = self.store.commit(changeset)?;
        let adjustment = committed.pop().ok_or_else(|| LedgerError::Storage {
            message: "commit returned no adjustment".to_string(),
        })?;
        Ok((committed.pop(), adjustment))
    }

    pub(super) fn commit_single(
        &self,
        balance: EmployeeLeaveBalance,
        expected_version: Option<u64>,
        adjustment: BalanceAdjustment,
        actor: &Actor,
    ) -> LedgerResult<LedgerOutcome> {
        let (_, outcome) =
            self.commit_with_expiry(balance, expected_version, None, adjustment, actor)?;
        Ok(outcome)
    }

    /// Commits a balance write with its adjustment, preceded by a settled
    /// carry-forward expiry when there is one.
    pub(super) fn commit_with_expiry(
        &self,
        balance: EmployeeLeaveBalance,
        expected_version: Option<u64>,
        carry_forward_expiry: Option<BalanceAdjustment>,
        adjustment: BalanceAdjustment,
        actor: &Actor,
    ) -> LedgerResult<(Option<BalanceAdjustment>, LedgerOutcome)> {
        let snapshot = balance.snapshot();
        let (carry_forward_expiry, adjustment) = self.commit_changeset(
            Changeset::new()
                .with_balance(balance, expected_version)
                .with_adjustments(carry_forward_expiry)
                .with_adjustment(adjustment),
        )?;

        if let Some(expiry) = &carry_forward_expiry {
            log_settled_expiry(expiry, actor);
        }
        info!(
            key = %snapshot.key,
            adjustment_type = %adjustment.adjustment_type,
            days = %adjustment.days,
            balance_before = %adjustment.balance_before,
            balance_after = %adjustment.balance_after,
            sequence = adjustment.sequence,
            actor = %actor,
            "Balance adjusted"
        );
        Ok((carry_forward_expiry, LedgerOutcome::applied(snapshot, adjustment)))
    }
}

fn initial_balance_row(
    key: &BalanceKey,
    entitled_leaves: Decimal,
    actor: &Actor,
) -> LedgerResult<(EmployeeLeaveBalance, BalanceAdjustment)> {
    let mut balance = EmployeeLeaveBalance::new(key);
    balance.entitled_leaves = entitled_leaves;
    let adjustment = BalanceAdjustment::new(
        key,
        AdjustmentType::InitialBalance,
        Decimal::ZERO,
        balance.available_leaves(),
        year_start(key.year)?,
        actor,
        format!("Initial balance of {} days", entitled_leaves.normalize()),
    );
    Ok((balance, adjustment))
}

fn log_settled_expiry(expiry: &BalanceAdjustment, actor: &Actor) {
    info!(
        key = %expiry.key(),
        forfeited = %expiry.days,
        expiry_date = %expiry.effective_date,
        sequence = expiry.sequence,
        actor = %actor,
        "Carry-forward expired ahead of a dated change"
    );
}

fn insufficient(key: &BalanceKey, available: Decimal, requested: Decimal) -> LedgerError {
    warn!(
        key = %key,
        available = %available,
        requested = %requested,
        "Insufficient balance"
    );
    LedgerError::InsufficientBalance {
        key: key.to_string(),
        available,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::{
        admin, annual, date, dec, leave, ledger, ledger_with_carry_forward, ledger_with_timeout,
    };
    use crate::models::CompOffStatus;
    use std::time::Duration;

    fn manual(kind: AdjustmentKind, days: &str) -> ManualAdjustment {
        ManualAdjustment {
            employee_id: "emp_001".to_string(),
            leave_type_id: "annual".to_string(),
            kind,
            days: dec(days),
            reason: "Correction".to_string(),
            effective_date: date(2025, 3, 1),
        }
    }

    // ==========================================================================
    // Initial balances
    // ==========================================================================

    #[test]
    fn test_initial_balance_creates_row_and_adjustment() {
        let ledger = ledger();
        let outcome = ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();

        assert_eq!(outcome.snapshot.available_leaves, dec("12"));
        let adjustment = outcome.adjustment.unwrap();
        assert_eq!(adjustment.adjustment_type, AdjustmentType::InitialBalance);
        assert_eq!(adjustment.balance_before, Decimal::ZERO);
        assert_eq!(adjustment.balance_after, dec("12"));
        assert_eq!(adjustment.effective_date, date(2025, 1, 1));
        assert_eq!(adjustment.created_by.as_deref(), Some("hr_admin"));
    }

    #[test]
    fn test_initial_balance_twice_is_already_exists() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();

        let result = ledger.set_initial_balance("emp_001", "annual", 2025, dec("5"), &admin());

        assert!(matches!(result, Err(LedgerError::AlreadyExists { .. })));
        assert_eq!(ledger.balance(&annual(2025)).unwrap().available_leaves, dec("12"));
        assert_eq!(ledger.history(&annual(2025)).unwrap().len(), 1);
    }

    #[test]
    fn test_initial_balance_rejects_bad_input() {
        let ledger = ledger();
        assert!(matches!(
            ledger.set_initial_balance("emp_001", "annual", 2025, dec("366"), &admin()),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            ledger.set_initial_balance("emp_001", "annual", 1999, dec("1"), &admin()),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            ledger.set_initial_balance("emp_001", "unpaid", 2025, dec("1"), &admin()),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(ledger.store().all_balances().unwrap().is_empty());
    }

    #[test]
    fn test_bulk_initial_balance_is_all_or_nothing() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_002", "annual", 2025, dec("12"), &admin())
            .unwrap();

        let entries = vec![
            InitialBalanceEntry::new("emp_001", dec("10")),
            InitialBalanceEntry::new("emp_002", dec("10")),
        ];
        let result = ledger.bulk_set_initial_balance("annual", 2025, &entries, &admin());

        assert!(matches!(result, Err(LedgerError::AlreadyExists { .. })));
        assert!(ledger.balance(&annual(2025)).is_err());
    }

    #[test]
    fn test_bulk_initial_balance_creates_every_row() {
        let ledger = ledger();
        let entries = vec![
            InitialBalanceEntry::new("emp_001", dec("10")),
            InitialBalanceEntry::new("emp_002", dec("8.5")),
        ];

        let outcomes = ledger
            .bulk_set_initial_balance("annual", 2025, &entries, &admin())
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].snapshot.available_leaves, dec("8.5"));
        assert_eq!(outcomes[1].adjustment.as_ref().unwrap().employee_id, "emp_002");
        assert_eq!(ledger.store().adjustment_count(), 2);
    }

    #[test]
    fn test_bulk_initial_balance_rejects_duplicates() {
        let ledger = ledger();
        let entries = vec![
            InitialBalanceEntry::new("emp_001", dec("10")),
            InitialBalanceEntry::new("emp_001", dec("8")),
        ];
        assert!(matches!(
            ledger.bulk_set_initial_balance("annual", 2025, &entries, &admin()),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            ledger.bulk_set_initial_balance("annual", 2025, &[], &admin()),
            Err(LedgerError::Validation { .. })
        ));
    }

    // ==========================================================================
    // Manual adjustments
    // ==========================================================================

    #[test]
    fn test_add_increases_additional_leaves() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("10"), &admin())
            .unwrap();

        let outcome = ledger
            .adjust_balance(&manual(AdjustmentKind::Add, "2.5"), &admin())
            .unwrap();

        assert_eq!(outcome.snapshot.additional_leaves, dec("2.5"));
        assert_eq!(outcome.snapshot.available_leaves, dec("12.5"));
        assert_eq!(outcome.adjustment.unwrap().adjustment_type, AdjustmentType::Add);
    }

    #[test]
    fn test_deduct_beyond_available_is_rejected() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("2"), &admin())
            .unwrap();

        match ledger.adjust_balance(&manual(AdjustmentKind::Deduct, "3"), &admin()) {
            Err(LedgerError::InsufficientBalance {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, dec("2"));
                assert_eq!(requested, dec("3"));
            }
            other => panic!("Expected InsufficientBalance, got {:?}", other),
        }
        assert_eq!(ledger.history(&annual(2025)).unwrap().len(), 1);
    }

    #[test]
    fn test_adjust_missing_row_is_not_found() {
        let ledger = ledger();
        assert!(matches!(
            ledger.adjust_balance(&manual(AdjustmentKind::Add, "1"), &admin()),
            Err(LedgerError::NotFound { .. })
        ));
    }

    // ==========================================================================
    // Accrual
    // ==========================================================================

    #[test]
    fn test_first_accrual_creates_row() {
        let ledger = ledger();
        let outcome = ledger
            .apply_accrual("emp_001", "casual", date(2025, 3, 15), &Actor::System)
            .unwrap();

        assert_eq!(outcome.snapshot.entitled_leaves, dec("3"));
        let adjustment = outcome.adjustment.unwrap();
        assert_eq!(adjustment.effective_date, date(2025, 3, 1));
        assert_eq!(adjustment.created_by, None);
        assert_eq!(adjustment.meta.unwrap()["periods"], 3);
    }

    #[test]
    fn test_accrual_repeat_is_noop() {
        let ledger = ledger();
        ledger
            .apply_accrual("emp_001", "casual", date(2025, 3, 15), &Actor::System)
            .unwrap();

        let repeat = ledger
            .apply_accrual("emp_001", "casual", date(2025, 3, 15), &Actor::System)
            .unwrap();
        assert!(repeat.is_noop());

        let next = ledger
            .apply_accrual("emp_001", "casual", date(2025, 4, 1), &Actor::System)
            .unwrap();
        assert_eq!(next.snapshot.entitled_leaves, dec("4"));
    }

    #[test]
    fn test_accrual_is_capped_then_stops() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "casual", 2025, dec("11"), &admin())
            .unwrap();

        let capped = ledger
            .apply_accrual("emp_001", "casual", date(2025, 3, 1), &Actor::System)
            .unwrap();
        assert_eq!(capped.snapshot.entitled_leaves, dec("12"));
        assert_eq!(capped.adjustment.unwrap().days, dec("1"));

        let after_cap = ledger
            .apply_accrual("emp_001", "casual", date(2025, 4, 1), &Actor::System)
            .unwrap();
        assert!(after_cap.is_noop());
    }

    #[test]
    fn test_accrual_disabled_is_noop() {
        let ledger = ledger();
        let outcome = ledger
            .apply_accrual("emp_001", "maternity", date(2025, 6, 1), &Actor::System)
            .unwrap();
        assert!(outcome.is_noop());
        assert!(ledger.store().all_balances().unwrap().is_empty());
    }

    #[test]
    fn test_quarterly_accrual() {
        let ledger = ledger();
        let outcome = ledger
            .apply_accrual("emp_001", "study", date(2025, 7, 15), &Actor::System)
            .unwrap();
        // Ticks on 1 Jan, 1 Apr and 1 Jul.
        assert_eq!(outcome.snapshot.entitled_leaves, dec("6"));
        assert_eq!(outcome.adjustment.unwrap().effective_date, date(2025, 7, 1));
    }

    // ==========================================================================
    // Consumption and reversal
    // ==========================================================================

    #[test]
    fn test_consumption_uses_comp_off_first() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();
        let first = ledger.grant_comp_off("emp_001", date(2025, 1, 4), dec("1"), &admin()).unwrap();
        let second = ledger.grant_comp_off("emp_001", date(2025, 1, 11), dec("1"), &admin()).unwrap();

        let outcome = ledger
            .consume_for_leave(&leave("annual", "3", true, "lr_1"), &admin())
            .unwrap();

        assert_eq!(outcome.comp_off_days(), dec("2"));
        assert_eq!(outcome.standard_days(), dec("1"));
        assert_eq!(outcome.snapshot.available_leaves, dec("11"));
        assert_eq!(outcome.adjustment.days, dec("1"));
        assert_eq!(outcome.adjustment.leave_request_id.as_deref(), Some("lr_1"));
        assert_eq!(outcome.record.comp_off_credit_ids, vec![first.id, second.id]);

        let credits = ledger.comp_off_credits("emp_001").unwrap();
        assert!(credits.iter().all(|credit| credit.status == CompOffStatus::Consumed));
        assert!(
            credits
                .iter()
                .all(|credit| credit.consumed_by_leave_request_id.as_deref() == Some("lr_1"))
        );
    }

    #[test]
    fn test_failed_consumption_leaves_credits_untouched() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("1"), &admin())
            .unwrap();
        ledger.grant_comp_off("emp_001", date(2025, 1, 4), dec("1"), &admin()).unwrap();

        let result = ledger.consume_for_leave(&leave("annual", "3", true, "lr_1"), &admin());

        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        let credits = ledger.comp_off_credits("emp_001").unwrap();
        assert_eq!(credits[0].status, CompOffStatus::Available);
        assert!(ledger.consumption("lr_1").unwrap().is_none());
        assert_eq!(ledger.history(&annual(2025)).unwrap().len(), 1);
    }

    #[test]
    fn test_comp_off_type_does_not_use_credits() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "comp_off", 2025, dec("2"), &admin())
            .unwrap();
        ledger.grant_comp_off("emp_001", date(2025, 1, 4), dec("1"), &admin()).unwrap();

        let outcome = ledger
            .consume_for_leave(&leave("comp_off", "1", true, "lr_1"), &admin())
            .unwrap();

        assert_eq!(outcome.standard_days(), dec("1"));
        assert!(outcome.record.comp_off_credit_ids.is_empty());
    }

    #[test]
    fn test_same_request_cannot_consume_twice() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();
        ledger
            .consume_for_leave(&leave("annual", "1", false, "lr_1"), &admin())
            .unwrap();

        assert!(matches!(
            ledger.consume_for_leave(&leave("annual", "1", false, "lr_1"), &admin()),
            Err(LedgerError::AlreadyConsumed { .. })
        ));
    }

    #[test]
    fn test_half_day_rule_follows_policy() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "maternity", 2025, dec("182"), &admin())
            .unwrap();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();

        assert!(matches!(
            ledger.consume_for_leave(&leave("maternity", "1.5", false, "lr_1"), &admin()),
            Err(LedgerError::Validation { .. })
        ));
        assert!(
            ledger
                .consume_for_leave(&leave("annual", "1.5", false, "lr_2"), &admin())
                .is_ok()
        );
    }

    #[test]
    fn test_consumption_without_row_is_not_found() {
        let ledger = ledger();
        assert!(matches!(
            ledger.consume_for_leave(&leave("annual", "1", false, "lr_1"), &admin()),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_reverse_unknown_request_is_nothing_to_reverse() {
        let ledger = ledger();
        assert!(matches!(
            ledger.reverse_consumption("lr_missing", &admin()),
            Err(LedgerError::NothingToReverse { .. })
        ));
    }

    #[test]
    fn test_reverse_restores_balance_and_credits_once() {
        let ledger = ledger();
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();
        ledger.grant_comp_off("emp_001", date(2025, 1, 4), dec("1"), &admin()).unwrap();
        ledger
            .consume_for_leave(&leave("annual", "3", true, "lr_1"), &admin())
            .unwrap();

        let reversal = ledger.reverse_consumption("lr_1", &admin()).unwrap();
        match &reversal {
            ReversalOutcome::Reversed {
                snapshot,
                adjustment,
                restored_credit_ids,
            } => {
                assert_eq!(snapshot.available_leaves, dec("12"));
                assert_eq!(adjustment.adjustment_type, AdjustmentType::Reversal);
                assert_eq!(adjustment.days, dec("2"));
                assert_eq!(restored_credit_ids.len(), 1);
            }
            other => panic!("Expected Reversed, got {:?}", other),
        }
        assert_eq!(
            ledger.comp_off_credits("emp_001").unwrap()[0].status,
            CompOffStatus::Available
        );

        let again = ledger.reverse_consumption("lr_1", &admin()).unwrap();
        assert!(!again.was_reversed());
        assert_eq!(again.snapshot().available_leaves, dec("12"));
        assert_eq!(ledger.history(&annual(2025)).unwrap().len(), 3);
    }

    // ==========================================================================
    // Concurrency
    // ==========================================================================

    #[test]
    fn test_held_key_surfaces_busy() {
        let ledger = ledger_with_timeout(10);
        ledger
            .set_initial_balance("emp_001", "annual", 2025, dec("12"), &admin())
            .unwrap();

        let _held = ledger
            .locks
            .acquire(vec![LockKey::Balance(annual(2025))], Duration::from_millis(10))
            .unwrap();
        let result = ledger.adjust_balance(&manual(AdjustmentKind::Add, "1"), &admin());

        match result {
            Err(err @ LedgerError::Busy { .. }) => assert!(err.is_retryable()),
            other => panic!("Expected Busy, got {:?}", other),
        }
        assert_eq!(ledger.history(&annual(2025)).unwrap().len(), 1);
    }

    #[test]
    fn test_other_keys_are_not_blocked() {
        let ledger = ledger_with_timeout(10);
        let _held = ledger
            .locks
            .acquire(vec![LockKey::Balance(annual(2025))], Duration::from_millis(10))
            .unwrap();

        assert!(
            ledger
                .set_initial_balance("emp_002", "annual", 2025, dec("12"), &admin())
                .is_ok()
        );
    }

    // ==========================================================================
    // Reports
    // ==========================================================================

    #[test]
    fn test_reports_read_through_store() {
        let ledger = ledger_with_carry_forward();

        let summary = ledger.balance_summary(2025).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_carried_forward, dec("5"));

        let expiring = ledger.expiring_carry_forwards(date(2025, 3, 20), None).unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].days_remaining, 12);

        assert!(
            ledger
                .expiring_carry_forwards(date(2025, 3, 1), Some(7))
                .unwrap()
                .is_empty()
        );
    }
}
