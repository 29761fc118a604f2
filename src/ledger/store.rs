//! Ledger persistence.
//!
//! [`LedgerStore`] abstracts the storage engine. A store commits each
//! [`Changeset`] atomically: either every balance write, adjustment,
//! credit and consumption record in it becomes visible, or none does.
//! Balance writes carry the version they were computed from and the store
//! rejects a write whose row has moved on.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    AdjustmentType, BalanceAdjustment, BalanceKey, CompOffCredit, ConsumptionRecord,
    EmployeeLeaveBalance,
};

/// A balance row to write and the version it was read at.
#[derive(Debug, Clone)]
pub struct BalanceWrite {
    /// The new row contents.
    pub balance: EmployeeLeaveBalance,
    /// The version read before computing the change; `None` for a new row.
    pub expected_version: Option<u64>,
}

/// Everything one ledger operation writes.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    /// Balance rows to insert or update.
    pub balances: Vec<BalanceWrite>,
    /// Adjustments to append; sequences are assigned on commit.
    pub adjustments: Vec<BalanceAdjustment>,
    /// Comp-off credits to insert or update.
    pub credits: Vec<CompOffCredit>,
    /// Consumption record to insert or update.
    pub consumption: Option<ConsumptionRecord>,
}

impl Changeset {
    /// Creates an empty changeset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a balance write.
    pub fn with_balance(mut self, balance: EmployeeLeaveBalance, expected_version: Option<u64>) -> Self {
        self.balances.push(BalanceWrite {
            balance,
            expected_version,
        });
        self
    }

    /// Adds an adjustment.
    pub fn with_adjustment(mut self, adjustment: BalanceAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }

    /// Adds adjustments in order.
    pub fn with_adjustments(
        mut self,
        adjustments: impl IntoIterator<Item = BalanceAdjustment>,
    ) -> Self {
        self.adjustments.extend(adjustments);
        self
    }

    /// Adds credit writes.
    pub fn with_credits(mut self, credits: impl IntoIterator<Item = CompOffCredit>) -> Self {
        self.credits.extend(credits);
        self
    }

    /// Sets the consumption record.
    pub fn with_consumption(mut self, record: ConsumptionRecord) -> Self {
        self.consumption = Some(record);
        self
    }

    /// Returns true if the changeset writes nothing.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.adjustments.is_empty()
            && self.credits.is_empty()
            && self.consumption.is_none()
    }
}

/// Abstraction over ledger storage engines.
pub trait LedgerStore: Send + Sync {
    /// Reads one balance row.
    fn balance(&self, key: &BalanceKey) -> LedgerResult<Option<EmployeeLeaveBalance>>;

    /// Reads every balance row, ordered by key.
    fn all_balances(&self) -> LedgerResult<Vec<EmployeeLeaveBalance>>;

    /// Reads every balance row of one year, ordered by key.
    fn balances_for_year(&self, year: i32) -> LedgerResult<Vec<EmployeeLeaveBalance>> {
        Ok(self
            .all_balances()?
            .into_iter()
            .filter(|balance| balance.year == year)
            .collect())
    }

    /// Reads a balance's adjustments ordered by sequence.
    fn adjustments(&self, key: &BalanceKey) -> LedgerResult<Vec<BalanceAdjustment>>;

    /// Reads the most recent adjustment of one type for a balance.
    fn latest_adjustment(
        &self,
        key: &BalanceKey,
        adjustment_type: AdjustmentType,
    ) -> LedgerResult<Option<BalanceAdjustment>> {
        Ok(self
            .adjustments(key)?
            .into_iter()
            .rev()
            .find(|adjustment| adjustment.adjustment_type == adjustment_type))
    }

    /// Reads an employee's comp-off credits in the order they were granted.
    fn comp_off_credits(&self, employee_id: &str) -> LedgerResult<Vec<CompOffCredit>>;

    /// Reads the consumption record of a leave request.
    fn consumption(&self, leave_request_id: &str) -> LedgerResult<Option<ConsumptionRecord>>;

    /// Atomically applies a changeset.
    ///
    /// Returns the committed adjustments with their assigned sequences.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Busy`] if a balance row's version does not
    /// match the write's `expected_version`; nothing is written.
    fn commit(&self, changeset: Changeset) -> LedgerResult<Vec<BalanceAdjustment>>;
}

#[derive(Debug, Default)]
struct StoreState {
    balances: BTreeMap<BalanceKey, EmployeeLeaveBalance>,
    adjustments: HashMap<BalanceKey, Vec<BalanceAdjustment>>,
    credits: HashMap<String, Vec<CompOffCredit>>,
    consumptions: HashMap<String, ConsumptionRecord>,
    last_sequence: u64,
}

/// A [`LedgerStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of adjustments across all balances.
    pub fn adjustment_count(&self) -> usize {
        self.state.read().adjustments.values().map(Vec::len).sum()
    }
}

impl LedgerStore for InMemoryStore {
    fn balance(&self, key: &BalanceKey) -> LedgerResult<Option<EmployeeLeaveBalance>> {
        Ok(self.state.read().balances.get(key).cloned())
    }

    fn all_balances(&self) -> LedgerResult<Vec<EmployeeLeaveBalance>> {
        Ok(self.state.read().balances.values().cloned().collect())
    }

    fn balances_for_year(&self, year: i32) -> LedgerResult<Vec<EmployeeLeaveBalance>> {
        Ok(self
            .state
            .read()
            .balances
            .values()
            .filter(|balance| balance.year == year)
            .cloned()
            .collect())
    }

    fn adjustments(&self, key: &BalanceKey) -> LedgerResult<Vec<BalanceAdjustment>> {
        Ok(self
            .state
            .read()
            .adjustments
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn comp_off_credits(&self, employee_id: &str) -> LedgerResult<Vec<CompOffCredit>> {
        Ok(self
            .state
            .read()
            .credits
            .get(employee_id)
            .cloned()
            .unwrap_or_default())
    }

    fn consumption(&self, leave_request_id: &str) -> LedgerResult<Option<ConsumptionRecord>> {
        Ok(self.state.read().consumptions.get(leave_request_id).cloned())
    }

    fn commit(&self, changeset: Changeset) -> LedgerResult<Vec<BalanceAdjustment>> {
        let mut state = self.state.write();

        for write in &changeset.balances {
            let key = write.balance.key();
            let current = state.balances.get(&key).map(|balance| balance.version);
            if current != write.expected_version {
                return Err(LedgerError::Busy {
                    resource: key.to_string(),
                    message: format!(
                        "expected version {:?}, found {:?}",
                        write.expected_version, current
                    ),
                });
            }
        }

        for write in changeset.balances {
            let mut balance = write.balance;
            balance.version = write.expected_version.map_or(1, |version| version + 1);
            state.balances.insert(balance.key(), balance);
        }

        let mut committed = Vec::with_capacity(changeset.adjustments.len());
        for adjustment in changeset.adjustments {
            state.last_sequence += 1;
            let adjustment = adjustment.with_sequence(state.last_sequence);
            state
                .adjustments
                .entry(adjustment.key())
                .or_default()
                .push(adjustment.clone());
            committed.push(adjustment);
        }

        for credit in changeset.credits {
            let credits = state.credits.entry(credit.employee_id.clone()).or_default();
            match credits.iter_mut().find(|existing| existing.id == credit.id) {
                Some(existing) => *existing = credit,
                None => credits.push(credit),
            }
        }

        if let Some(record) = changeset.consumption {
            state
                .consumptions
                .insert(record.leave_request_id.clone(), record);
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Actor;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn key() -> BalanceKey {
        BalanceKey::new("emp_001", "casual", 2025)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn initial(days: i64) -> (EmployeeLeaveBalance, BalanceAdjustment) {
        let mut balance = EmployeeLeaveBalance::new(&key());
        balance.entitled_leaves = Decimal::from(days);
        let adjustment = BalanceAdjustment::new(
            &key(),
            AdjustmentType::InitialBalance,
            Decimal::ZERO,
            Decimal::from(days),
            date(),
            &Actor::System,
            "initial",
        );
        (balance, adjustment)
    }

    #[test]
    fn test_commit_inserts_row_and_assigns_sequence() {
        let store = InMemoryStore::new();
        let (balance, adjustment) = initial(10);

        let committed = store
            .commit(Changeset::new().with_balance(balance, None).with_adjustment(adjustment))
            .unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence, 1);
        let stored = store.balance(&key()).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.adjustments(&key()).unwrap(), committed);
    }

    #[test]
    fn test_stale_version_is_rejected_without_writes() {
        let store = InMemoryStore::new();
        let (balance, adjustment) = initial(10);
        store
            .commit(
                Changeset::new()
                    .with_balance(balance.clone(), None)
                    .with_adjustment(adjustment.clone()),
            )
            .unwrap();

        let result = store.commit(
            Changeset::new()
                .with_balance(balance, None)
                .with_adjustment(adjustment),
        );

        assert!(matches!(result, Err(LedgerError::Busy { .. })));
        assert_eq!(store.adjustment_count(), 1);
    }

    #[test]
    fn test_sequences_increase_across_keys() {
        let store = InMemoryStore::new();
        let (balance, adjustment) = initial(10);
        store
            .commit(Changeset::new().with_balance(balance, None).with_adjustment(adjustment))
            .unwrap();

        let other = BalanceKey::new("emp_002", "casual", 2025);
        let committed = store
            .commit(
                Changeset::new()
                    .with_balance(EmployeeLeaveBalance::new(&other), None)
                    .with_adjustment(BalanceAdjustment::new(
                        &other,
                        AdjustmentType::InitialBalance,
                        Decimal::ZERO,
                        Decimal::ZERO,
                        date(),
                        &Actor::System,
                        "initial",
                    )),
            )
            .unwrap();

        assert_eq!(committed[0].sequence, 2);
        assert_eq!(store.balances_for_year(2025).unwrap().len(), 2);
        assert!(store.balances_for_year(2024).unwrap().is_empty());
    }

    #[test]
    fn test_credits_are_upserted_by_id() {
        let store = InMemoryStore::new();
        let mut credit = CompOffCredit::new("emp_001", date(), Decimal::ONE, None);
        store.commit(Changeset::new().with_credits([credit.clone()])).unwrap();

        credit.expire();
        store.commit(Changeset::new().with_credits([credit.clone()])).unwrap();

        let credits = store.comp_off_credits("emp_001").unwrap();
        assert_eq!(credits, vec![credit]);
        assert!(store.comp_off_credits("emp_002").unwrap().is_empty());
    }

    #[test]
    fn test_latest_adjustment_filters_by_type() {
        let store = InMemoryStore::new();
        let (balance, adjustment) = initial(10);
        store
            .commit(Changeset::new().with_balance(balance, None).with_adjustment(adjustment))
            .unwrap();

        assert!(
            store
                .latest_adjustment(&key(), AdjustmentType::Accrual)
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store
                .latest_adjustment(&key(), AdjustmentType::InitialBalance)
                .unwrap()
                .map(|a| a.sequence),
            Some(1)
        );
    }

    #[test]
    fn test_empty_changeset() {
        assert!(Changeset::new().is_empty());
        assert!(InMemoryStore::new().commit(Changeset::new()).unwrap().is_empty());
    }
}
