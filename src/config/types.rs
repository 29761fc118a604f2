//! Configuration types for the leave balance ledger.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files: the ledger's runtime
//! settings and the per-leave-type policies.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// How often an accruing leave type grants entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualFrequency {
    /// One tick on the first day of every month.
    Monthly,
    /// One tick on the first day of January, April, July and October.
    Quarterly,
    /// One tick on the first of January.
    Yearly,
}

impl AccrualFrequency {
    /// Length of one accrual period in months.
    pub fn months(self) -> u32 {
        match self {
            AccrualFrequency::Monthly => 1,
            AccrualFrequency::Quarterly => 3,
            AccrualFrequency::Yearly => 12,
        }
    }

    /// Returns the lowercase name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            AccrualFrequency::Monthly => "monthly",
            AccrualFrequency::Quarterly => "quarterly",
            AccrualFrequency::Yearly => "yearly",
        }
    }
}

/// The rules that govern one leave type.
///
/// Policies are immutable once loaded; the ledger reads them on every
/// operation but never writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveTypePolicy {
    /// Identifier used in balance keys.
    pub id: String,
    /// Short code (e.g. "EL").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Annual entitlement seeded into a new year at rollover.
    #[serde(default)]
    pub default_entitlement: Decimal,
    /// Whether entitlement grows by periodic accrual.
    #[serde(default)]
    pub accrual_enabled: bool,
    /// Accrual cadence; required when accrual is enabled.
    #[serde(default)]
    pub accrual_frequency: Option<AccrualFrequency>,
    /// Days granted per accrual tick.
    #[serde(default)]
    pub accrual_rate: Decimal,
    /// Cap on accumulated entitlement.
    #[serde(default)]
    pub max_accrual_limit: Option<Decimal>,
    /// Whether unused days move into the next year.
    #[serde(default)]
    pub allow_carry_forward: bool,
    /// Cap on carried-forward days.
    #[serde(default)]
    pub max_carry_forward: Option<Decimal>,
    /// Months after the start of the new year at which carried days expire.
    #[serde(default)]
    pub carry_forward_expiry_months: Option<u32>,
    /// Whether unused days can be encashed.
    #[serde(default)]
    pub allow_encashment: bool,
    /// Cap on days encashed per year.
    #[serde(default)]
    pub max_encashment_days: Option<Decimal>,
    /// Whether leave can be taken in half days.
    #[serde(default = "default_allow_half_day")]
    pub allow_half_day: bool,
    /// Whether this type represents compensatory-off credits.
    #[serde(default)]
    pub is_comp_off_type: bool,
}

fn default_allow_half_day() -> bool {
    true
}

impl LeaveTypePolicy {
    /// Checks the policy for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPolicy`] if:
    /// - the id is empty
    /// - any entitlement, rate or cap is negative
    /// - accrual is enabled without a frequency or with a non-positive rate
    pub fn validate(&self) -> LedgerResult<()> {
        if self.id.trim().is_empty() {
            return Err(self.invalid("id must not be empty"));
        }
        if self.default_entitlement < Decimal::ZERO {
            return Err(self.invalid("default_entitlement must not be negative"));
        }
        if self.accrual_rate < Decimal::ZERO {
            return Err(self.invalid("accrual_rate must not be negative"));
        }
        if self.accrual_enabled {
            if self.accrual_frequency.is_none() {
                return Err(self.invalid("accrual is enabled but accrual_frequency is not set"));
            }
            if self.accrual_rate <= Decimal::ZERO {
                return Err(self.invalid("accrual is enabled but accrual_rate is not positive"));
            }
        }
        let caps = [
            ("max_accrual_limit", self.max_accrual_limit),
            ("max_carry_forward", self.max_carry_forward),
            ("max_encashment_days", self.max_encashment_days),
        ];
        for (field, cap) in caps {
            if cap.is_some_and(|c| c < Decimal::ZERO) {
                return Err(self.invalid(format!("{} must not be negative", field)));
            }
        }
        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> LedgerError {
        LedgerError::InvalidPolicy {
            leave_type: if self.id.is_empty() {
                self.code.clone()
            } else {
                self.id.clone()
            },
            message: message.into(),
        }
    }
}

/// Runtime settings from `ledger.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// How long an operation waits for a contended key before failing with `Busy`.
    pub lock_timeout_ms: u64,
    /// Validity of a comp-off credit, counted from the day it was earned.
    pub comp_off_validity_months: u32,
    /// Look-ahead used by the expiring carry-forward report.
    pub expiring_window_days: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 250,
            comp_off_validity_months: 3,
            expiring_window_days: 30,
        }
    }
}

impl LedgerSettings {
    /// The lock timeout as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Structure of `leave_types.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveTypesConfig {
    /// All configured leave types.
    pub leave_types: Vec<LeaveTypePolicy>,
}

/// Validated leave type policies indexed by id.
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    policies: HashMap<String, LeaveTypePolicy>,
}

impl PolicyCatalog {
    /// Builds a catalog, validating every policy.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPolicy`] if any policy is inconsistent
    /// or two policies share an id.
    pub fn new(policies: Vec<LeaveTypePolicy>) -> LedgerResult<Self> {
        let mut by_id = HashMap::with_capacity(policies.len());
        for policy in policies {
            policy.validate()?;
            if by_id.contains_key(&policy.id) {
                return Err(LedgerError::InvalidPolicy {
                    leave_type: policy.id.clone(),
                    message: "duplicate leave type id".to_string(),
                });
            }
            by_id.insert(policy.id.clone(), policy);
        }
        Ok(Self { policies: by_id })
    }

    /// Looks up a policy by leave type id.
    pub fn get(&self, leave_type_id: &str) -> LedgerResult<&LeaveTypePolicy> {
        self.policies
            .get(leave_type_id)
            .ok_or_else(|| LedgerError::not_found("leave type", leave_type_id))
    }

    /// Iterates over all policies in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &LeaveTypePolicy> {
        self.policies.values()
    }

    /// Number of configured leave types.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true if no leave types are configured.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// The complete ledger configuration.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    settings: LedgerSettings,
    policies: PolicyCatalog,
}

impl LedgerConfig {
    /// Creates a configuration from its component parts.
    pub fn new(settings: LedgerSettings, policies: PolicyCatalog) -> Self {
        Self { settings, policies }
    }

    /// Returns the runtime settings.
    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Returns the leave type policies.
    pub fn policies(&self) -> &PolicyCatalog {
        &self.policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn earned_leave() -> LeaveTypePolicy {
        LeaveTypePolicy {
            id: "earned".to_string(),
            code: "EL".to_string(),
            name: "Earned Leave".to_string(),
            default_entitlement: dec("12"),
            accrual_enabled: true,
            accrual_frequency: Some(AccrualFrequency::Monthly),
            accrual_rate: dec("1.75"),
            max_accrual_limit: Some(dec("21")),
            allow_carry_forward: true,
            max_carry_forward: Some(dec("15")),
            carry_forward_expiry_months: Some(3),
            allow_encashment: true,
            max_encashment_days: Some(dec("15")),
            allow_half_day: true,
            is_comp_off_type: false,
        }
    }

    #[test]
    fn test_valid_policy_passes() {
        assert!(earned_leave().validate().is_ok());
    }

    #[test]
    fn test_negative_carry_forward_cap_is_invalid() {
        let mut policy = earned_leave();
        policy.max_carry_forward = Some(dec("-1"));

        match policy.validate() {
            Err(LedgerError::InvalidPolicy {
                leave_type,
                message,
            }) => {
                assert_eq!(leave_type, "earned");
                assert!(message.contains("max_carry_forward"));
            }
            other => panic!("Expected InvalidPolicy, got {:?}", other),
        }
    }

    #[test]
    fn test_accrual_without_frequency_is_invalid() {
        let mut policy = earned_leave();
        policy.accrual_frequency = None;
        assert!(matches!(
            policy.validate(),
            Err(LedgerError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_accrual_with_zero_rate_is_invalid() {
        let mut policy = earned_leave();
        policy.accrual_rate = Decimal::ZERO;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_disabled_accrual_may_omit_frequency() {
        let mut policy = earned_leave();
        policy.accrual_enabled = false;
        policy.accrual_frequency = None;
        policy.accrual_rate = Decimal::ZERO;
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_catalog_rejects_duplicate_ids() {
        let result = PolicyCatalog::new(vec![earned_leave(), earned_leave()]);
        assert!(matches!(result, Err(LedgerError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_catalog_lookup_unknown_returns_not_found() {
        let catalog = PolicyCatalog::new(vec![earned_leave()]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("earned").is_ok());
        assert!(matches!(
            catalog.get("sick"),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_policy_defaults_from_yaml() {
        let yaml = r#"
id: bereavement
code: BL
name: Bereavement Leave
default_entitlement: "5"
"#;
        let policy: LeaveTypePolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.default_entitlement, dec("5"));
        assert!(!policy.accrual_enabled);
        assert!(policy.accrual_frequency.is_none());
        assert!(policy.allow_half_day);
        assert!(!policy.is_comp_off_type);
    }

    #[test]
    fn test_settings_defaults() {
        let settings: LedgerSettings = serde_yaml::from_str("lock_timeout_ms: 50").unwrap();
        assert_eq!(settings.lock_timeout(), Duration::from_millis(50));
        assert_eq!(settings.comp_off_validity_months, 3);
        assert_eq!(settings.expiring_window_days, 30);
    }

    #[test]
    fn test_frequency_months() {
        assert_eq!(AccrualFrequency::Monthly.months(), 1);
        assert_eq!(AccrualFrequency::Quarterly.months(), 3);
        assert_eq!(AccrualFrequency::Yearly.months(), 12);
        assert_eq!(
            serde_yaml::from_str::<AccrualFrequency>("quarterly").unwrap(),
            AccrualFrequency::Quarterly
        );
    }
}
