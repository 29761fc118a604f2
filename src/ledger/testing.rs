//! Fixtures shared by the ledger's unit tests.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{ConfigLoader, LedgerSettings};
use crate::models::{Actor, BalanceKey};

use super::requests::LeaveConsumption;
use super::service::LeaveBalanceLedger;

pub(super) fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(super) fn admin() -> Actor {
    Actor::user("hr_admin")
}

pub(super) fn ledger() -> LeaveBalanceLedger {
    let config = ConfigLoader::load("./config/default")
        .expect("Failed to load config")
        .into_config();
    LeaveBalanceLedger::in_memory(config)
}

pub(super) fn ledger_with_timeout(lock_timeout_ms: u64) -> LeaveBalanceLedger {
    let loader = ConfigLoader::load("./config/default").expect("Failed to load config");
    let policies = loader.config().policies().iter().cloned().collect();
    let settings = LedgerSettings {
        lock_timeout_ms,
        ..LedgerSettings::default()
    };
    LeaveBalanceLedger::in_memory(ConfigLoader::from_parts(settings, policies).unwrap().into_config())
}

pub(super) fn annual(year: i32) -> BalanceKey {
    BalanceKey::new("emp_001", "annual", year)
}

/// A leave request for emp_001 dated 10 February 2025.
pub(super) fn leave(
    leave_type_id: &str,
    days: &str,
    use_comp_off: bool,
    request_id: &str,
) -> LeaveConsumption {
    LeaveConsumption {
        employee_id: "emp_001".to_string(),
        leave_type_id: leave_type_id.to_string(),
        days: dec(days),
        use_comp_off,
        leave_request_id: request_id.to_string(),
        leave_date: date(2025, 2, 10),
    }
}

/// Rolls a 12-day annual balance from 2024 into 2025, carrying 5 days that
/// expire on 1 April 2025.
pub(super) fn ledger_with_carry_forward() -> LeaveBalanceLedger {
    let ledger = ledger();
    ledger
        .set_initial_balance("emp_001", "annual", 2024, dec("12"), &admin())
        .unwrap();
    ledger
        .rollover_year("emp_001", "annual", 2024, 2025, &Actor::System)
        .unwrap();
    ledger
}
