//! Leave Balance Ledger
//!
//! This crate keeps per-employee, per-leave-type, per-year leave balances
//! and an append-only audit trail of every change to them. It grants
//! periodic accrual, consumes approved leave (optionally paying with
//! compensatory-off credits first), reverses cancelled leave, rolls
//! balances into a new year with capped carry-forward, and forfeits
//! carried days when they expire.
//!
//! # Example
//!
//! ```
//! use leave_ledger::config::ConfigLoader;
//! use leave_ledger::ledger::LeaveBalanceLedger;
//! use leave_ledger::models::Actor;
//! use rust_decimal::Decimal;
//!
//! let config = ConfigLoader::load("./config/default").unwrap().into_config();
//! let ledger = LeaveBalanceLedger::in_memory(config);
//! let admin = Actor::user("hr_admin");
//!
//! let outcome = ledger
//!     .set_initial_balance("emp_001", "casual", 2025, Decimal::from(10), &admin)
//!     .unwrap();
//! assert_eq!(outcome.snapshot.available_leaves, Decimal::from(10));
//! ```

#![warn(missing_docs)]

pub mod calculation;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
