//! Core data models for the leave balance ledger.
//!
//! This module contains the balance rows, audit records and comp-off
//! credits the ledger reads and writes.

mod adjustment;
mod balance;
mod comp_off;

pub use adjustment::{
    Actor, AdjustmentType, BalanceAdjustment, ChainBreak, verify_chain,
};
pub use balance::{BalanceKey, BalanceSnapshot, EmployeeLeaveBalance};
pub use comp_off::{CompOffCredit, CompOffStatus, ConsumptionRecord};
