//! Pure balance calculations.
//!
//! This module contains the side-effect-free rules the ledger applies:
//! accrual period counting and capping, year-end carry-forward and its
//! expiry, FIFO comp-off allocation, and encashment eligibility. Nothing
//! here reads or writes ledger state.

mod accrual;
mod carry_forward;
mod comp_off_allocation;
mod encashment;

pub use accrual::{AccrualComputation, compute_accrual, initial_anchor, periods_elapsed};
pub use carry_forward::{
    CarryForward, compute_carry_forward, forfeitable_carry_forward, revived_carry_forward,
    year_start,
};
pub use comp_off_allocation::{CompOffAllocation, allocate_comp_off};
pub use encashment::{EncashmentEligibility, encashment_eligibility};
