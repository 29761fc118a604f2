//! Configuration loading and management for the leave balance ledger.
//!
//! This module loads the ledger's runtime settings and leave type policies
//! from YAML files and validates the policies before the ledger uses them.
//!
//! # Example
//!
//! ```no_run
//! use leave_ledger::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Lock timeout: {:?}", config.settings().lock_timeout());
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AccrualFrequency, LeaveTypePolicy, LeaveTypesConfig, LedgerConfig, LedgerSettings,
    PolicyCatalog,
};
