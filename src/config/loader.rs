//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the ledger
//! configuration from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};

use super::types::{
    LeaveTypePolicy, LeaveTypesConfig, LedgerConfig, LedgerSettings, PolicyCatalog,
};

/// Loads and provides access to ledger configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory,
/// validates every leave type policy, and provides lookup methods.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── ledger.yaml       # Lock timeout, comp-off validity, report window
/// └── leave_types.yaml  # Leave type policies
/// ```
///
/// # Example
///
/// ```no_run
/// use leave_ledger::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// let policy = loader.get_policy("earned").unwrap();
/// println!("{} accrues {} days per tick", policy.name, policy.accrual_rate);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: LedgerConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - Either file is missing (`ConfigNotFound`)
    /// - Either file contains invalid YAML (`ConfigParse`)
    /// - A leave type policy is inconsistent (`InvalidPolicy`)
    pub fn load<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<LedgerSettings>(&path.join("ledger.yaml"))?;
        let leave_types = Self::load_yaml::<LeaveTypesConfig>(&path.join("leave_types.yaml"))?;

        Self::from_parts(settings, leave_types.leave_types)
    }

    /// Builds a loader from in-memory settings and policies.
    ///
    /// Policies go through the same validation as when loaded from disk.
    pub fn from_parts(
        settings: LedgerSettings,
        policies: Vec<LeaveTypePolicy>,
    ) -> LedgerResult<Self> {
        let catalog = PolicyCatalog::new(policies)?;
        Ok(Self {
            config: LedgerConfig::new(settings, catalog),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> LedgerResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| LedgerError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| LedgerError::ConfigParse {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the underlying ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> LedgerConfig {
        self.config
    }

    /// Returns the runtime settings.
    pub fn settings(&self) -> &LedgerSettings {
        self.config.settings()
    }

    /// Gets a leave type policy by id.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use leave_ledger::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::load("./config/default")?;
    /// let policy = loader.get_policy("casual")?;
    /// assert_eq!(policy.code, "CL");
    /// # Ok::<(), leave_ledger::error::LedgerError>(())
    /// ```
    pub fn get_policy(&self, leave_type_id: &str) -> LedgerResult<&LeaveTypePolicy> {
        self.config.policies().get(leave_type_id)
    }
}
