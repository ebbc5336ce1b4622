//! Engine configuration.
//!
//! Built with `typed-builder`, or read from TOML:
//!
//! ```toml
//! protected_databases = ["_system", "audit"]
//! gate_protected_collections = true
//! malformed_levels = "fail_closed"
//! ```

use crate::error::{PermissionError, PermissionResult};
use crate::traits::permissions::{ResourceName, Scope};
use serde::Deserialize;
use typed_builder::TypedBuilder;

/// The primary database whose permission changes need confirmation.
pub const SYSTEM_DATABASE: &str = "_system";

/// What to do with a permission string the engine does not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedLevelPolicy {
    /// Fail the whole load; no partial table is produced.
    #[default]
    Reject,
    /// Treat the cell as explicit no-access and record the anomaly on the table.
    FailClosed,
}

/// Configuration for the permission engine.
///
/// # Examples
///
/// ```
/// use permission_matrix::config::{EngineConfig, MalformedLevelPolicy};
///
/// let config = EngineConfig::builder()
///     .protected_databases(vec!["_system".to_string(), "audit".to_string()])
///     .malformed_levels(MalformedLevelPolicy::FailClosed)
///     .build();
///
/// assert!(config.is_protected_database("audit"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Deserialize)]
#[builder(doc)]
#[serde(default)]
pub struct EngineConfig {
    /// Databases whose changes go through the confirmation gate
    #[builder(default = vec![SYSTEM_DATABASE.to_string()])]
    pub protected_databases: Vec<String>,

    /// Also gate collection-level changes inside a protected database
    #[builder(default = false)]
    pub gate_protected_collections: bool,

    /// Handling of unrecognized permission strings during load
    #[builder(default)]
    pub malformed_levels: MalformedLevelPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protected_databases: vec![SYSTEM_DATABASE.to_string()],
            gate_protected_collections: false,
            malformed_levels: MalformedLevelPolicy::Reject,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(raw: &str) -> PermissionResult<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PermissionResult<()> {
        for name in &self.protected_databases {
            if name.is_empty() || name == ResourceName::WILDCARD {
                return Err(PermissionError::Configuration(format!(
                    "'{name}' is not a valid protected database name"
                )));
            }
        }
        Ok(())
    }

    pub fn is_protected_database(&self, database: &str) -> bool {
        self.protected_databases.iter().any(|name| name == database)
    }

    /// Whether a change at `scope` must wait for confirmation.
    pub fn requires_confirmation(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Server => false,
            Scope::Database(database) => self.is_protected_database(database),
            Scope::Collection { database, .. } => {
                self.gate_protected_collections && self.is_protected_database(database)
            }
        }
    }
}
