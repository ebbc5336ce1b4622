//! Error types for permission table operations.
//!
//! All fallible public APIs return [`PermissionResult<T>`], an alias for
//! `Result<T, PermissionError>`. Errors coming back from the backing store are
//! reported as [`StoreError`] and wrapped by the operation that hit them, so a
//! caller can tell a failed load from a rejected write.
//!
//! # Error Handling Example
//!
//! ```
//! use permission_matrix::error::{PermissionError, PermissionResult, StoreError};
//! use permission_matrix::Principal;
//!
//! fn example_operation() -> PermissionResult<()> {
//!     Err(PermissionError::LoadFailure {
//!         principal: Principal::from("alice"),
//!         source: StoreError::NotFound("alice".to_string()),
//!     })
//! }
//!
//! match example_operation() {
//!     Err(err @ PermissionError::LoadFailure { .. }) => {
//!         assert_eq!(err.category(), "load");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::traits::permissions::{Principal, Scope};
use thiserror::Error;

/// Result type alias for permission engine operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// The main error type for the permission engine.
///
/// None of these are fatal: after any failure the engine stays usable for
/// further requests and other principals.
#[derive(Error, Debug)]
pub enum PermissionError {
    /// The permission table could not be fetched.
    ///
    /// No partial table is ever kept after this error.
    #[error("Failed to load permissions for '{principal}': {source}")]
    LoadFailure {
        principal: Principal,
        #[source]
        source: StoreError,
    },

    /// The store rejected a grant write or delete.
    ///
    /// The previously loaded table is left untouched.
    #[error("Failed to change {scope}: {source}")]
    WriteFailure {
        scope: Scope,
        #[source]
        source: StoreError,
    },

    /// An unrecognized permission string was received from the store.
    #[error(transparent)]
    MalformedLevel(#[from] MalformedLevel),

    /// A write or reload for this principal has been issued and not yet finished.
    #[error("A permission change for '{0}' is already in flight")]
    MutationInFlight(Principal),

    /// `confirm` was called with nothing awaiting confirmation.
    #[error("No permission change is awaiting confirmation")]
    NoPendingChange,

    /// The scope cannot be addressed (e.g. a wildcard database name).
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Configuration error (e.g. an empty protected database name)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The background task that carried a mutation died before reporting.
    #[error("Mutation task failed: {0}")]
    TaskFailed(String),

    /// Wraps JSON decoding errors for permission table payloads
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Wraps TOML decoding errors for engine configuration
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
}

impl PermissionError {
    /// Names the taxonomy bucket this error belongs to.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::LoadFailure { .. } | Self::JsonError(_) => "load",
            Self::WriteFailure { .. } => "write",
            Self::MalformedLevel(_) => "malformed_level",
            Self::MutationInFlight(_) | Self::NoPendingChange | Self::TaskFailed(_) => "session",
            Self::InvalidScope(_) => "scope",
            Self::Configuration(_) | Self::TomlDeError(_) => "configuration",
        }
    }
}

/// Errors reported by a [`GrantStore`](crate::traits::grant_store::GrantStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The principal (or the addressed resource) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller may not read or change this principal's grants.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request never produced an answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered but refused the change.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// A permission string that is not one of `rw`, `ro`, `none` or `undefined`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized permission level '{value}' at {location}")]
pub struct MalformedLevel {
    /// The raw string received.
    pub value: String,
    /// Where it was found, e.g. `database 'shop'`.
    pub location: String,
}
