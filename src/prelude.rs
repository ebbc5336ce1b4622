//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```
//! use permission_matrix::prelude::*;
//!
//! let table = PermissionTable::empty(Principal::from("alice"));
//! let view = PermissionView::build(&table);
//! assert_eq!(view.server.effective, PermissionLevel::Undefined);
//! ```
//!
//! # What's Included
//!
//! ## Levels and addressing
//!
//! - [`PermissionLevel`], [`GrantLevel`], [`LevelChoice`]
//! - [`Principal`], [`ResourceName`], [`Scope`]
//!
//! ## Tables and resolution
//!
//! - [`PermissionTable`]: A principal's grants as loaded from the store
//! - [`PermissionView`] / [`CellView`]: Effective levels and default badges per cell
//!
//! ## Editing
//!
//! - [`PermissionEditor`]: Gate, mutation lane and current table for one principal
//! - [`GrantStore`]: The store boundary, with [`MemoryGrantStore`] as an in-memory implementation
//!

pub use crate::config::{EngineConfig, MalformedLevelPolicy};
pub use crate::databases::MemoryGrantStore;
pub use crate::error::{PermissionError, PermissionResult, StoreError};
pub use crate::gate::{ChangeRequest, GateDecision, GateState, SensitiveChangeGate};
pub use crate::mutation::{MutationCommand, MutationProtocol};
pub use crate::resolution::{CellView, DatabaseView, PermissionView};
pub use crate::session::{ChangeOutcome, PermissionEditor};
pub use crate::table::PermissionTable;
pub use crate::table::dto::PermissionTableDto;
pub use crate::traits::{
    GrantLevel, GrantStore, LevelChoice, PermissionLevel, Principal, ResourceName, Scope,
};
