//! # Permission Matrix
//!
//! Loads a principal's database and collection grants, resolves the effective
//! access level of every cell of the matrix, and applies changes through a
//! confirmation gate with a reload after every write.
//!
//! ## Features
//!
//! - **Three scopes**: server default (`*`), database, and collection, with
//!   a `*` default-collection row per database
//! - **Resolution**: effective levels and "default" badges computed from the
//!   loaded table alone
//! - **Gated changes**: edits to protected databases wait for confirmation
//! - **No local patching**: every successful write is followed by a full reload
//!
//! ## Quick Start
//!
//! ```
//! use permission_matrix::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryGrantStore::new().with_principal("alice"));
//! let editor = PermissionEditor::new(store, "alice", EngineConfig::default()).unwrap();
//!
//! editor.load().await.unwrap();
//! editor
//!     .request_change(Scope::database("shop"), LevelChoice::ReadWrite)
//!     .await
//!     .unwrap();
//!
//! let view = editor.view().await.unwrap();
//! assert!(view.cell("shop", None).unwrap().is_read_write);
//! # }
//! ```

pub mod config;
pub mod databases;
pub mod error;
pub mod gate;
pub mod mutation;
pub mod prelude;
pub mod resolution;
pub mod session;
pub mod table;
pub mod traits;

pub use error::{PermissionError, PermissionResult, StoreError};
pub use table::PermissionTable;
pub use traits::permissions::{
    GrantLevel, LevelChoice, PermissionLevel, Principal, ResourceName, Scope,
};
