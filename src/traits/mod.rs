pub mod grant_store;
pub mod permissions;

// Re-export commonly used types
pub use grant_store::GrantStore;
pub use permissions::{GrantLevel, LevelChoice, PermissionLevel, Principal, ResourceName, Scope};
