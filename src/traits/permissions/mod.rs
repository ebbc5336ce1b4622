// Permission vocabulary shared by the table model, resolution and mutation layers

pub mod level;
pub mod scope;

pub use level::{GrantLevel, LevelChoice, PermissionLevel};
pub use scope::{Principal, ResourceName, Scope};
