use crate::error::MalformedLevel;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Access level recorded for one scope of a permission table.
///
/// Variants are declared in ascending precedence, so the derived `Ord` gives
/// `ReadWrite > ReadOnly > None > Undefined`. The order is only used to break
/// ties while resolving inherited levels.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
pub enum PermissionLevel {
    /// No explicit grant at this scope; the value is inherited.
    #[default]
    #[strum(serialize = "undefined")]
    #[serde(rename = "undefined")]
    Undefined,
    /// Explicitly no access
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    /// Resource can only be read
    #[strum(serialize = "ro")]
    #[serde(rename = "ro")]
    ReadOnly,
    /// Resource can be read and written
    #[strum(serialize = "rw")]
    #[serde(rename = "rw")]
    ReadWrite,
}

impl PermissionLevel {
    /// Parses a wire spelling, rejecting anything unknown.
    ///
    /// `location` only feeds the error message.
    pub fn parse(raw: &str, location: impl Into<String>) -> Result<Self, MalformedLevel> {
        raw.parse().map_err(|_| MalformedLevel {
            value: raw.to_string(),
            location: location.into(),
        })
    }

    /// Check if this level allows writes
    pub const fn allows_write(&self) -> bool {
        matches!(self, PermissionLevel::ReadWrite)
    }

    /// Check if this level allows reads
    pub const fn allows_read(&self) -> bool {
        matches!(self, PermissionLevel::ReadOnly | PermissionLevel::ReadWrite)
    }

    pub const fn is_undefined(&self) -> bool {
        matches!(self, PermissionLevel::Undefined)
    }

    /// The explicit grant this level stands for, if any.
    pub const fn explicit(&self) -> Option<GrantLevel> {
        match self {
            PermissionLevel::ReadWrite => Some(GrantLevel::ReadWrite),
            PermissionLevel::ReadOnly => Some(GrantLevel::ReadOnly),
            PermissionLevel::None => Some(GrantLevel::None),
            PermissionLevel::Undefined => Option::None,
        }
    }

    /// Most permissive of `levels`; `Undefined` when empty or all undefined.
    pub fn most_permissive<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = PermissionLevel>,
    {
        levels.into_iter().max().unwrap_or_default()
    }
}

/// A level that can actually be written to the store.
///
/// `Undefined` is deliberately absent: reverting to inherited is a delete.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
pub enum GrantLevel {
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    #[strum(serialize = "ro")]
    #[serde(rename = "ro")]
    ReadOnly,
    #[strum(serialize = "rw")]
    #[serde(rename = "rw")]
    ReadWrite,
}

impl From<GrantLevel> for PermissionLevel {
    fn from(level: GrantLevel) -> Self {
        match level {
            GrantLevel::None => PermissionLevel::None,
            GrantLevel::ReadOnly => PermissionLevel::ReadOnly,
            GrantLevel::ReadWrite => PermissionLevel::ReadWrite,
        }
    }
}

/// One option of the exclusive choice offered for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
pub enum LevelChoice {
    #[strum(serialize = "rw")]
    ReadWrite,
    #[strum(serialize = "ro")]
    ReadOnly,
    #[strum(serialize = "none")]
    None,
    #[strum(serialize = "default")]
    UseDefault,
}

impl LevelChoice {
    /// The grant to write, or `None` when the choice means "clear".
    pub const fn grant(&self) -> Option<GrantLevel> {
        match self {
            LevelChoice::ReadWrite => Some(GrantLevel::ReadWrite),
            LevelChoice::ReadOnly => Some(GrantLevel::ReadOnly),
            LevelChoice::None => Some(GrantLevel::None),
            LevelChoice::UseDefault => Option::None,
        }
    }

    /// The level a cell shows when this slot carries the effective value.
    pub const fn level(&self) -> PermissionLevel {
        match self {
            LevelChoice::ReadWrite => PermissionLevel::ReadWrite,
            LevelChoice::ReadOnly => PermissionLevel::ReadOnly,
            LevelChoice::None => PermissionLevel::None,
            LevelChoice::UseDefault => PermissionLevel::Undefined,
        }
    }
}

impl From<PermissionLevel> for LevelChoice {
    fn from(level: PermissionLevel) -> Self {
        match level {
            PermissionLevel::ReadWrite => LevelChoice::ReadWrite,
            PermissionLevel::ReadOnly => LevelChoice::ReadOnly,
            PermissionLevel::None => LevelChoice::None,
            PermissionLevel::Undefined => LevelChoice::UseDefault,
        }
    }
}

impl From<GrantLevel> for LevelChoice {
    fn from(level: GrantLevel) -> Self {
        LevelChoice::from(PermissionLevel::from(level))
    }
}
