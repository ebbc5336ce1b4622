use crate::error::{PermissionError, PermissionResult};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The user whose grants are being viewed or edited.
///
/// Passed explicitly to every engine call; there is no ambient current user.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Name of a database or collection row.
///
/// The wire sentinel `"*"` becomes [`ResourceName::Wildcard`], which marks a
/// default row rather than a real resource. Wildcards sort before names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum ResourceName {
    #[display("*")]
    Wildcard,
    #[display("{_0}")]
    Named(String),
}

impl ResourceName {
    pub const WILDCARD: &'static str = "*";

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// True for the `"*"` default rows.
    pub const fn is_default_row(&self) -> bool {
        matches!(self, ResourceName::Wildcard)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceName::Wildcard => Self::WILDCARD,
            ResourceName::Named(name) => name,
        }
    }
}

impl From<&str> for ResourceName {
    fn from(raw: &str) -> Self {
        if raw == Self::WILDCARD {
            ResourceName::Wildcard
        } else {
            ResourceName::Named(raw.to_string())
        }
    }
}

impl From<String> for ResourceName {
    fn from(raw: String) -> Self {
        if raw == Self::WILDCARD {
            ResourceName::Wildcard
        } else {
            ResourceName::Named(raw)
        }
    }
}

impl FromStr for ResourceName {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(ResourceName::from(raw))
    }
}

/// Where a grant is written or cleared.
///
/// Store addresses map as: `Server` → (`*`, none), `Database(d)` → (`d`, none),
/// `Collection { d, c }` → (`d`, `c`). A wildcard collection addresses the
/// collection-level default of that database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum Scope {
    #[display("server default")]
    Server,
    #[display("database '{_0}'")]
    Database(String),
    #[display("collection '{database}/{collection}'")]
    Collection {
        database: String,
        collection: ResourceName,
    },
}

impl Scope {
    pub fn database(name: impl Into<String>) -> Self {
        Scope::Database(name.into())
    }

    pub fn collection(database: impl Into<String>, collection: impl Into<ResourceName>) -> Self {
        Scope::Collection {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// The collection-level default (`"*"` collection) of `database`.
    pub fn collection_default(database: impl Into<String>) -> Self {
        Scope::Collection {
            database: database.into(),
            collection: ResourceName::Wildcard,
        }
    }

    /// Builds a scope from a raw store address.
    pub fn from_address(
        database: ResourceName,
        collection: Option<ResourceName>,
    ) -> PermissionResult<Self> {
        let scope = match (database, collection) {
            (ResourceName::Wildcard, None) => Scope::Server,
            (ResourceName::Wildcard, Some(collection)) => {
                return Err(PermissionError::InvalidScope(format!(
                    "the server default row has no collections (got '{collection}')"
                )));
            }
            (ResourceName::Named(database), None) => Scope::Database(database),
            (ResourceName::Named(database), Some(collection)) => Scope::Collection {
                database,
                collection,
            },
        };
        scope.validate()?;
        Ok(scope)
    }

    /// Rejects scopes that cannot be addressed in the store.
    pub fn validate(&self) -> PermissionResult<()> {
        let database = match self {
            Scope::Server => return Ok(()),
            Scope::Database(database) => database,
            Scope::Collection {
                database,
                collection,
            } => {
                if let ResourceName::Named(name) = collection {
                    if name.is_empty() || name == ResourceName::WILDCARD {
                        return Err(PermissionError::InvalidScope(format!(
                            "bad collection name '{name}'"
                        )));
                    }
                }
                database
            }
        };
        if database.is_empty() || database == ResourceName::WILDCARD {
            return Err(PermissionError::InvalidScope(format!(
                "bad database name '{database}'; use Scope::Server for the server default"
            )));
        }
        Ok(())
    }

    /// The database this scope lives in, `None` for the server default.
    pub fn database_name(&self) -> Option<&str> {
        match self {
            Scope::Server => None,
            Scope::Database(database) | Scope::Collection { database, .. } => Some(database),
        }
    }

    /// The `(database, collection)` pair used by store calls.
    pub fn address(&self) -> (ResourceName, Option<ResourceName>) {
        match self {
            Scope::Server => (ResourceName::Wildcard, None),
            Scope::Database(database) => (ResourceName::named(database.clone()), None),
            Scope::Collection {
                database,
                collection,
            } => (
                ResourceName::named(database.clone()),
                Some(collection.clone()),
            ),
        }
    }

    pub const fn is_collection(&self) -> bool {
        matches!(self, Scope::Collection { .. })
    }
}
