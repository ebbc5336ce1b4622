//! Wire shape of a principal's permission table.
//!
//! The data-access collaborator answers with a map keyed by database name.
//! Each entry carries an optional `permission` string and an optional map of
//! collection name to permission string:
//!
//! ```json
//! {
//!   "*": { "permission": "ro" },
//!   "_system": {
//!     "permission": "rw",
//!     "collections": { "*": "undefined", "_users": "rw" }
//!   }
//! }
//! ```
//!
//! Levels stay raw strings here; they are parsed (and malformed ones caught)
//! when the DTO is flattened into a [`PermissionTable`](super::PermissionTable).
//! A database or collection name that appears twice in one object is a
//! decoding error.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionTableDto {
    #[serde(deserialize_with = "unique_keys")]
    pub databases: BTreeMap<String, DatabaseEntryDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntryDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(
        default,
        deserialize_with = "unique_keys",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub collections: BTreeMap<String, String>,
}

impl PermissionTableDto {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Builds a DTO from `(database, entry)` pairs in any order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, DatabaseEntryDto)>,
    {
        Self {
            databases: entries.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl DatabaseEntryDto {
    pub fn with_permission(permission: impl Into<String>) -> Self {
        Self {
            permission: Some(permission.into()),
            collections: BTreeMap::new(),
        }
    }

    pub fn collection(mut self, name: impl Into<String>, permission: impl Into<String>) -> Self {
        self.collections.insert(name.into(), permission.into());
        self
    }
}

/// Reads a JSON object into a map, failing on the first repeated key.
fn unique_keys<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueKeys<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeys<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map with unique names")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format_args!("duplicate name '{key}'")));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}
