//! The normalized permission table of one principal.
//!
//! A [`PermissionTable`] is materialized from a [`PermissionTableDto`] by a
//! full fetch and is never patched afterwards: every accepted change replaces
//! it wholesale with a freshly loaded one.
//!
//! Rows are kept in canonical order (wildcard row first, then names
//! ascending), so the table built from a DTO does not depend on the order the
//! store listed its entries in.

pub mod dto;

pub use dto::{DatabaseEntryDto, PermissionTableDto};

use crate::config::MalformedLevelPolicy;
use crate::error::{MalformedLevel, PermissionResult};
use crate::traits::permissions::{PermissionLevel, Principal, ResourceName, Scope};
use log::{trace, warn};
use std::collections::BTreeMap;

/// Stored level of one collection row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionGrant {
    pub collection: ResourceName,
    pub permission: PermissionLevel,
}

impl CollectionGrant {
    pub fn is_default_row(&self) -> bool {
        self.collection.is_default_row()
    }
}

/// Stored level of one database row plus its collection rows.
///
/// The wildcard database row is the server-wide default and never carries
/// collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseGrant {
    pub database: ResourceName,
    pub permission: PermissionLevel,
    collections: Vec<CollectionGrant>,
}

impl DatabaseGrant {
    pub fn new(database: ResourceName, permission: PermissionLevel) -> Self {
        Self {
            database,
            permission,
            collections: Vec::new(),
        }
    }

    pub fn is_default_row(&self) -> bool {
        self.database.is_default_row()
    }

    /// Collection rows, wildcard first.
    pub fn collections(&self) -> &[CollectionGrant] {
        &self.collections
    }

    /// Named collection rows only.
    pub fn named_collections(&self) -> impl Iterator<Item = &CollectionGrant> {
        self.collections.iter().filter(|grant| !grant.is_default_row())
    }

    /// Stored level of a collection row; `Undefined` when the row is absent.
    pub fn collection(&self, collection: &ResourceName) -> PermissionLevel {
        self.collections
            .binary_search_by(|grant| grant.collection.cmp(collection))
            .map(|index| self.collections[index].permission)
            .unwrap_or_default()
    }

    /// The collection-level default (`"*"` collection row).
    pub fn collection_default(&self) -> PermissionLevel {
        self.collection(&ResourceName::Wildcard)
    }
}

/// A principal's grants at server, database and collection scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    principal: Principal,
    databases: Vec<DatabaseGrant>,
    anomalies: Vec<MalformedLevel>,
}

impl PermissionTable {
    /// A table without any rows: every scope is `Undefined`.
    pub fn empty(principal: Principal) -> Self {
        Self {
            principal,
            databases: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    /// Flattens the store's nested map into a table.
    ///
    /// Only structure is checked. Unknown level strings are handled according
    /// to `policy`: rejected outright, or turned into `None` and recorded in
    /// [`anomalies`](Self::anomalies).
    pub fn from_dto(
        principal: Principal,
        dto: PermissionTableDto,
        policy: MalformedLevelPolicy,
    ) -> PermissionResult<Self> {
        let mut anomalies = Vec::new();
        let mut rows: BTreeMap<ResourceName, DatabaseGrant> = BTreeMap::new();

        for (raw_database, entry) in dto.databases {
            let database = ResourceName::from(raw_database);
            let permission = match entry.permission {
                Some(raw) => parse_level(
                    &raw,
                    || database_location(&database),
                    policy,
                    &mut anomalies,
                )?,
                None => PermissionLevel::Undefined,
            };

            let mut grant = DatabaseGrant::new(database.clone(), permission);
            if database.is_default_row() {
                if !entry.collections.is_empty() {
                    trace!(
                        "PermissionTable: ignoring {} collection rows on the server default",
                        entry.collections.len()
                    );
                }
            } else {
                let mut collections = BTreeMap::new();
                for (raw_collection, raw_level) in entry.collections {
                    let collection = ResourceName::from(raw_collection);
                    let level = parse_level(
                        &raw_level,
                        || format!("collection '{database}/{collection}'"),
                        policy,
                        &mut anomalies,
                    )?;
                    collections.insert(collection.clone(), CollectionGrant { collection, permission: level });
                }
                grant.collections = collections.into_values().collect();
            }
            rows.insert(database, grant);
        }

        Ok(Self {
            principal,
            databases: rows.into_values().collect(),
            anomalies,
        })
    }

    /// Parses a JSON payload and flattens it.
    pub fn from_json(
        principal: Principal,
        raw: &str,
        policy: MalformedLevelPolicy,
    ) -> PermissionResult<Self> {
        let dto = PermissionTableDto::from_json(raw)?;
        Self::from_dto(principal, dto, policy)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Malformed levels that were replaced by `None` under the fail-closed policy.
    pub fn anomalies(&self) -> &[MalformedLevel] {
        &self.anomalies
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// All rows, server default first.
    pub fn databases(&self) -> &[DatabaseGrant] {
        &self.databases
    }

    /// Rows of real databases, in name order.
    pub fn named_databases(&self) -> impl Iterator<Item = &DatabaseGrant> {
        self.databases.iter().filter(|grant| !grant.is_default_row())
    }

    fn row(&self, database: &ResourceName) -> Option<&DatabaseGrant> {
        self.databases
            .binary_search_by(|grant| grant.database.cmp(database))
            .ok()
            .map(|index| &self.databases[index])
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseGrant> {
        self.row(&ResourceName::from(name))
    }

    /// The server-wide default (`S`).
    pub fn server_default(&self) -> PermissionLevel {
        self.row(&ResourceName::Wildcard)
            .map(|grant| grant.permission)
            .unwrap_or_default()
    }

    /// Stored database-level permission (`D`) of `database`.
    pub fn database_default(&self, database: &str) -> PermissionLevel {
        self.database(database)
            .map(|grant| grant.permission)
            .unwrap_or_default()
    }

    /// Stored collection-level default (`C`) inside `database`.
    pub fn collection_default(&self, database: &str) -> PermissionLevel {
        self.database(database)
            .map(DatabaseGrant::collection_default)
            .unwrap_or_default()
    }

    /// Stored level of one collection row.
    pub fn collection(&self, database: &str, collection: &ResourceName) -> PermissionLevel {
        self.database(database)
            .map(|grant| grant.collection(collection))
            .unwrap_or_default()
    }

    /// The level explicitly stored at `scope`, `Undefined` if none.
    pub fn stored(&self, scope: &Scope) -> PermissionLevel {
        match scope {
            Scope::Server => self.server_default(),
            Scope::Database(database) => self.database_default(database),
            Scope::Collection {
                database,
                collection,
            } => self.collection(database, collection),
        }
    }
}

fn database_location(database: &ResourceName) -> String {
    if database.is_default_row() {
        "server default".to_string()
    } else {
        format!("database '{database}'")
    }
}

fn parse_level(
    raw: &str,
    location: impl FnOnce() -> String,
    policy: MalformedLevelPolicy,
    anomalies: &mut Vec<MalformedLevel>,
) -> Result<PermissionLevel, MalformedLevel> {
    if let Ok(level) = raw.parse::<PermissionLevel>() {
        return Ok(level);
    }
    let malformed = MalformedLevel {
        value: raw.to_string(),
        location: location(),
    };
    match policy {
        MalformedLevelPolicy::Reject => Err(malformed),
        MalformedLevelPolicy::FailClosed => {
            warn!(
                "PermissionTable: treating unrecognized level '{}' at {} as no access",
                malformed.value, malformed.location
            );
            anomalies.push(malformed);
            Ok(PermissionLevel::None)
        }
    }
}
