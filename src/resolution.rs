//! Effective permission resolution.
//!
//! Three scopes feed every cell:
//!
//! - `S`: the server-wide default (wildcard database row)
//! - `D`: the database-level permission of the target database
//! - `C`: the collection-level default (wildcard collection row) of that database
//!
//! Precedence is "most permissive explicit grant wins". An explicit `None` at
//! a narrower scope never blocks a more permissive grant at a broader one, and
//! at the collection-default scope an explicit `None` counts the same as
//! `Undefined`. This is not closest-scope-wins.
//!
//! The functions here are pure; [`PermissionView`] packages their results as
//! the read model handed to presentation.

use crate::table::PermissionTable;
use crate::traits::permissions::{LevelChoice, PermissionLevel, Principal, ResourceName, Scope};
use log::trace;

/// Inherited level of a collection that has no grant of its own.
///
/// ```
/// use permission_matrix::resolution::resolve_collection;
/// use permission_matrix::PermissionLevel::*;
///
/// assert_eq!(resolve_collection(ReadOnly, Undefined, Undefined), ReadOnly);
/// assert_eq!(resolve_collection(ReadWrite, None, None), ReadWrite);
/// assert_eq!(resolve_collection(Undefined, None, None), None);
/// ```
pub fn resolve_collection(
    server: PermissionLevel,
    database: PermissionLevel,
    collection_default: PermissionLevel,
) -> PermissionLevel {
    use PermissionLevel::{ReadOnly, ReadWrite, Undefined};

    // Nothing below the server overrides it: propagate.
    if database == Undefined && collection_default == Undefined && server != Undefined {
        return server;
    }

    match collection_default {
        // The collection scope has not positively granted anything, so only
        // the database and server scopes compete.
        Undefined | PermissionLevel::None => PermissionLevel::most_permissive([server, database]),
        // A positive collection default joins the competition. Since it is
        // itself ReadWrite or ReadOnly, the result is never weaker than it.
        ReadWrite | ReadOnly => {
            PermissionLevel::most_permissive([server, database, collection_default])
        }
    }
}

/// Effective level of a database row, i.e. the collection rule restricted to
/// the server and database scopes.
pub fn resolve_database(server: PermissionLevel, database: PermissionLevel) -> PermissionLevel {
    resolve_collection(server, database, PermissionLevel::Undefined)
}

/// The enclosing scope values of one target, read from a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeChain {
    pub server: PermissionLevel,
    pub database: PermissionLevel,
    pub collection_default: PermissionLevel,
}

impl ScopeChain {
    /// Chain for the collections of `database`.
    pub fn for_collection(table: &PermissionTable, database: &str) -> Self {
        Self {
            server: table.server_default(),
            database: table.database_default(database),
            collection_default: table.collection_default(database),
        }
    }

    /// Chain for the database row itself; the collection default plays no part.
    pub fn for_database(table: &PermissionTable, database: &str) -> Self {
        Self {
            server: table.server_default(),
            database: table.database_default(database),
            collection_default: PermissionLevel::Undefined,
        }
    }

    pub fn resolve(&self) -> PermissionLevel {
        resolve_collection(self.server, self.database, self.collection_default)
    }
}

/// Presentation state of one (database, collection) cell.
///
/// The four `is_*` booleans drive an exclusive choice control and reflect the
/// stored value only. `is_inherited_default` marks a cell whose own stored
/// value is `Undefined`; [`shows_default_badge`](Self::shows_default_badge)
/// tells which slot carries the "Default" badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellView {
    pub database: ResourceName,
    pub collection: Option<ResourceName>,
    pub stored: PermissionLevel,
    /// Level in force after inheritance.
    pub effective: PermissionLevel,
    /// Level the cell would fall back to if cleared; `None` for wildcard rows,
    /// which are never resolved further.
    pub inherited: Option<PermissionLevel>,
    pub is_read_write: bool,
    pub is_read_only: bool,
    pub is_none: bool,
    pub is_using_default: bool,
    pub is_inherited_default: bool,
}

impl CellView {
    fn new(
        database: ResourceName,
        collection: Option<ResourceName>,
        stored: PermissionLevel,
        effective: PermissionLevel,
        inherited: Option<PermissionLevel>,
    ) -> Self {
        Self {
            database,
            collection,
            stored,
            effective,
            inherited,
            is_read_write: stored == PermissionLevel::ReadWrite,
            is_read_only: stored == PermissionLevel::ReadOnly,
            is_none: stored == PermissionLevel::None,
            is_using_default: stored.is_undefined(),
            is_inherited_default: stored.is_undefined(),
        }
    }

    /// A wildcard row renders its literal stored value.
    fn literal(database: ResourceName, collection: Option<ResourceName>, stored: PermissionLevel) -> Self {
        Self::new(database, collection, stored, stored, None)
    }

    /// The option currently selected in the choice control.
    pub fn selected_choice(&self) -> LevelChoice {
        LevelChoice::from(self.stored)
    }

    /// Whether `choice`'s slot shows the "Default" badge.
    pub fn shows_default_badge(&self, choice: LevelChoice) -> bool {
        self.is_inherited_default
            && choice != LevelChoice::UseDefault
            && self.inherited == Some(choice.level())
    }

    pub fn is_default_row(&self) -> bool {
        match &self.collection {
            Some(collection) => collection.is_default_row(),
            None => self.database.is_default_row(),
        }
    }

    /// The scope a change to this cell addresses.
    pub fn scope(&self) -> Scope {
        match (&self.database, &self.collection) {
            (ResourceName::Wildcard, _) => Scope::Server,
            (ResourceName::Named(database), None) => Scope::Database(database.clone()),
            (ResourceName::Named(database), Some(collection)) => Scope::Collection {
                database: database.clone(),
                collection: collection.clone(),
            },
        }
    }
}

/// Cell of the server default row.
pub fn server_cell(table: &PermissionTable) -> CellView {
    CellView::literal(ResourceName::Wildcard, None, table.server_default())
}

/// Cell of a database row.
pub fn database_cell(table: &PermissionTable, database: &str) -> CellView {
    let chain = ScopeChain::for_database(table, database);
    let inherited = resolve_database(chain.server, PermissionLevel::Undefined);
    let effective = chain.resolve();
    trace!(
        "resolve database '{}': S={} D={} -> {}",
        database, chain.server, chain.database, effective
    );
    CellView::new(
        ResourceName::named(database),
        None,
        chain.database,
        effective,
        Some(inherited),
    )
}

/// Cell of a collection row; works for collections the table does not list.
pub fn collection_cell(table: &PermissionTable, database: &str, collection: &ResourceName) -> CellView {
    let stored = table.collection(database, collection);
    if collection.is_default_row() {
        return CellView::literal(ResourceName::named(database), Some(ResourceName::Wildcard), stored);
    }

    let chain = ScopeChain::for_collection(table, database);
    let inherited = chain.resolve();
    // An explicit collection grant is exact; only an undefined one inherits.
    let effective = if stored.is_undefined() { inherited } else { stored };
    trace!(
        "resolve collection '{}/{}': S={} D={} C={} own={} -> {}",
        database, collection, chain.server, chain.database, chain.collection_default, stored, effective
    );
    CellView::new(
        ResourceName::named(database),
        Some(collection.clone()),
        stored,
        effective,
        Some(inherited),
    )
}

/// Effective level of a database (`collection = None`) or a collection.
pub fn effective_level(
    table: &PermissionTable,
    database: &str,
    collection: Option<&ResourceName>,
) -> PermissionLevel {
    match collection {
        Some(collection) => collection_cell(table, database, collection).effective,
        None => database_cell(table, database).effective,
    }
}

/// Read model of one database: its own row, its collection default row and
/// its named collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseView {
    pub cell: CellView,
    pub collection_default: CellView,
    pub collections: Vec<CellView>,
}

/// The whole permission matrix of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionView {
    pub principal: Principal,
    pub server: CellView,
    pub databases: Vec<DatabaseView>,
}

impl PermissionView {
    pub fn build(table: &PermissionTable) -> Self {
        let databases = table
            .named_databases()
            .map(|grant| {
                let name = grant.database.as_str();
                DatabaseView {
                    cell: database_cell(table, name),
                    collection_default: collection_cell(table, name, &ResourceName::Wildcard),
                    collections: grant
                        .named_collections()
                        .map(|row| collection_cell(table, name, &row.collection))
                        .collect(),
                }
            })
            .collect();

        Self {
            principal: table.principal().clone(),
            server: server_cell(table),
            databases,
        }
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseView> {
        self.databases
            .iter()
            .find(|view| view.cell.database.as_str() == name)
    }

    /// Looks up a listed cell; `collection = None` addresses the database row.
    pub fn cell(&self, database: &str, collection: Option<&str>) -> Option<&CellView> {
        if database == ResourceName::WILDCARD {
            return collection.is_none().then_some(&self.server);
        }
        let view = self.database(database)?;
        match collection {
            None => Some(&view.cell),
            Some(ResourceName::WILDCARD) => Some(&view.collection_default),
            Some(name) => view
                .collections
                .iter()
                .find(|cell| cell.collection.as_ref().is_some_and(|c| c.as_str() == name)),
        }
    }
}
