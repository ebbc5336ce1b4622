//! In-memory [`GrantStore`] implementation.
//!
//! Keeps each principal's grants in the same nested shape the engine fetches,
//! records every call it serves and can be told to fail. Useful for tests,
//! demos and embedders that keep grants in process.

use crate::error::StoreError;
use crate::table::{DatabaseEntryDto, PermissionTableDto};
use crate::traits::grant_store::GrantStore;
use crate::traits::permissions::{GrantLevel, Principal, ResourceName};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One request served by a [`MemoryGrantStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch {
        principal: Principal,
    },
    Put {
        principal: Principal,
        database: ResourceName,
        collection: Option<ResourceName>,
        level: GrantLevel,
    },
    Delete {
        principal: Principal,
        database: ResourceName,
        collection: Option<ResourceName>,
    },
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, StoreCall::Fetch { .. })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    principals: BTreeMap<Principal, PermissionTableDto>,
    databases: BTreeSet<String>,
    denied: BTreeSet<Principal>,
    calls: Vec<StoreCall>,
    next_write_failure: Option<StoreError>,
    next_fetch_failure: Option<StoreError>,
}

/// Grants held in process memory.
///
/// # Examples
///
/// ```
/// use permission_matrix::databases::memory_store::MemoryGrantStore;
/// use permission_matrix::Principal;
///
/// let store = MemoryGrantStore::new()
///     .with_databases(["_system", "shop"])
///     .with_principal("alice");
///
/// assert!(store.grants(&Principal::from("alice")).is_some());
/// assert!(store.calls().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    state: Mutex<MemoryState>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Databases listed (with no grant) in every fetched table.
    pub fn with_databases<I, S>(self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls()
            .databases
            .extend(databases.into_iter().map(Into::into));
        self
    }

    pub fn with_principal(self, principal: impl Into<Principal>) -> Self {
        self.seed(principal, PermissionTableDto::default());
        self
    }

    /// Replaces a principal's grants with `table`, creating the principal.
    ///
    /// Raw level strings are stored as given, so malformed values can be
    /// planted for tests.
    pub fn seed(&self, principal: impl Into<Principal>, table: PermissionTableDto) {
        self.controls().principals.insert(principal.into(), table);
    }

    /// Answers every request for `principal` with `Unauthorized`.
    pub fn deny(&self, principal: impl Into<Principal>) {
        self.controls().denied.insert(principal.into());
    }

    /// Fails the next put or delete with `error`.
    pub fn fail_next_write(&self, error: StoreError) {
        self.controls().next_write_failure = Some(error);
    }

    /// Fails the next fetch with `error`.
    pub fn fail_next_fetch(&self, error: StoreError) {
        self.controls().next_fetch_failure = Some(error);
    }

    /// Every call served so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.controls().calls.clone()
    }

    pub fn write_count(&self) -> usize {
        self.calls().iter().filter(|call| call.is_write()).count()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls().iter().filter(|call| !call.is_write()).count()
    }

    pub fn clear_calls(&self) {
        self.controls().calls.clear();
    }

    /// Snapshot of a principal's stored grants.
    pub fn grants(&self, principal: &Principal) -> Option<PermissionTableDto> {
        self.controls().principals.get(principal).cloned()
    }

    /// State access for test controls; a poisoned lock is taken over as is.
    fn controls(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State access for served calls; a poisoned lock is a transport failure.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transport("memory store lock poisoned".to_string()))
    }
}

impl MemoryState {
    fn check_access(&self, principal: &Principal) -> Result<(), StoreError> {
        if self.denied.contains(principal) {
            return Err(StoreError::Unauthorized(principal.to_string()));
        }
        if !self.principals.contains_key(principal) {
            return Err(StoreError::NotFound(principal.to_string()));
        }
        Ok(())
    }

    fn begin_write(&mut self, principal: &Principal) -> Result<&mut PermissionTableDto, StoreError> {
        if let Some(error) = self.next_write_failure.take() {
            return Err(error);
        }
        self.check_access(principal)?;
        self.principals
            .get_mut(principal)
            .ok_or_else(|| StoreError::NotFound(principal.to_string()))
    }
}

fn check_address(database: &ResourceName, collection: Option<&ResourceName>) -> Result<(), StoreError> {
    if database.is_default_row() && collection.is_some() {
        return Err(StoreError::Rejected(
            "the server default has no collection rows".to_string(),
        ));
    }
    Ok(())
}

impl GrantStore for MemoryGrantStore {
    async fn fetch_permission_table(
        &self,
        principal: &Principal,
    ) -> Result<PermissionTableDto, StoreError> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Fetch {
            principal: principal.clone(),
        });
        if let Some(error) = state.next_fetch_failure.take() {
            return Err(error);
        }
        state.check_access(principal)?;

        let mut table = state
            .principals
            .get(principal)
            .cloned()
            .unwrap_or_default();
        for database in &state.databases {
            table.databases.entry(database.clone()).or_default();
        }
        Ok(table)
    }

    async fn put_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
        level: GrantLevel,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Put {
            principal: principal.clone(),
            database: database.clone(),
            collection: collection.cloned(),
            level,
        });
        check_address(database, collection)?;
        let table = state.begin_write(principal)?;

        let entry: &mut DatabaseEntryDto = table
            .databases
            .entry(database.as_str().to_string())
            .or_default();
        match collection {
            None => entry.permission = Some(level.to_string()),
            Some(collection) => {
                entry
                    .collections
                    .insert(collection.as_str().to_string(), level.to_string());
            }
        }
        debug!(
            "MemoryGrantStore: put {}/{} = {} for '{}'",
            database,
            collection.map(ResourceName::as_str).unwrap_or("-"),
            level,
            principal
        );
        Ok(())
    }

    async fn delete_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Delete {
            principal: principal.clone(),
            database: database.clone(),
            collection: collection.cloned(),
        });
        check_address(database, collection)?;
        let table = state.begin_write(principal)?;

        let key = database.as_str();
        if let Some(entry) = table.databases.get_mut(key) {
            match collection {
                None => entry.permission = None,
                Some(collection) => {
                    entry.collections.remove(collection.as_str());
                }
            }
            if entry.permission.is_none() && entry.collections.is_empty() {
                table.databases.remove(key);
            }
        }
        debug!(
            "MemoryGrantStore: cleared {}/{} for '{}'",
            database,
            collection.map(ResourceName::as_str).unwrap_or("-"),
            principal
        );
        Ok(())
    }
}
