//! Scope-addressed writes followed by a full reload.
//!
//! Every successful write or delete is followed by one unconditional reload
//! of the whole table. The table is never patched locally, so what callers
//! hold after a change is always what the store resolved. A failed write
//! returns before the reload and leaves the caller's previous table alone.
//! Nothing is retried; repeating a set or clear is safe.
//!
//! The protocol also hands out one mutation lane per principal. Every clone
//! of a protocol shares the same lanes, so sessions built on it cannot run
//! two write/reload cycles for one principal at once.

use crate::config::MalformedLevelPolicy;
use crate::error::{PermissionError, PermissionResult};
use crate::table::PermissionTable;
use crate::traits::grant_store::GrantStore;
use crate::traits::permissions::{GrantLevel, LevelChoice, Principal, Scope};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Exclusive right to run a write/reload cycle for one principal.
pub type Lane = Arc<tokio::sync::Mutex<()>>;

/// What a confirmed change does to its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationCommand {
    /// Write an explicit grant.
    Set(GrantLevel),
    /// Remove the grant so the scope inherits again.
    Clear,
}

impl From<LevelChoice> for MutationCommand {
    fn from(choice: LevelChoice) -> Self {
        match choice.grant() {
            Some(level) => MutationCommand::Set(level),
            None => MutationCommand::Clear,
        }
    }
}

/// Loads tables and applies changes through a [`GrantStore`].
pub struct MutationProtocol<S> {
    store: Arc<S>,
    policy: MalformedLevelPolicy,
    lanes: Arc<Mutex<HashMap<Principal, Lane>>>,
}

impl<S> Clone for MutationProtocol<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
            lanes: Arc::clone(&self.lanes),
        }
    }
}

impl<S: GrantStore> MutationProtocol<S> {
    pub fn new(store: Arc<S>, policy: MalformedLevelPolicy) -> Self {
        Self {
            store,
            policy,
            lanes: Arc::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The lane of `principal`, created on first use.
    pub fn lane(&self, principal: &Principal) -> Lane {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(principal.clone()).or_default())
    }

    /// Fetches and flattens the full table of `principal`.
    pub async fn load(&self, principal: &Principal) -> PermissionResult<PermissionTable> {
        let start = Instant::now();
        let dto = self
            .store
            .fetch_permission_table(principal)
            .await
            .map_err(|source| PermissionError::LoadFailure {
                principal: principal.clone(),
                source,
            })?;
        let table = PermissionTable::from_dto(principal.clone(), dto, self.policy)?;
        debug!(
            "MutationProtocol: loaded {} rows for '{}' in {:?}",
            table.databases().len(),
            principal,
            start.elapsed()
        );
        Ok(table)
    }

    /// Writes `level` at `scope`, then reloads.
    pub async fn set_permission(
        &self,
        principal: &Principal,
        scope: &Scope,
        level: GrantLevel,
    ) -> PermissionResult<PermissionTable> {
        self.apply(principal, scope, MutationCommand::Set(level)).await
    }

    /// Clears the grant at `scope`, then reloads.
    pub async fn clear_permission(
        &self,
        principal: &Principal,
        scope: &Scope,
    ) -> PermissionResult<PermissionTable> {
        self.apply(principal, scope, MutationCommand::Clear).await
    }

    /// Runs `command` against `scope` and returns the reloaded table.
    pub async fn apply(
        &self,
        principal: &Principal,
        scope: &Scope,
        command: MutationCommand,
    ) -> PermissionResult<PermissionTable> {
        scope.validate()?;
        let (database, collection) = scope.address();
        let start = Instant::now();

        let written = match command {
            MutationCommand::Set(level) => {
                self.store
                    .put_grant(principal, &database, collection.as_ref(), level)
                    .await
            }
            MutationCommand::Clear => {
                self.store
                    .delete_grant(principal, &database, collection.as_ref())
                    .await
            }
        };
        if let Err(source) = written {
            warn!(
                "MutationProtocol: {:?} at {} for '{}' failed: {}",
                command, scope, principal, source
            );
            return Err(PermissionError::WriteFailure {
                scope: scope.clone(),
                source,
            });
        }
        debug!(
            "MutationProtocol: {:?} at {} for '{}' written in {:?}",
            command,
            scope,
            principal,
            start.elapsed()
        );

        self.load(principal).await
    }
}
