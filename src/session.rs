//! Per-principal editing session.
//!
//! [`PermissionEditor`] ties the gate, the mutation protocol and the current
//! table together. Changes go through the principal's mutation lane, taken
//! from the [`MutationProtocol`] and shared by every session built from it
//! (see [`PermissionEditor::for_principal`]). At most one write/reload cycle
//! runs per principal, and a change that cannot take the lane fails with
//! [`PermissionError::MutationInFlight`] instead of queueing.
//!
//! The cycle runs on a spawned task holding the lane. Dropping the future
//! returned by [`PermissionEditor::request_change`] or
//! [`PermissionEditor::confirm_pending_change`] does not cancel a write that
//! has already been issued, and the lane stays taken until the reload is done.

use crate::config::EngineConfig;
use crate::error::{PermissionError, PermissionResult};
use crate::gate::{ChangeRequest, GateDecision, SensitiveChangeGate};
use crate::mutation::{Lane, MutationCommand, MutationProtocol};
use crate::resolution::PermissionView;
use crate::table::PermissionTable;
use crate::traits::grant_store::GrantStore;
use crate::traits::permissions::{LevelChoice, Principal, Scope};
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Result of [`PermissionEditor::request_change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The change was written; carries the reloaded table.
    Applied(PermissionTable),
    /// The scope is protected. Nothing was sent to the store.
    AwaitingConfirmation { replaced: Option<ChangeRequest> },
}

#[derive(Debug)]
struct EditorState {
    table: Option<PermissionTable>,
    gate: SensitiveChangeGate,
}

/// Command surface for editing one principal's permissions.
pub struct PermissionEditor<S> {
    principal: Principal,
    protocol: MutationProtocol<S>,
    config: EngineConfig,
    state: Arc<Mutex<EditorState>>,
    lane: Lane,
}

impl<S: GrantStore + 'static> PermissionEditor<S> {
    pub fn new(
        store: Arc<S>,
        principal: impl Into<Principal>,
        config: EngineConfig,
    ) -> PermissionResult<Self> {
        config.validate()?;
        let principal = principal.into();
        let protocol = MutationProtocol::new(store, config.malformed_levels);
        Ok(Self {
            lane: protocol.lane(&principal),
            principal,
            protocol,
            state: Arc::new(Mutex::new(EditorState {
                table: None,
                gate: SensitiveChangeGate::new(config.clone()),
            })),
            config,
        })
    }

    /// A fresh session for `principal` over the same store and config.
    ///
    /// The new session has its own gate and table but shares mutation lanes
    /// with this one: while either runs a change for the same principal, the
    /// other gets `MutationInFlight`.
    pub fn for_principal(&self, principal: impl Into<Principal>) -> Self {
        let config = self.config.clone();
        let principal = principal.into();
        Self {
            lane: self.protocol.lane(&principal),
            principal,
            protocol: self.protocol.clone(),
            state: Arc::new(Mutex::new(EditorState {
                table: None,
                gate: SensitiveChangeGate::new(config.clone()),
            })),
            config,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a write or reload currently holds the lane.
    pub fn is_busy(&self) -> bool {
        self.lane.try_lock().is_err()
    }

    /// Fetches the table and makes it current.
    ///
    /// On failure the current table is unset.
    pub async fn load(&self) -> PermissionResult<PermissionTable> {
        let lane = self.acquire_lane()?;
        let protocol = self.protocol.clone();
        let principal = self.principal.clone();
        self.run_in_lane(lane, async move { protocol.load(&principal).await })
            .await
    }

    /// Routes a change through the gate and applies it if it is not protected.
    ///
    /// Protected changes are parked without any store call; a newer one
    /// replaces the parked one.
    pub async fn request_change(
        &self,
        scope: Scope,
        choice: LevelChoice,
    ) -> PermissionResult<ChangeOutcome> {
        scope.validate()?;
        let request = ChangeRequest::new(scope, choice);

        let decision = self.state.lock().await.gate.request(request);

        match decision {
            GateDecision::Proceed(request) => {
                let lane = self.acquire_lane()?;
                self.apply_request(lane, request)
                    .await
                    .map(ChangeOutcome::Applied)
            }
            GateDecision::Held { replaced } => Ok(ChangeOutcome::AwaitingConfirmation { replaced }),
        }
    }

    /// Applies the parked change.
    ///
    /// Fails with `NoPendingChange` when nothing is parked and with
    /// `MutationInFlight` when another cycle is running; in the latter case
    /// the parked change stays in place.
    pub async fn confirm_pending_change(&self) -> PermissionResult<PermissionTable> {
        let lane = self.acquire_lane()?;
        let request = self.state.lock().await.gate.confirm()?;
        self.apply_request(lane, request).await
    }

    /// Drops the parked change, if any. Never touches the store.
    pub async fn cancel_pending_change(&self) -> Option<ChangeRequest> {
        self.state.lock().await.gate.cancel()
    }

    pub async fn pending_change(&self) -> Option<ChangeRequest> {
        self.state.lock().await.gate.pending().cloned()
    }

    /// The current table, if one has been loaded.
    pub async fn table(&self) -> Option<PermissionTable> {
        self.state.lock().await.table.clone()
    }

    /// The resolved matrix of the current table.
    pub async fn view(&self) -> Option<PermissionView> {
        self.state.lock().await.table.as_ref().map(PermissionView::build)
    }

    fn acquire_lane(&self) -> PermissionResult<OwnedMutexGuard<()>> {
        Arc::clone(&self.lane).try_lock_owned().map_err(|_| {
            debug!("PermissionEditor: lane for '{}' is busy", self.principal);
            PermissionError::MutationInFlight(self.principal.clone())
        })
    }

    async fn apply_request(
        &self,
        lane: OwnedMutexGuard<()>,
        request: ChangeRequest,
    ) -> PermissionResult<PermissionTable> {
        let command = MutationCommand::from(request.choice);
        info!(
            "PermissionEditor: applying {:?} at {} for '{}'",
            command, request.scope, self.principal
        );
        let protocol = self.protocol.clone();
        let principal = self.principal.clone();
        self.run_in_lane(lane, async move {
            protocol.apply(&principal, &request.scope, command).await
        })
        .await
    }

    /// Runs `work` on its own task and folds the result into the state.
    async fn run_in_lane<F>(
        &self,
        lane: OwnedMutexGuard<()>,
        work: F,
    ) -> PermissionResult<PermissionTable>
    where
        F: Future<Output = PermissionResult<PermissionTable>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let _lane = lane;
            let result = work.await;
            let mut state = state.lock().await;
            match &result {
                Ok(table) => state.table = Some(table.clone()),
                // Never keep a table that the last load could not confirm.
                Err(PermissionError::LoadFailure { .. } | PermissionError::MalformedLevel(_)) => {
                    state.table = None
                }
                Err(_) => {}
            }
            result
        });

        handle
            .await
            .map_err(|err| PermissionError::TaskFailed(err.to_string()))?
    }
}
