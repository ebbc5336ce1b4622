//! Confirmation gate for changes to protected databases.
//!
//! ```text
//!            request (protected scope)
//!   Idle ─────────────────────────────► PendingConfirmation { scope, choice }
//!    ▲                                        │        │
//!    │            confirm → apply change      │        │ request (protected)
//!    ├────────────────────────────────────────┘        │ replaces the pending one
//!    │            cancel  → discard                    ▼
//!    └──────────────────────────────────── PendingConfirmation { .. }
//! ```
//!
//! Requests for any other scope pass straight through. The gate never talks
//! to the store; it only decides what may be handed to the mutation protocol.

use crate::config::EngineConfig;
use crate::error::{PermissionError, PermissionResult};
use crate::mutation::MutationCommand;
use crate::traits::permissions::{LevelChoice, Scope};
use log::info;

/// A user-initiated change of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub scope: Scope,
    pub choice: LevelChoice,
}

impl ChangeRequest {
    pub fn new(scope: Scope, choice: LevelChoice) -> Self {
        Self { scope, choice }
    }

    /// `UseDefault` becomes a clear, everything else a set.
    pub fn command(&self) -> MutationCommand {
        MutationCommand::from(self.choice)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GateState {
    #[default]
    Idle,
    PendingConfirmation(ChangeRequest),
}

/// Outcome of handing a request to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Not protected; apply it now.
    Proceed(ChangeRequest),
    /// Parked until confirmed or cancelled. Carries the request it displaced, if any.
    Held { replaced: Option<ChangeRequest> },
}

#[derive(Debug, Clone)]
pub struct SensitiveChangeGate {
    config: EngineConfig,
    state: GateState,
}

impl SensitiveChangeGate {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    pub fn pending(&self) -> Option<&ChangeRequest> {
        match &self.state {
            GateState::PendingConfirmation(request) => Some(request),
            GateState::Idle => None,
        }
    }

    pub fn requires_confirmation(&self, scope: &Scope) -> bool {
        self.config.requires_confirmation(scope)
    }

    /// Routes a request: protected scopes are parked, the rest proceed.
    ///
    /// Only one request can be pending; a newer protected request replaces it.
    pub fn request(&mut self, request: ChangeRequest) -> GateDecision {
        if !self.requires_confirmation(&request.scope) {
            return GateDecision::Proceed(request);
        }

        info!(
            "SensitiveChangeGate: {} to {} awaits confirmation",
            request.scope, request.choice
        );
        let previous = std::mem::replace(&mut self.state, GateState::PendingConfirmation(request));
        let replaced = match previous {
            GateState::PendingConfirmation(old) => {
                info!("SensitiveChangeGate: dropped earlier request for {}", old.scope);
                Some(old)
            }
            GateState::Idle => None,
        };
        GateDecision::Held { replaced }
    }

    /// Releases the pending request for application and returns to `Idle`.
    pub fn confirm(&mut self) -> PermissionResult<ChangeRequest> {
        match std::mem::take(&mut self.state) {
            GateState::PendingConfirmation(request) => {
                info!("SensitiveChangeGate: confirmed change to {}", request.scope);
                Ok(request)
            }
            GateState::Idle => Err(PermissionError::NoPendingChange),
        }
    }

    /// Discards the pending request, if any, and returns to `Idle`.
    pub fn cancel(&mut self) -> Option<ChangeRequest> {
        match std::mem::take(&mut self.state) {
            GateState::PendingConfirmation(request) => {
                info!("SensitiveChangeGate: cancelled change to {}", request.scope);
                Some(request)
            }
            GateState::Idle => None,
        }
    }
}

impl Default for SensitiveChangeGate {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
