//! Edit session for one deal: owns the scenario store on a worker task,
//! debounces autosaves and talks to the backend without blocking edits.
//!
//! Callers hold a cheap [`DeskSession`] handle. Every operation is a message to
//! the worker, so edits, server pushes and save results are applied in one
//! order with no locking.

mod worker;

use crate::backend::{BackendError, DeskBackend};
use crate::config::Config;
use crate::domain::{Deal, DealState, FieldName, Scenario, ScenarioUpdate, TaxProfile, UserId};
use crate::engine::Calculation;
use crate::store::{SaveStatus, ScenarioStore, SnapshotOutcome, StoreError};
use crate::workflow::{GateError, ValidationIssue};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use worker::SessionWorker;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after the last edit before an autosave is dispatched.
    pub debounce: Duration,
    /// Recorded on every audit entry this session writes.
    pub acting_user: UserId,
}

impl SessionConfig {
    pub fn new(acting_user: UserId) -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            acting_user,
        }
    }

    pub fn from_config(config: &Config, acting_user: UserId) -> Self {
        Self {
            debounce: Duration::from_millis(config.autosave_debounce_ms),
            acting_user,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// What to do with unsaved work when switching scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPolicy {
    /// Save first; the switch fails if the save does.
    Flush,
    /// Revert unsaved edits and switch immediately.
    Discard,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("deal in state {0} has no next state")]
    NoNextState(DealState),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("tax recalculation failed: {0}")]
    Recalculation(String),
    #[error("save failed: {0}")]
    SaveFailed(String),
    #[error("superseded by another scenario switch")]
    Superseded,
    #[error("session closed")]
    Closed,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub deal: Deal,
    pub scenario: Scenario,
    pub calculation: Calculation,
    pub dirty: Vec<FieldName>,
    pub status: SaveStatus,
}

pub(crate) enum Command {
    Update {
        updates: Vec<ScenarioUpdate>,
        reply: oneshot::Sender<Result<Calculation, SessionError>>,
    },
    ReceiveSnapshot {
        scenario: Scenario,
        reply: oneshot::Sender<SnapshotOutcome>,
    },
    ReceiveDeal {
        deal: Deal,
    },
    Switch {
        next: Scenario,
        policy: SwitchPolicy,
        reply: oneshot::Sender<Result<SnapshotOutcome, SessionError>>,
    },
    Flush {
        reply: oneshot::Sender<SaveStatus>,
    },
    Retry {
        reply: oneshot::Sender<bool>,
    },
    Discard {
        reply: oneshot::Sender<Vec<FieldName>>,
    },
    RecalculateTax {
        reply: oneshot::Sender<Result<TaxProfile, SessionError>>,
    },
    Transition {
        target: Option<DealState>,
        reply: oneshot::Sender<Result<Deal, SessionError>>,
    },
    Validate {
        reply: oneshot::Sender<Vec<ValidationIssue>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<SaveStatus>,
    },
}

/// Handle to a running edit session.
#[derive(Debug, Clone)]
pub struct DeskSession {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SaveStatus>,
}

impl DeskSession {
    /// Start the session worker on the current tokio runtime.
    pub fn spawn(
        store: ScenarioStore,
        deal: Deal,
        backend: Arc<dyn DeskBackend>,
        config: SessionConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(store.status().clone());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = SessionWorker::new(store, deal, backend, config, status_tx, event_tx);
        tokio::spawn(worker.run(command_rx, event_rx));

        Self {
            commands: command_tx,
            status: status_rx,
        }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Apply one edit and return the recomputed figures.
    pub async fn update_field(
        &self,
        update: impl Into<ScenarioUpdate>,
    ) -> Result<Calculation, SessionError> {
        self.update_fields(vec![update.into()]).await
    }

    /// Apply several edits atomically.
    pub async fn update_fields(
        &self,
        updates: Vec<ScenarioUpdate>,
    ) -> Result<Calculation, SessionError> {
        self.call(|reply| Command::Update { updates, reply }).await?
    }

    /// Reconcile a scenario pushed by the server.
    pub async fn receive_server_snapshot(
        &self,
        scenario: Scenario,
    ) -> Result<SnapshotOutcome, SessionError> {
        self.call(|reply| Command::ReceiveSnapshot { scenario, reply })
            .await
    }

    /// Replace the deal record (customer, VIN, jurisdiction edited elsewhere).
    pub async fn receive_deal(&self, deal: Deal) -> Result<(), SessionError> {
        self.commands
            .send(Command::ReceiveDeal { deal })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Make `next` the active scenario.
    pub async fn switch_scenario(
        &self,
        next: Scenario,
        policy: SwitchPolicy,
    ) -> Result<SnapshotOutcome, SessionError> {
        self.call(|reply| Command::Switch {
            next,
            policy,
            reply,
        })
        .await?
    }

    /// Save now, skipping the quiet period, and wait for the outcome.
    pub async fn flush(&self) -> Result<SaveStatus, SessionError> {
        self.call(|reply| Command::Flush { reply }).await
    }

    /// Dispatch the dirty fields immediately after a failed save.
    ///
    /// Returns whether a save was dispatched. Progress shows up on [`DeskSession::status`].
    pub async fn retry_save(&self) -> Result<bool, SessionError> {
        self.call(|reply| Command::Retry { reply }).await
    }

    /// Revert unsaved edits. Returns the fields reverted.
    pub async fn discard_changes(&self) -> Result<Vec<FieldName>, SessionError> {
        self.call(|reply| Command::Discard { reply }).await
    }

    pub async fn recalculate_tax(&self) -> Result<TaxProfile, SessionError> {
        self.call(|reply| Command::RecalculateTax { reply }).await?
    }

    /// Move the deal to its next workflow state after validation passes.
    pub async fn advance_deal(&self) -> Result<Deal, SessionError> {
        self.call(|reply| Command::Transition {
            target: None,
            reply,
        })
        .await?
    }

    pub async fn cancel_deal(&self) -> Result<Deal, SessionError> {
        self.call(|reply| Command::Transition {
            target: Some(DealState::Cancelled),
            reply,
        })
        .await?
    }

    pub async fn validate(&self) -> Result<Vec<ValidationIssue>, SessionError> {
        self.call(|reply| Command::Validate { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Save status as a watch channel; every change is published.
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Flush outstanding edits and stop the worker.
    pub async fn shutdown(&self) -> Result<SaveStatus, SessionError> {
        self.call(|reply| Command::Shutdown { reply }).await
    }
}
