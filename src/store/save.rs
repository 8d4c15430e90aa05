//! Save bookkeeping types shared by the store and the session worker.

use crate::backend::PersistRequest;
use crate::domain::{FieldName, ScenarioId};
use crate::store::{DirtySet, PreviousValueMap};
use serde::Serialize;

/// Persistence status of the active scenario, as shown to the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum SaveStatus {
    /// Nothing edited since the scenario was loaded.
    Idle,
    /// Edits waiting for the quiet period to elapse.
    Pending,
    Saving,
    Saved,
    /// Last save failed; the edits are still dirty.
    Error(String),
}

impl SaveStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SaveStatus::Error(_))
    }
}

/// Identifies one dispatched save. A result whose ticket is no longer current
/// (scenario switched, or already completed) is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub scenario_id: ScenarioId,
    pub generation: u64,
    pub seq: u64,
}

/// A save ready to hand to the backend.
#[derive(Debug, Clone)]
pub struct SaveBatch {
    pub ticket: SaveTicket,
    pub request: PersistRequest,
}

impl SaveBatch {
    pub fn fields(&self) -> Vec<FieldName> {
        self.request.updates.iter().map(|u| u.field_name()).collect()
    }
}

/// Fields handed to the backend and not yet acknowledged.
#[derive(Debug, Clone)]
pub(crate) struct InFlightSave {
    pub ticket: SaveTicket,
    pub fields: DirtySet,
    pub previous: PreviousValueMap,
}

/// What the store did with a save result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The save failed; its fields are dirty again.
    Failed { restored: Vec<FieldName> },
    /// The result belongs to a save that is no longer current.
    Stale,
}
