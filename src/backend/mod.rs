//! Client side of the desk's external interfaces: scenario persistence, tax
//! profile recalculation and deal state changes.

use crate::domain::{
    AuditLogEntry, Deal, DealId, DealState, SaveId, Scenario, ScenarioId, ScenarioUpdate,
    TaxProfile, UserId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod http;
pub mod local;
pub mod mock;

pub use http::HttpDeskBackend;
pub use local::LocalDeskBackend;
pub use mock::MockDeskBackend;

/// Persist only the listed fields of one scenario, with their audit entries.
///
/// A request carrying a `save_id` the server has already applied is answered
/// with the stored scenario and writes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_id: Option<SaveId>,
    pub deal_id: DealId,
    pub scenario_id: ScenarioId,
    pub updates: Vec<ScenarioUpdate>,
    pub change_log: Vec<AuditLogEntry>,
    pub acting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRecalcResponse {
    pub success: bool,
    #[serde(default)]
    pub tax_profile: Option<TaxProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStateRequest {
    pub deal_id: DealId,
    pub deal_state: DealState,
}

/// Backend for an edit session.
///
/// Calls are dispatched from spawned tasks, so implementations may take as long
/// as the network does without stalling edits.
#[async_trait]
pub trait DeskBackend: Send + Sync + fmt::Debug {
    /// Persist dirty fields and their audit entries.
    ///
    /// # Returns
    /// The scenario record as stored after the update.
    async fn persist_scenario(&self, request: PersistRequest) -> Result<Scenario, BackendError>;

    /// Ask the tax service to recompute the deal's jurisdiction profile.
    async fn recalculate_tax(&self, deal_id: &DealId) -> Result<TaxRecalcResponse, BackendError>;

    /// Move the deal to `state`.
    async fn update_deal_state(
        &self,
        deal_id: &DealId,
        state: DealState,
    ) -> Result<Deal, BackendError>;
}

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network error (e.g., connection refused, request timeout)
    NetworkError(String),
    /// Non-success HTTP status
    HttpError { status: u16, message: String },
    /// Response body did not match the expected shape
    ParseError(String),
    NotFound(String),
    /// The backend refused the request as invalid
    Rejected(String),
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            BackendError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            BackendError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            BackendError::NotFound(msg) => write!(f, "Not found: {}", msg),
            BackendError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
