//! Deal record and its workflow state machine.

use crate::domain::{DealId, TaxProfile};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealState {
    Draft,
    InProgress,
    Approved,
    Cancelled,
}

impl DealState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealState::Draft => "DRAFT",
            DealState::InProgress => "IN_PROGRESS",
            DealState::Approved => "APPROVED",
            DealState::Cancelled => "CANCELLED",
        }
    }

    /// Whether the workflow permits moving from `self` to `next`.
    ///
    /// DRAFT -> IN_PROGRESS -> APPROVED; CANCELLED from DRAFT or IN_PROGRESS.
    pub fn can_transition_to(&self, next: DealState) -> bool {
        matches!(
            (self, next),
            (DealState::Draft, DealState::InProgress)
                | (DealState::InProgress, DealState::Approved)
                | (DealState::Draft, DealState::Cancelled)
                | (DealState::InProgress, DealState::Cancelled)
        )
    }

    /// The state an "advance" request moves to, if any.
    pub fn next(&self) -> Option<DealState> {
        match self {
            DealState::Draft => Some(DealState::InProgress),
            DealState::InProgress => Some(DealState::Approved),
            DealState::Approved | DealState::Cancelled => None,
        }
    }
}

impl std::fmt::Display for DealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(DealState::Draft),
            "IN_PROGRESS" => Ok(DealState::InProgress),
            "APPROVED" => Ok(DealState::Approved),
            "CANCELLED" => Ok(DealState::Cancelled),
            other => Err(format!("unknown deal state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub state: DealState,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub tax_jurisdiction: Option<String>,
    #[serde(default)]
    pub tax_profile: Option<TaxProfile>,
}

impl Deal {
    pub fn new(id: DealId) -> Self {
        Self {
            id,
            state: DealState::Draft,
            customer_id: None,
            vin: None,
            tax_jurisdiction: None,
            tax_profile: None,
        }
    }
}
