//! Server-side deal desk operations, shared by the HTTP handlers and the
//! in-process backend.

use crate::db::Repository;
use crate::domain::{
    AuditLogEntry, Deal, DealId, DealInputs, DealState, Decimal, Scenario, ScenarioId,
    ScenarioTerms, ScenarioType,
};
use crate::backend::{PersistRequest, TaxRecalcResponse};
use crate::engine::{self, TaxContext};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewDeal {
    pub id: Option<DealId>,
    pub customer_id: Option<String>,
    pub vin: Option<String>,
    pub tax_jurisdiction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScenario {
    #[serde(default)]
    pub id: Option<ScenarioId>,
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub inputs: DealInputs,
    /// Starting terms. Must match `scenario_type` when given.
    #[serde(default)]
    pub terms: Option<ScenarioTerms>,
}

pub struct DeskService {
    repo: Arc<Repository>,
    placeholder_rate: Decimal,
    // serializes read-modify-write of scenario bodies; last save wins
    write_lock: Mutex<()>,
}

impl DeskService {
    pub fn new(repo: Arc<Repository>, placeholder_rate: Decimal) -> Self {
        Self {
            repo,
            placeholder_rate,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn tax_context(&self, deal: &Deal) -> TaxContext {
        TaxContext::placeholder(self.placeholder_rate).with_profile(deal.tax_profile.clone())
    }

    pub async fn create_deal(&self, new: NewDeal) -> Result<Deal, ServiceError> {
        let id = new.id.unwrap_or_else(DealId::generate);
        if self.repo.get_deal(&id).await?.is_some() {
            return Err(ServiceError::Conflict(format!("deal {} already exists", id)));
        }
        let deal = Deal {
            customer_id: new.customer_id,
            vin: new.vin,
            tax_jurisdiction: new.tax_jurisdiction,
            ..Deal::new(id)
        };
        self.repo.insert_deal(&deal).await?;
        info!("Created deal {}", deal.id);
        Ok(deal)
    }

    pub async fn get_deal(&self, id: &DealId) -> Result<Deal, ServiceError> {
        self.repo
            .get_deal(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("deal {}", id)))
    }

    /// Create a scenario under an existing deal, with outputs derived.
    pub async fn create_scenario(
        &self,
        deal_id: &DealId,
        new: NewScenario,
    ) -> Result<Scenario, ServiceError> {
        let deal = self.get_deal(deal_id).await?;
        let id = new.id.unwrap_or_else(ScenarioId::generate);
        if self.repo.get_scenario(&id).await?.is_some() {
            return Err(ServiceError::Conflict(format!("scenario {} already exists", id)));
        }

        let mut scenario = Scenario::new(id, deal.id.clone(), new.scenario_type);
        if let Some(terms) = new.terms {
            if terms.scenario_type() != new.scenario_type {
                return Err(ServiceError::BadRequest(format!(
                    "{} terms given for a {} scenario",
                    terms.scenario_type(),
                    new.scenario_type
                )));
            }
            scenario.terms = terms;
        }
        scenario.inputs = new.inputs;
        scenario.apply_outputs(engine::derive(&scenario, &self.tax_context(&deal)).outputs);

        self.repo.insert_scenario(&scenario).await?;
        info!("Created {} scenario {} for deal {}", new.scenario_type, scenario.id, deal.id);
        Ok(scenario)
    }

    pub async fn get_scenario(
        &self,
        deal_id: &DealId,
        scenario_id: &ScenarioId,
    ) -> Result<Scenario, ServiceError> {
        self.repo
            .get_scenario(scenario_id)
            .await?
            .filter(|s| &s.deal_id == deal_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("scenario {} on deal {}", scenario_id, deal_id))
            })
    }

    pub async fn list_scenarios(&self, deal_id: &DealId) -> Result<Vec<Scenario>, ServiceError> {
        self.get_deal(deal_id).await?;
        Ok(self.repo.list_scenarios(deal_id).await?)
    }

    /// Apply a partial update and append its audit entries in one transaction.
    ///
    /// Any update that does not fit the scenario's type rejects the whole request.
    /// A replayed save id returns the stored scenario untouched.
    pub async fn persist_scenario(&self, request: PersistRequest) -> Result<Scenario, ServiceError> {
        let _guard = self.write_lock.lock().await;

        let deal = self.get_deal(&request.deal_id).await?;
        let mut scenario = self
            .get_scenario(&request.deal_id, &request.scenario_id)
            .await?;

        if let Some(save_id) = &request.save_id {
            if self.repo.is_save_applied(save_id).await? {
                info!("Save {} for scenario {} already applied", save_id, scenario.id);
                return Ok(scenario);
            }
        }

        for update in &request.updates {
            scenario
                .apply_update(update)
                .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
        }
        scenario.apply_outputs(engine::derive(&scenario, &self.tax_context(&deal)).outputs);

        if !self
            .repo
            .save_scenario_with_audit(&scenario, &request.change_log, request.save_id.as_ref())
            .await?
        {
            return self.get_scenario(&request.deal_id, &request.scenario_id).await;
        }
        info!(
            "Persisted {} field(s), {} audit entries for scenario {} by {}",
            request.updates.len(),
            request.change_log.len(),
            scenario.id,
            request.acting_user_id
        );
        Ok(scenario)
    }

    /// Look up the deal's jurisdiction profile and store it on the deal.
    ///
    /// Reports `success: false` when the deal has no jurisdiction or no rate is
    /// known for it.
    pub async fn recalculate_tax(&self, deal_id: &DealId) -> Result<TaxRecalcResponse, ServiceError> {
        let deal = self.get_deal(deal_id).await?;
        let Some(jurisdiction) = deal.tax_jurisdiction.as_deref() else {
            warn!("Deal {} has no tax jurisdiction", deal_id);
            return Ok(TaxRecalcResponse {
                success: false,
                tax_profile: None,
            });
        };

        match self.repo.get_tax_rate(jurisdiction).await? {
            Some(profile) => {
                self.repo.set_deal_tax_profile(deal_id, &profile).await?;
                info!(
                    "Deal {} taxed in {} at {} ({})",
                    deal_id,
                    profile.jurisdiction,
                    profile.combined_rate,
                    profile.method.as_str()
                );
                Ok(TaxRecalcResponse {
                    success: true,
                    tax_profile: Some(profile),
                })
            }
            None => {
                warn!("No tax rate for jurisdiction {}", jurisdiction);
                Ok(TaxRecalcResponse {
                    success: false,
                    tax_profile: None,
                })
            }
        }
    }

    /// Move a deal along its workflow. Illegal or lost-race moves are conflicts.
    pub async fn transition_deal(
        &self,
        deal_id: &DealId,
        state: DealState,
    ) -> Result<Deal, ServiceError> {
        let _guard = self.write_lock.lock().await;

        let mut deal = self.get_deal(deal_id).await?;
        if !deal.state.can_transition_to(state) {
            return Err(ServiceError::Conflict(format!(
                "cannot move deal from {} to {}",
                deal.state, state
            )));
        }
        if !self.repo.update_deal_state(deal_id, deal.state, state).await? {
            return Err(ServiceError::Conflict(format!(
                "deal {} changed state while moving to {}",
                deal_id, state
            )));
        }
        info!("Deal {} moved from {} to {}", deal_id, deal.state, state);
        deal.state = state;
        Ok(deal)
    }

    pub async fn audit_log(
        &self,
        deal_id: &DealId,
        scenario_id: &ScenarioId,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        self.get_scenario(deal_id, scenario_id).await?;
        Ok(self.repo.query_audit_log(scenario_id).await?)
    }
}
