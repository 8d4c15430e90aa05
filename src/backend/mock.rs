//! Mock backend for testing without network calls.

use super::{BackendError, DeskBackend, PersistRequest, TaxRecalcResponse};
use crate::domain::{Deal, DealId, DealState, Scenario, ScenarioId, TaxProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    scenarios: HashMap<ScenarioId, Scenario>,
    deals: HashMap<DealId, Deal>,
    persist_calls: Vec<PersistRequest>,
    state_calls: Vec<(DealId, DealState)>,
    tax_calls: usize,
    failing_saves: usize,
}

/// Mock backend that applies requests to in-memory records.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDeskBackend {
    state: Arc<Mutex<MockState>>,
    tax_profile: Option<TaxProfile>,
    latency: Option<Duration>,
}

impl MockDeskBackend {
    /// Create a new mock backend with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the server copy of a scenario.
    pub fn with_scenario(self, scenario: Scenario) -> Self {
        self.lock().scenarios.insert(scenario.id.clone(), scenario);
        self
    }

    /// Seed the server copy of a deal.
    pub fn with_deal(self, deal: Deal) -> Self {
        self.lock().deals.insert(deal.id.clone(), deal);
        self
    }

    /// Profile returned by tax recalculation. Without one, recalculation reports failure.
    pub fn with_tax_profile(mut self, profile: TaxProfile) -> Self {
        self.tax_profile = Some(profile);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` persist calls fail with a network error.
    pub fn fail_next_saves(&self, count: usize) {
        self.lock().failing_saves = count;
    }

    /// Every persist request received, including failed ones.
    pub fn persist_calls(&self) -> Vec<PersistRequest> {
        self.lock().persist_calls.clone()
    }

    pub fn state_calls(&self) -> Vec<(DealId, DealState)> {
        self.lock().state_calls.clone()
    }

    pub fn tax_calls(&self) -> usize {
        self.lock().tax_calls
    }

    /// Current server copy of a scenario.
    pub fn scenario(&self, id: &ScenarioId) -> Option<Scenario> {
        self.lock().scenarios.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a test that panicked mid-call leaves plain data behind
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DeskBackend for MockDeskBackend {
    async fn persist_scenario(&self, request: PersistRequest) -> Result<Scenario, BackendError> {
        let fail = {
            let mut state = self.lock();
            state.persist_calls.push(request.clone());
            if state.failing_saves > 0 {
                state.failing_saves -= 1;
                true
            } else {
                false
            }
        };
        self.simulate_latency().await;
        if fail {
            return Err(BackendError::NetworkError("simulated outage".to_string()));
        }

        let mut state = self.lock();
        let scenario = state
            .scenarios
            .get_mut(&request.scenario_id)
            .ok_or_else(|| BackendError::NotFound(request.scenario_id.to_string()))?;
        for update in &request.updates {
            scenario
                .apply_update(update)
                .map_err(|e| BackendError::Rejected(e.to_string()))?;
        }
        Ok(scenario.clone())
    }

    async fn recalculate_tax(&self, _deal_id: &DealId) -> Result<TaxRecalcResponse, BackendError> {
        self.lock().tax_calls += 1;
        self.simulate_latency().await;
        Ok(TaxRecalcResponse {
            success: self.tax_profile.is_some(),
            tax_profile: self.tax_profile.clone(),
        })
    }

    async fn update_deal_state(
        &self,
        deal_id: &DealId,
        state: DealState,
    ) -> Result<Deal, BackendError> {
        self.lock().state_calls.push((deal_id.clone(), state));
        self.simulate_latency().await;

        let mut records = self.lock();
        let deal = records
            .deals
            .get_mut(deal_id)
            .ok_or_else(|| BackendError::NotFound(deal_id.to_string()))?;
        if !deal.state.can_transition_to(state) {
            return Err(BackendError::Rejected(format!(
                "cannot move deal from {} to {}",
                deal.state, state
            )));
        }
        deal.state = state;
        Ok(deal.clone())
    }
}
