//! In-process backend that calls the desk service directly.

use super::{BackendError, DeskBackend, PersistRequest, TaxRecalcResponse};
use crate::domain::{Deal, DealId, DealState, Scenario};
use crate::service::{DeskService, ServiceError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalDeskBackend {
    service: Arc<DeskService>,
}

impl LocalDeskBackend {
    pub fn new(service: Arc<DeskService>) -> Self {
        Self { service }
    }
}

impl fmt::Debug for LocalDeskBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDeskBackend").finish_non_exhaustive()
    }
}

impl From<ServiceError> for BackendError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => BackendError::NotFound(msg),
            ServiceError::BadRequest(msg) | ServiceError::Conflict(msg) => {
                BackendError::Rejected(msg)
            }
            ServiceError::Db(e) => BackendError::Other(e.to_string()),
        }
    }
}

#[async_trait]
impl DeskBackend for LocalDeskBackend {
    async fn persist_scenario(&self, request: PersistRequest) -> Result<Scenario, BackendError> {
        Ok(self.service.persist_scenario(request).await?)
    }

    async fn recalculate_tax(&self, deal_id: &DealId) -> Result<TaxRecalcResponse, BackendError> {
        Ok(self.service.recalculate_tax(deal_id).await?)
    }

    async fn update_deal_state(
        &self,
        deal_id: &DealId,
        state: DealState,
    ) -> Result<Deal, BackendError> {
        Ok(self.service.transition_deal(deal_id, state).await?)
    }
}
