use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::backend::PersistRequest;
use crate::domain::{AuditLogEntry, DealId, DerivedOutputs, Scenario, ScenarioId};
use crate::engine::{self, CalcWarning};
use crate::error::AppError;
use crate::service::NewScenario;

/// Scenario with its figures rounded to cents for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioView {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub display: DerivedOutputs,
    pub warnings: Vec<CalcWarning>,
}

async fn view(state: &AppState, scenario: Scenario) -> Result<ScenarioView, AppError> {
    let deal = state.service.get_deal(&scenario.deal_id).await?;
    let calculation = engine::derive(&scenario, &state.service.tax_context(&deal));
    Ok(ScenarioView {
        display: calculation.outputs.rounded(),
        warnings: calculation.warnings,
        scenario,
    })
}

pub async fn create_scenario(
    Path(deal_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<NewScenario>,
) -> Result<(StatusCode, Json<ScenarioView>), AppError> {
    let scenario = state
        .service
        .create_scenario(&DealId::new(deal_id), body)
        .await?;
    Ok((StatusCode::CREATED, Json(view(&state, scenario).await?)))
}

pub async fn list_scenarios(
    Path(deal_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Scenario>>, AppError> {
    Ok(Json(
        state.service.list_scenarios(&DealId::new(deal_id)).await?,
    ))
}

pub async fn get_scenario(
    Path((deal_id, scenario_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ScenarioView>, AppError> {
    let scenario = state
        .service
        .get_scenario(&DealId::new(deal_id), &ScenarioId::new(scenario_id))
        .await?;
    Ok(Json(view(&state, scenario).await?))
}

/// Partial update: only the listed fields are written, with their audit entries.
pub async fn persist_scenario(
    Path((deal_id, scenario_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<PersistRequest>,
) -> Result<Json<Scenario>, AppError> {
    if body.deal_id.as_str() != deal_id || body.scenario_id.as_str() != scenario_id {
        return Err(AppError::BadRequest(
            "dealId and scenarioId must match the path".into(),
        ));
    }
    Ok(Json(state.service.persist_scenario(body).await?))
}

pub async fn get_audit_log(
    Path((deal_id, scenario_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    Ok(Json(
        state
            .service
            .audit_log(&DealId::new(deal_id), &ScenarioId::new(scenario_id))
            .await?,
    ))
}
