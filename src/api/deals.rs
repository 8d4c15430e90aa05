use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::AppState;
use crate::backend::{DealStateRequest, TaxRecalcResponse};
use crate::domain::{Deal, DealId};
use crate::error::AppError;
use crate::service::NewDeal;

pub async fn create_deal(
    State(state): State<AppState>,
    Json(body): Json<NewDeal>,
) -> Result<(StatusCode, Json<Deal>), AppError> {
    let deal = state.service.create_deal(body).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn get_deal(
    Path(deal_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Deal>, AppError> {
    Ok(Json(state.service.get_deal(&DealId::new(deal_id)).await?))
}

/// Move a deal to a new workflow state. Illegal moves answer 409.
pub async fn update_deal_state(
    Path(deal_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<DealStateRequest>,
) -> Result<Json<Deal>, AppError> {
    let deal_id = DealId::new(deal_id);
    if body.deal_id != deal_id {
        return Err(AppError::BadRequest(format!(
            "dealId {} does not match path {}",
            body.deal_id, deal_id
        )));
    }
    Ok(Json(
        state
            .service
            .transition_deal(&deal_id, body.deal_state)
            .await?,
    ))
}

pub async fn recalculate_tax(
    Path(deal_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TaxRecalcResponse>, AppError> {
    Ok(Json(
        state
            .service
            .recalculate_tax(&DealId::new(deal_id))
            .await?,
    ))
}
