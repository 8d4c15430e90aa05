pub mod deals;
pub mod health;
pub mod scenarios;

use crate::service::DeskService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeskService>,
}

impl AppState {
    pub fn new(service: Arc<DeskService>) -> Self {
        Self { service }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/deals", post(deals::create_deal))
        .route("/v1/deals/:deal_id", get(deals::get_deal))
        .route("/v1/deals/:deal_id/state", post(deals::update_deal_state))
        .route(
            "/v1/deals/:deal_id/tax/recalculate",
            post(deals::recalculate_tax),
        )
        .route(
            "/v1/deals/:deal_id/scenarios",
            get(scenarios::list_scenarios).post(scenarios::create_scenario),
        )
        .route(
            "/v1/deals/:deal_id/scenarios/:scenario_id",
            get(scenarios::get_scenario).patch(scenarios::persist_scenario),
        )
        .route(
            "/v1/deals/:deal_id/scenarios/:scenario_id/audit",
            get(scenarios::get_audit_log),
        )
        .layer(cors)
        .with_state(state)
}
