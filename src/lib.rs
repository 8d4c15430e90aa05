pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod service;
pub mod session;
pub mod store;
pub mod workflow;

pub use backend::{BackendError, DeskBackend, HttpDeskBackend, LocalDeskBackend, MockDeskBackend};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Deal, DealId, DealState, Decimal, FieldName, Scenario, ScenarioId, ScenarioType,
    ScenarioUpdate, TimeMs, UserId,
};
pub use engine::{derive, Calculation, CalcWarning, TaxContext};
pub use error::AppError;
pub use service::DeskService;
pub use session::{DeskSession, SessionConfig, SessionError, SwitchPolicy};
pub use store::{SaveStatus, ScenarioStore};
