//! Domain types for the deal desk.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Identifiers and time primitives
//! - Scenario model with typed, per-deal-type field updates
//! - Audit entries, tax profiles and the deal workflow state

pub mod audit;
pub mod deal;
pub mod decimal;
pub mod field;
pub mod primitives;
pub mod scenario;
pub mod tax;

pub use audit::AuditLogEntry;
pub use deal::{Deal, DealState};
pub use decimal::Decimal;
pub use field::{
    CommonUpdate, FieldError, FieldName, FieldValue, FinanceUpdate, LeaseUpdate, ScenarioUpdate,
};
pub use primitives::{DealId, SaveId, ScenarioId, TimeMs, UserId};
pub use scenario::{
    DealInputs, DerivedOutputs, FinanceTerms, LeaseBreakdown, LeaseTerms, ProductLine, Scenario,
    ScenarioTerms, ScenarioType,
};
pub use tax::{TaxMethod, TaxProfile, TaxRules};
