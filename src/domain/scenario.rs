//! Scenario: one financial structuring of a deal.

use crate::domain::{DealId, Decimal, ScenarioId};
use serde::{Deserialize, Serialize};

/// Deal type a scenario is structured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    Finance,
    Lease,
    Cash,
}

impl ScenarioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioType::Finance => "FINANCE",
            ScenarioType::Lease => "LEASE",
            ScenarioType::Cash => "CASH",
        }
    }
}

impl std::fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aftermarket product sold with the vehicle (service contract, GAP, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub label: String,
    pub price: Decimal,
}

impl ProductLine {
    pub fn new(label: impl Into<String>, price: Decimal) -> Self {
        Self {
            label: label.into(),
            price,
        }
    }
}

/// Inputs shared by every scenario type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealInputs {
    /// Selling price. `None` until the desk enters one.
    pub vehicle_price: Option<Decimal>,
    pub trade_allowance: Decimal,
    pub trade_payoff: Decimal,
    /// Down payment for finance, cash down (cap reduction) for lease.
    pub down_payment: Decimal,
    pub manufacturer_rebate: Decimal,
    pub other_incentives: Decimal,
    pub total_fees: Decimal,
    pub total_tax: Decimal,
    pub term_months: Option<u32>,
    pub products: Vec<ProductLine>,
}

impl DealInputs {
    /// Trade allowance minus payoff. Negative when the trade is upside down.
    pub fn trade_equity(&self) -> Decimal {
        self.trade_allowance - self.trade_payoff
    }

    pub fn aftermarket_total(&self) -> Decimal {
        self.products.iter().map(|p| p.price).sum()
    }

    pub fn selling_price(&self) -> Decimal {
        self.vehicle_price.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinanceTerms {
    /// Annual percentage rate, in percent (6 means 6%).
    pub apr: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaseTerms {
    pub money_factor: Option<Decimal>,
    /// Residual as a percentage of MSRP (60 means 60%).
    pub residual_percent: Option<Decimal>,
    pub msrp: Decimal,
    pub acquisition_fee: Decimal,
}

/// Type-specific terms. A finance scenario has no lease fields and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scenarioType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioTerms {
    Finance(FinanceTerms),
    Lease(LeaseTerms),
    Cash,
}

impl ScenarioTerms {
    pub fn for_type(scenario_type: ScenarioType) -> Self {
        match scenario_type {
            ScenarioType::Finance => ScenarioTerms::Finance(FinanceTerms::default()),
            ScenarioType::Lease => ScenarioTerms::Lease(LeaseTerms::default()),
            ScenarioType::Cash => ScenarioTerms::Cash,
        }
    }

    pub fn scenario_type(&self) -> ScenarioType {
        match self {
            ScenarioTerms::Finance(_) => ScenarioType::Finance,
            ScenarioTerms::Lease(_) => ScenarioType::Lease,
            ScenarioTerms::Cash => ScenarioType::Cash,
        }
    }
}

/// Lease-only multi-step figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseBreakdown {
    pub gross_cap_cost: Decimal,
    pub cap_reductions: Decimal,
    pub adjusted_cap_cost: Decimal,
    pub residual_value: Decimal,
    pub depreciation: Decimal,
    pub monthly_depreciation_charge: Decimal,
    pub monthly_rent_charge: Decimal,
    pub base_monthly_payment: Decimal,
    pub monthly_tax: Decimal,
    pub upfront_tax: Decimal,
    pub drive_off_total: Decimal,
}

impl LeaseBreakdown {
    pub fn rounded(&self) -> Self {
        Self {
            gross_cap_cost: self.gross_cap_cost.round_cents(),
            cap_reductions: self.cap_reductions.round_cents(),
            adjusted_cap_cost: self.adjusted_cap_cost.round_cents(),
            residual_value: self.residual_value.round_cents(),
            depreciation: self.depreciation.round_cents(),
            monthly_depreciation_charge: self.monthly_depreciation_charge.round_cents(),
            monthly_rent_charge: self.monthly_rent_charge.round_cents(),
            base_monthly_payment: self.base_monthly_payment.round_cents(),
            monthly_tax: self.monthly_tax.round_cents(),
            upfront_tax: self.upfront_tax.round_cents(),
            drive_off_total: self.drive_off_total.round_cents(),
        }
    }
}

/// Figures derived by the calculation engine.
///
/// Held at full precision; [`DerivedOutputs::rounded`] gives the cent view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedOutputs {
    pub trade_equity: Decimal,
    pub aftermarket_total: Decimal,
    /// Amount financed for finance, adjusted cap cost for lease, zero for cash.
    pub amount_financed: Decimal,
    pub monthly_payment: Decimal,
    pub total_cost: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<LeaseBreakdown>,
}

impl DerivedOutputs {
    pub fn rounded(&self) -> Self {
        Self {
            trade_equity: self.trade_equity.round_cents(),
            aftermarket_total: self.aftermarket_total.round_cents(),
            amount_financed: self.amount_financed.round_cents(),
            monthly_payment: self.monthly_payment.round_cents(),
            total_cost: self.total_cost.round_cents(),
            lease: self.lease.as_ref().map(LeaseBreakdown::rounded),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub deal_id: DealId,
    #[serde(default)]
    pub inputs: DealInputs,
    pub terms: ScenarioTerms,
    /// Last engine outputs applied to this scenario. Never read by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<DerivedOutputs>,
}

impl Scenario {
    pub fn new(id: ScenarioId, deal_id: DealId, scenario_type: ScenarioType) -> Self {
        Self {
            id,
            deal_id,
            inputs: DealInputs::default(),
            terms: ScenarioTerms::for_type(scenario_type),
            computed: None,
        }
    }

    pub fn scenario_type(&self) -> ScenarioType {
        self.terms.scenario_type()
    }

    /// Replace the computed fields with a fresh engine result.
    pub fn apply_outputs(&mut self, outputs: DerivedOutputs) {
        self.computed = Some(outputs);
    }
}
