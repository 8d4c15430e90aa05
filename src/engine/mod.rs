//! Pure calculation engine: scenario snapshot in, derived figures out.
//!
//! [`derive`] never fails. Degenerate inputs (zero term, upside-down trade,
//! negative balances) still produce numbers, with a [`CalcWarning`] attached.
//! It reads only scenario inputs and never `Scenario::computed`, so applying its
//! outputs back to the scenario and deriving again yields the same result.

use crate::domain::{Decimal, DerivedOutputs, Scenario, ScenarioTerms, TaxProfile};
use serde::Serialize;
use std::fmt;

pub mod cash;
pub mod finance;
pub mod lease;
pub mod tax;

pub use tax::{strategy_for, LeaseTax, LeaseTaxBasis, LeaseTaxStrategy};

/// Non-fatal condition found while deriving a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalcWarning {
    NegativeTradeEquity { equity: Decimal },
    NegativeAmountFinanced { amount: Decimal },
    NegativeAdjustedCapCost { amount: Decimal },
    CapReductionsExceedGrossCap { reductions: Decimal, gross: Decimal },
    ResidualExceedsAdjustedCap { residual: Decimal, adjusted: Decimal },
    ZeroTerm,
    AmortizationOverflow,
}

impl fmt::Display for CalcWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcWarning::NegativeTradeEquity { equity } => {
                write!(f, "trade is upside down by {}", equity.abs().round_cents())
            }
            CalcWarning::NegativeAmountFinanced { amount } => {
                write!(f, "amount financed is negative ({})", amount.round_cents())
            }
            CalcWarning::NegativeAdjustedCapCost { amount } => {
                write!(f, "adjusted cap cost is negative ({})", amount.round_cents())
            }
            CalcWarning::CapReductionsExceedGrossCap { reductions, gross } => write!(
                f,
                "cap reductions {} exceed gross cap cost {}",
                reductions.round_cents(),
                gross.round_cents()
            ),
            CalcWarning::ResidualExceedsAdjustedCap { residual, adjusted } => write!(
                f,
                "residual value {} exceeds adjusted cap cost {}",
                residual.round_cents(),
                adjusted.round_cents()
            ),
            CalcWarning::ZeroTerm => f.write_str("term is zero"),
            CalcWarning::AmortizationOverflow => {
                f.write_str("rate and term are too large to amortize")
            }
        }
    }
}

/// Engine result: figures plus any warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub outputs: DerivedOutputs,
    pub warnings: Vec<CalcWarning>,
}

impl Calculation {
    pub fn has_warning(&self, predicate: impl Fn(&CalcWarning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }
}

/// Tax inputs for the lease tax step.
///
/// Without a jurisdiction profile the engine taxes lease payments at
/// `placeholder_rate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxContext {
    pub profile: Option<TaxProfile>,
    pub placeholder_rate: Decimal,
}

impl TaxContext {
    pub fn placeholder(rate: Decimal) -> Self {
        Self {
            profile: None,
            placeholder_rate: rate,
        }
    }

    pub fn with_profile(mut self, profile: Option<TaxProfile>) -> Self {
        self.profile = profile;
        self
    }
}

/// Derive all computed figures for `scenario`.
pub fn derive(scenario: &Scenario, tax: &TaxContext) -> Calculation {
    let mut warnings = Vec::new();
    let inputs = &scenario.inputs;

    let trade_equity = inputs.trade_equity();
    if trade_equity.is_negative() {
        warnings.push(CalcWarning::NegativeTradeEquity {
            equity: trade_equity,
        });
    }

    let outputs = match &scenario.terms {
        ScenarioTerms::Finance(terms) => finance::derive(inputs, terms, &mut warnings),
        ScenarioTerms::Lease(terms) => lease::derive(inputs, terms, tax, &mut warnings),
        ScenarioTerms::Cash => cash::derive(inputs),
    };

    Calculation { outputs, warnings }
}

/// Term in months, pushing a warning when it is missing or zero.
pub(crate) fn term_or_warn(term: Option<u32>, warnings: &mut Vec<CalcWarning>) -> u32 {
    let term = term.unwrap_or(0);
    if term == 0 {
        warnings.push(CalcWarning::ZeroTerm);
    }
    term
}
