//! Tax profile produced by the jurisdiction tax service.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a jurisdiction applies tax to a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxMethod {
    /// Tax charged on each monthly payment.
    OnPayment,
    /// Tax on the adjusted capitalized cost, collected upfront.
    OnCapCost,
    /// Tax on the full selling price, collected upfront.
    OnPrice,
    Exempt,
}

impl TaxMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxMethod::OnPayment => "ON_PAYMENT",
            TaxMethod::OnCapCost => "ON_CAP_COST",
            TaxMethod::OnPrice => "ON_PRICE",
            TaxMethod::Exempt => "EXEMPT",
        }
    }
}

impl FromStr for TaxMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ON_PAYMENT" => Ok(TaxMethod::OnPayment),
            "ON_CAP_COST" => Ok(TaxMethod::OnCapCost),
            "ON_PRICE" => Ok(TaxMethod::OnPrice),
            "EXEMPT" => Ok(TaxMethod::Exempt),
            other => Err(format!("unknown tax method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxRules {
    pub trade_in_reduces_base: bool,
    pub fees_taxable: bool,
    pub rebates_taxable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxProfile {
    pub jurisdiction: String,
    /// Combined state and local rate as a fraction (0.0725 means 7.25%).
    pub combined_rate: Decimal,
    pub method: TaxMethod,
    #[serde(default)]
    pub rules: TaxRules,
}
