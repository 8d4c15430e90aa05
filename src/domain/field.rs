//! Typed scenario field updates.
//!
//! Updates are split by the part of the scenario they write: [`CommonUpdate`]
//! for inputs every deal type shares, [`FinanceUpdate`] and [`LeaseUpdate`] for
//! type-specific terms. A lease update can only ever reach `LeaseTerms`; applying
//! it to a finance scenario is rejected instead of being stored somewhere inert.

use crate::domain::{Decimal, ProductLine, Scenario, ScenarioTerms, ScenarioType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of an updatable scenario field. Keys the dirty set and the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    VehiclePrice,
    TradeAllowance,
    TradePayoff,
    DownPayment,
    ManufacturerRebate,
    OtherIncentives,
    TotalFees,
    TotalTax,
    TermMonths,
    Products,
    Apr,
    MoneyFactor,
    ResidualPercent,
    Msrp,
    AcquisitionFee,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::VehiclePrice => "vehiclePrice",
            FieldName::TradeAllowance => "tradeAllowance",
            FieldName::TradePayoff => "tradePayoff",
            FieldName::DownPayment => "downPayment",
            FieldName::ManufacturerRebate => "manufacturerRebate",
            FieldName::OtherIncentives => "otherIncentives",
            FieldName::TotalFees => "totalFees",
            FieldName::TotalTax => "totalTax",
            FieldName::TermMonths => "termMonths",
            FieldName::Products => "products",
            FieldName::Apr => "apr",
            FieldName::MoneyFactor => "moneyFactor",
            FieldName::ResidualPercent => "residualPercent",
            FieldName::Msrp => "msrp",
            FieldName::AcquisitionFee => "acquisitionFee",
        }
    }

    /// Scenario type this field belongs to, or `None` for shared inputs.
    pub fn owner(&self) -> Option<ScenarioType> {
        match self {
            FieldName::Apr => Some(ScenarioType::Finance),
            FieldName::MoneyFactor
            | FieldName::ResidualPercent
            | FieldName::Msrp
            | FieldName::AcquisitionFee => Some(ScenarioType::Lease),
            _ => None,
        }
    }

    pub fn applies_to(&self, scenario_type: ScenarioType) -> bool {
        self.owner().map_or(true, |owner| owner == scenario_type)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a field value, as recorded in the previous-value map and audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Unset,
    Amount(Decimal),
    Months(u32),
    Products(Vec<ProductLine>),
}

impl FieldValue {
    fn from_amount(value: Option<Decimal>) -> Self {
        value.map_or(FieldValue::Unset, FieldValue::Amount)
    }

    fn from_months(value: Option<u32>) -> Self {
        value.map_or(FieldValue::Unset, FieldValue::Months)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unset => f.write_str("-"),
            FieldValue::Amount(d) => write!(f, "{}", d),
            FieldValue::Months(m) => write!(f, "{}", m),
            FieldValue::Products(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|p| format!("{}={}", p.label, p.price))
                    .collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field {field} does not apply to a {scenario_type} scenario")]
    NotApplicable {
        field: FieldName,
        scenario_type: ScenarioType,
    },
    #[error("value {value} is not valid for field {field}")]
    ValueMismatch { field: FieldName, value: String },
}

/// Update to an input shared by every deal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum CommonUpdate {
    VehiclePrice(Option<Decimal>),
    TradeAllowance(Decimal),
    TradePayoff(Decimal),
    DownPayment(Decimal),
    ManufacturerRebate(Decimal),
    OtherIncentives(Decimal),
    TotalFees(Decimal),
    TotalTax(Decimal),
    TermMonths(Option<u32>),
    Products(Vec<ProductLine>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FinanceUpdate {
    Apr(Option<Decimal>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum LeaseUpdate {
    MoneyFactor(Option<Decimal>),
    ResidualPercent(Option<Decimal>),
    Msrp(Decimal),
    AcquisitionFee(Decimal),
}

/// One field assignment. Serialized as `{"field": "apr", "value": "5.9"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioUpdate {
    Common(CommonUpdate),
    Finance(FinanceUpdate),
    Lease(LeaseUpdate),
}

impl From<CommonUpdate> for ScenarioUpdate {
    fn from(update: CommonUpdate) -> Self {
        ScenarioUpdate::Common(update)
    }
}

impl From<FinanceUpdate> for ScenarioUpdate {
    fn from(update: FinanceUpdate) -> Self {
        ScenarioUpdate::Finance(update)
    }
}

impl From<LeaseUpdate> for ScenarioUpdate {
    fn from(update: LeaseUpdate) -> Self {
        ScenarioUpdate::Lease(update)
    }
}

impl ScenarioUpdate {
    pub fn field_name(&self) -> FieldName {
        match self {
            ScenarioUpdate::Common(u) => match u {
                CommonUpdate::VehiclePrice(_) => FieldName::VehiclePrice,
                CommonUpdate::TradeAllowance(_) => FieldName::TradeAllowance,
                CommonUpdate::TradePayoff(_) => FieldName::TradePayoff,
                CommonUpdate::DownPayment(_) => FieldName::DownPayment,
                CommonUpdate::ManufacturerRebate(_) => FieldName::ManufacturerRebate,
                CommonUpdate::OtherIncentives(_) => FieldName::OtherIncentives,
                CommonUpdate::TotalFees(_) => FieldName::TotalFees,
                CommonUpdate::TotalTax(_) => FieldName::TotalTax,
                CommonUpdate::TermMonths(_) => FieldName::TermMonths,
                CommonUpdate::Products(_) => FieldName::Products,
            },
            ScenarioUpdate::Finance(FinanceUpdate::Apr(_)) => FieldName::Apr,
            ScenarioUpdate::Lease(u) => match u {
                LeaseUpdate::MoneyFactor(_) => FieldName::MoneyFactor,
                LeaseUpdate::ResidualPercent(_) => FieldName::ResidualPercent,
                LeaseUpdate::Msrp(_) => FieldName::Msrp,
                LeaseUpdate::AcquisitionFee(_) => FieldName::AcquisitionFee,
            },
        }
    }

    /// The value this update assigns.
    pub fn value(&self) -> FieldValue {
        match self {
            ScenarioUpdate::Common(u) => match u {
                CommonUpdate::VehiclePrice(v) => FieldValue::from_amount(*v),
                CommonUpdate::TradeAllowance(v)
                | CommonUpdate::TradePayoff(v)
                | CommonUpdate::DownPayment(v)
                | CommonUpdate::ManufacturerRebate(v)
                | CommonUpdate::OtherIncentives(v)
                | CommonUpdate::TotalFees(v)
                | CommonUpdate::TotalTax(v) => FieldValue::Amount(*v),
                CommonUpdate::TermMonths(v) => FieldValue::from_months(*v),
                CommonUpdate::Products(v) => FieldValue::Products(v.clone()),
            },
            ScenarioUpdate::Finance(FinanceUpdate::Apr(v)) => FieldValue::from_amount(*v),
            ScenarioUpdate::Lease(u) => match u {
                LeaseUpdate::MoneyFactor(v) | LeaseUpdate::ResidualPercent(v) => {
                    FieldValue::from_amount(*v)
                }
                LeaseUpdate::Msrp(v) | LeaseUpdate::AcquisitionFee(v) => FieldValue::Amount(*v),
            },
        }
    }

    /// Rebuild an update from a recorded field value.
    ///
    /// # Errors
    /// Returns `ValueMismatch` when the value's kind does not fit the field.
    pub fn from_value(field: FieldName, value: &FieldValue) -> Result<Self, FieldError> {
        let mismatch = || FieldError::ValueMismatch {
            field,
            value: value.to_string(),
        };
        let optional_amount = || match value {
            FieldValue::Unset => Ok(None),
            FieldValue::Amount(d) => Ok(Some(*d)),
            _ => Err(mismatch()),
        };
        let amount = || match value {
            FieldValue::Amount(d) => Ok(*d),
            _ => Err(mismatch()),
        };

        let update = match field {
            FieldName::VehiclePrice => CommonUpdate::VehiclePrice(optional_amount()?).into(),
            FieldName::TradeAllowance => CommonUpdate::TradeAllowance(amount()?).into(),
            FieldName::TradePayoff => CommonUpdate::TradePayoff(amount()?).into(),
            FieldName::DownPayment => CommonUpdate::DownPayment(amount()?).into(),
            FieldName::ManufacturerRebate => CommonUpdate::ManufacturerRebate(amount()?).into(),
            FieldName::OtherIncentives => CommonUpdate::OtherIncentives(amount()?).into(),
            FieldName::TotalFees => CommonUpdate::TotalFees(amount()?).into(),
            FieldName::TotalTax => CommonUpdate::TotalTax(amount()?).into(),
            FieldName::TermMonths => match value {
                FieldValue::Unset => CommonUpdate::TermMonths(None).into(),
                FieldValue::Months(m) => CommonUpdate::TermMonths(Some(*m)).into(),
                _ => return Err(mismatch()),
            },
            FieldName::Products => match value {
                FieldValue::Products(items) => CommonUpdate::Products(items.clone()).into(),
                _ => return Err(mismatch()),
            },
            FieldName::Apr => FinanceUpdate::Apr(optional_amount()?).into(),
            FieldName::MoneyFactor => LeaseUpdate::MoneyFactor(optional_amount()?).into(),
            FieldName::ResidualPercent => LeaseUpdate::ResidualPercent(optional_amount()?).into(),
            FieldName::Msrp => LeaseUpdate::Msrp(amount()?).into(),
            FieldName::AcquisitionFee => LeaseUpdate::AcquisitionFee(amount()?).into(),
        };
        Ok(update)
    }
}

impl Scenario {
    /// Check that `update` targets a field this scenario's type has.
    pub fn check_update(&self, update: &ScenarioUpdate) -> Result<(), FieldError> {
        let scenario_type = self.scenario_type();
        let compatible = match (update, &self.terms) {
            (ScenarioUpdate::Common(_), _) => true,
            (ScenarioUpdate::Finance(_), ScenarioTerms::Finance(_)) => true,
            (ScenarioUpdate::Lease(_), ScenarioTerms::Lease(_)) => true,
            _ => false,
        };
        if compatible {
            Ok(())
        } else {
            Err(FieldError::NotApplicable {
                field: update.field_name(),
                scenario_type,
            })
        }
    }

    /// Apply `update` in place and return the value it replaced.
    pub fn apply_update(&mut self, update: &ScenarioUpdate) -> Result<FieldValue, FieldError> {
        self.check_update(update)?;
        let field = update.field_name();
        let scenario_type = self.scenario_type();
        let previous = self.field_value(field).unwrap_or(FieldValue::Unset);

        let inputs = &mut self.inputs;
        match (update, &mut self.terms) {
            (ScenarioUpdate::Common(u), _) => match u.clone() {
                CommonUpdate::VehiclePrice(v) => inputs.vehicle_price = v,
                CommonUpdate::TradeAllowance(v) => inputs.trade_allowance = v,
                CommonUpdate::TradePayoff(v) => inputs.trade_payoff = v,
                CommonUpdate::DownPayment(v) => inputs.down_payment = v,
                CommonUpdate::ManufacturerRebate(v) => inputs.manufacturer_rebate = v,
                CommonUpdate::OtherIncentives(v) => inputs.other_incentives = v,
                CommonUpdate::TotalFees(v) => inputs.total_fees = v,
                CommonUpdate::TotalTax(v) => inputs.total_tax = v,
                CommonUpdate::TermMonths(v) => inputs.term_months = v,
                CommonUpdate::Products(v) => inputs.products = v,
            },
            (ScenarioUpdate::Finance(FinanceUpdate::Apr(v)), ScenarioTerms::Finance(terms)) => {
                terms.apr = *v;
            }
            (ScenarioUpdate::Lease(u), ScenarioTerms::Lease(terms)) => match u {
                LeaseUpdate::MoneyFactor(v) => terms.money_factor = *v,
                LeaseUpdate::ResidualPercent(v) => terms.residual_percent = *v,
                LeaseUpdate::Msrp(v) => terms.msrp = *v,
                LeaseUpdate::AcquisitionFee(v) => terms.acquisition_fee = *v,
            },
            _ => {
                return Err(FieldError::NotApplicable {
                    field,
                    scenario_type,
                })
            }
        }
        Ok(previous)
    }

    /// Current value of `field`, or `None` when the field does not exist on
    /// this scenario's type.
    pub fn field_value(&self, field: FieldName) -> Option<FieldValue> {
        let inputs = &self.inputs;
        let value = match field {
            FieldName::VehiclePrice => FieldValue::from_amount(inputs.vehicle_price),
            FieldName::TradeAllowance => FieldValue::Amount(inputs.trade_allowance),
            FieldName::TradePayoff => FieldValue::Amount(inputs.trade_payoff),
            FieldName::DownPayment => FieldValue::Amount(inputs.down_payment),
            FieldName::ManufacturerRebate => FieldValue::Amount(inputs.manufacturer_rebate),
            FieldName::OtherIncentives => FieldValue::Amount(inputs.other_incentives),
            FieldName::TotalFees => FieldValue::Amount(inputs.total_fees),
            FieldName::TotalTax => FieldValue::Amount(inputs.total_tax),
            FieldName::TermMonths => FieldValue::from_months(inputs.term_months),
            FieldName::Products => FieldValue::Products(inputs.products.clone()),
            FieldName::Apr => match &self.terms {
                ScenarioTerms::Finance(t) => FieldValue::from_amount(t.apr),
                _ => return None,
            },
            FieldName::MoneyFactor
            | FieldName::ResidualPercent
            | FieldName::Msrp
            | FieldName::AcquisitionFee => match &self.terms {
                ScenarioTerms::Lease(t) => match field {
                    FieldName::MoneyFactor => FieldValue::from_amount(t.money_factor),
                    FieldName::ResidualPercent => FieldValue::from_amount(t.residual_percent),
                    FieldName::Msrp => FieldValue::Amount(t.msrp),
                    _ => FieldValue::Amount(t.acquisition_fee),
                },
                _ => return None,
            },
        };
        Some(value)
    }

    /// An update that re-assigns the current value of `field`.
    pub fn current_update(&self, field: FieldName) -> Option<ScenarioUpdate> {
        self.field_value(field)
            .and_then(|value| ScenarioUpdate::from_value(field, &value).ok())
    }
}
