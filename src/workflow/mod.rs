//! Deal workflow gating: validation of a deal and its active scenario, and the
//! checks run before a deal changes state.

use crate::domain::{Deal, DealState, FieldName, Scenario, ScenarioTerms};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Shown to the desk, never blocks.
    Warning,
    /// Blocks advancing the deal.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingCustomer,
    MissingVin,
    InvalidVehiclePrice,
    MissingTerm,
    MissingApr,
    NegativeApr,
    MissingMoneyFactor,
    MissingResidual,
    MissingTaxJurisdiction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldName>,
    pub message: String,
}

impl ValidationIssue {
    fn error(code: IssueCode, field: Option<FieldName>, message: &str) -> Self {
        Self {
            code,
            severity: Severity::Error,
            field,
            message: message.to_string(),
        }
    }

    fn warning(code: IssueCode, field: Option<FieldName>, message: &str) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            field,
            message: message.to_string(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("cannot move deal from {from} to {to}")]
    InvalidTransition { from: DealState, to: DealState },
    #[error("deal has {} blocking issue(s)", blocking_count(.0))]
    Blocked(Vec<ValidationIssue>),
}

fn blocking_count(issues: &[ValidationIssue]) -> usize {
    issues.iter().filter(|i| i.is_blocking()).count()
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Validate a deal and its active scenario.
///
/// A missing VIN only warns while the deal is a draft.
pub fn validate(deal: &Deal, scenario: &Scenario) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if is_blank(&deal.customer_id) {
        issues.push(ValidationIssue::error(
            IssueCode::MissingCustomer,
            None,
            "a customer must be attached to the deal",
        ));
    }

    if is_blank(&deal.vin) {
        let message = "vehicle VIN is missing";
        issues.push(if deal.state == DealState::Draft {
            ValidationIssue::warning(IssueCode::MissingVin, None, message)
        } else {
            ValidationIssue::error(IssueCode::MissingVin, None, message)
        });
    }

    if !scenario.inputs.vehicle_price.map_or(false, |p| p.is_positive()) {
        issues.push(ValidationIssue::error(
            IssueCode::InvalidVehiclePrice,
            Some(FieldName::VehiclePrice),
            "vehicle price must be greater than zero",
        ));
    }

    if is_blank(&deal.tax_jurisdiction) {
        issues.push(ValidationIssue::error(
            IssueCode::MissingTaxJurisdiction,
            None,
            "tax jurisdiction is required",
        ));
    }

    match &scenario.terms {
        ScenarioTerms::Finance(terms) => {
            check_term(scenario, &mut issues);
            match terms.apr {
                None => issues.push(ValidationIssue::error(
                    IssueCode::MissingApr,
                    Some(FieldName::Apr),
                    "APR is required for a finance scenario",
                )),
                Some(apr) if apr.is_negative() => issues.push(ValidationIssue::error(
                    IssueCode::NegativeApr,
                    Some(FieldName::Apr),
                    "APR cannot be negative",
                )),
                Some(_) => {}
            }
        }
        ScenarioTerms::Lease(terms) => {
            check_term(scenario, &mut issues);
            if terms.money_factor.is_none() {
                issues.push(ValidationIssue::error(
                    IssueCode::MissingMoneyFactor,
                    Some(FieldName::MoneyFactor),
                    "money factor is required for a lease scenario",
                ));
            }
            if terms.residual_percent.is_none() {
                issues.push(ValidationIssue::error(
                    IssueCode::MissingResidual,
                    Some(FieldName::ResidualPercent),
                    "residual is required for a lease scenario",
                ));
            }
        }
        ScenarioTerms::Cash => {}
    }

    issues
}

fn check_term(scenario: &Scenario, issues: &mut Vec<ValidationIssue>) {
    if scenario.inputs.term_months.unwrap_or(0) == 0 {
        issues.push(ValidationIssue::error(
            IssueCode::MissingTerm,
            Some(FieldName::TermMonths),
            "term must be at least one month",
        ));
    }
}

/// Check whether `deal` may move to `target`.
///
/// Cancelling skips validation. Every other move requires a clean bill.
pub fn check_transition(
    deal: &Deal,
    scenario: &Scenario,
    target: DealState,
) -> Result<(), GateError> {
    if !deal.state.can_transition_to(target) {
        return Err(GateError::InvalidTransition {
            from: deal.state,
            to: target,
        });
    }
    if target == DealState::Cancelled {
        return Ok(());
    }

    // validate against the state being entered
    let mut prospective = deal.clone();
    prospective.state = target;
    let issues = validate(&prospective, scenario);
    if issues.iter().any(ValidationIssue::is_blocking) {
        return Err(GateError::Blocked(issues));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, DealId, FinanceTerms, ScenarioId, ScenarioType};
    use std::str::FromStr;

    fn complete_deal() -> Deal {
        let mut deal = Deal::new(DealId::new("d1"));
        deal.customer_id = Some("cust-1".to_string());
        deal.vin = Some("1HGCM82633A004352".to_string());
        deal.tax_jurisdiction = Some("CA-LA".to_string());
        deal
    }

    fn finance_scenario() -> Scenario {
        let mut scenario = Scenario::new(
            ScenarioId::new("s1"),
            DealId::new("d1"),
            ScenarioType::Finance,
        );
        scenario.inputs.vehicle_price = Some(Decimal::from_str("30000").unwrap());
        scenario.inputs.term_months = Some(60);
        scenario.terms = ScenarioTerms::Finance(FinanceTerms {
            apr: Some(Decimal::from_str("6").unwrap()),
        });
        scenario
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_complete_deal_is_clean() {
        assert!(validate(&complete_deal(), &finance_scenario()).is_empty());
    }

    #[test]
    fn test_missing_vin_warns_in_draft() {
        let mut deal = complete_deal();
        deal.vin = None;
        let issues = validate(&deal, &finance_scenario());
        assert_eq!(codes(&issues), vec![IssueCode::MissingVin]);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(check_transition(&deal, &finance_scenario(), DealState::InProgress).is_err());
    }

    #[test]
    fn test_missing_vin_blocks_after_draft() {
        let mut deal = complete_deal();
        deal.vin = Some("  ".to_string());
        deal.state = DealState::InProgress;
        let issues = validate(&deal, &finance_scenario());
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_finance_requires_apr_and_term() {
        let mut scenario = finance_scenario();
        scenario.inputs.term_months = Some(0);
        scenario.terms = ScenarioTerms::Finance(FinanceTerms { apr: None });
        let issues = validate(&complete_deal(), &scenario);
        assert_eq!(codes(&issues), vec![IssueCode::MissingTerm, IssueCode::MissingApr]);
    }

    #[test]
    fn test_lease_requires_money_factor_and_residual() {
        let mut scenario = finance_scenario();
        scenario.terms = ScenarioTerms::for_type(ScenarioType::Lease);
        let issues = validate(&complete_deal(), &scenario);
        assert_eq!(
            codes(&issues),
            vec![IssueCode::MissingMoneyFactor, IssueCode::MissingResidual]
        );
    }

    #[test]
    fn test_cash_needs_no_terms() {
        let mut scenario = finance_scenario();
        scenario.terms = ScenarioTerms::Cash;
        scenario.inputs.term_months = None;
        assert!(validate(&complete_deal(), &scenario).is_empty());
    }

    #[test]
    fn test_blocked_transition_lists_issues() {
        let mut deal = complete_deal();
        deal.customer_id = None;
        let mut scenario = finance_scenario();
        scenario.inputs.vehicle_price = Some(Decimal::zero());

        match check_transition(&deal, &scenario, DealState::InProgress) {
            Err(GateError::Blocked(issues)) => assert_eq!(
                codes(&issues),
                vec![IssueCode::MissingCustomer, IssueCode::InvalidVehiclePrice]
            ),
            other => panic!("expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_skips_validation() {
        let deal = Deal::new(DealId::new("d1"));
        assert!(check_transition(&deal, &finance_scenario(), DealState::Cancelled).is_ok());
    }

    #[test]
    fn test_illegal_transition() {
        let mut deal = complete_deal();
        deal.state = DealState::Approved;
        assert_eq!(
            check_transition(&deal, &finance_scenario(), DealState::Cancelled),
            Err(GateError::InvalidTransition {
                from: DealState::Approved,
                to: DealState::Cancelled,
            })
        );
    }

    #[test]
    fn test_blocked_message_counts_errors_only() {
        let err = GateError::Blocked(vec![
            ValidationIssue::warning(IssueCode::MissingVin, None, "vin"),
            ValidationIssue::error(IssueCode::MissingCustomer, None, "customer"),
        ]);
        assert_eq!(err.to_string(), "deal has 1 blocking issue(s)");
    }
}
