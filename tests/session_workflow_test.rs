use dealdesk::domain::{
    CommonUpdate, Deal, DealId, DealState, Decimal, FinanceTerms, LeaseTerms, Scenario,
    ScenarioId, ScenarioTerms, ScenarioType, TaxMethod, TaxProfile, TaxRules, UserId,
};
use dealdesk::engine::TaxContext;
use dealdesk::store::ScenarioStore;
use dealdesk::workflow::{GateError, IssueCode, Severity};
use dealdesk::{DeskSession, MockDeskBackend, SessionConfig, SessionError};
use std::sync::Arc;

fn d(value: &str) -> Decimal {
    Decimal::from_str_canonical(value).unwrap()
}

fn deal() -> Deal {
    let mut deal = Deal::new(DealId::new("d1"));
    deal.customer_id = Some("cust-1".to_string());
    deal.tax_jurisdiction = Some("TX".to_string());
    deal.vin = Some("1HGCM82633A004352".to_string());
    deal
}

fn finance() -> Scenario {
    let mut scenario = Scenario::new(ScenarioId::new("s1"), DealId::new("d1"), ScenarioType::Finance);
    scenario.inputs.vehicle_price = Some(d("20000"));
    scenario.inputs.term_months = Some(60);
    scenario.terms = ScenarioTerms::Finance(FinanceTerms { apr: Some(d("6")) });
    scenario
}

fn lease() -> Scenario {
    let mut scenario = Scenario::new(ScenarioId::new("s1"), DealId::new("d1"), ScenarioType::Lease);
    scenario.inputs.vehicle_price = Some(d("30000"));
    scenario.inputs.term_months = Some(36);
    scenario.terms = ScenarioTerms::Lease(LeaseTerms {
        money_factor: Some(d("0.00125")),
        residual_percent: Some(d("60")),
        msrp: d("30000"),
        acquisition_fee: Decimal::zero(),
    });
    scenario
}

fn texas() -> TaxProfile {
    TaxProfile {
        jurisdiction: "TX".to_string(),
        combined_rate: d("0.0625"),
        method: TaxMethod::OnPrice,
        rules: TaxRules::default(),
    }
}

fn start(backend: &MockDeskBackend, deal: Deal, scenario: Scenario) -> DeskSession {
    let store = ScenarioStore::new(scenario, TaxContext::placeholder(d("0.07")));
    DeskSession::spawn(
        store,
        deal,
        Arc::new(backend.clone()),
        SessionConfig::new(UserId::new("desk-7")),
    )
}

#[tokio::test]
async fn test_recalculated_profile_replaces_placeholder() {
    let backend = MockDeskBackend::new().with_tax_profile(texas());
    let session = start(&backend, deal(), lease());

    let before = session.snapshot().await.unwrap();
    let lease_before = before.calculation.outputs.lease.unwrap();
    assert_eq!(lease_before.monthly_tax.round_cents(), d("27.53"));

    let profile = session.recalculate_tax().await.unwrap();
    assert_eq!(profile, texas());
    assert_eq!(backend.tax_calls(), 1);

    let after = session.snapshot().await.unwrap();
    let lease_after = after.calculation.outputs.lease.unwrap();
    assert!(lease_after.monthly_tax.is_zero());
    assert_eq!(lease_after.upfront_tax, d("1875"));
    assert_eq!(after.deal.tax_profile, Some(texas()));
}

#[tokio::test]
async fn test_failed_recalculation_keeps_previous_profile() {
    let backend = MockDeskBackend::new();
    let mut with_profile = deal();
    with_profile.tax_profile = Some(texas());
    let session = start(&backend, with_profile, lease());

    let err = session.recalculate_tax().await.unwrap_err();
    assert!(matches!(err, SessionError::Recalculation(_)));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.deal.tax_profile, Some(texas()));
    let lease = snapshot.calculation.outputs.lease.unwrap();
    assert_eq!(lease.upfront_tax, d("1875"));
}

#[tokio::test]
async fn test_advance_blocked_without_customer() {
    let mut incomplete = deal();
    incomplete.customer_id = None;
    let backend = MockDeskBackend::new().with_deal(incomplete.clone());
    let session = start(&backend, incomplete, finance());

    match session.advance_deal().await {
        Err(SessionError::Gate(GateError::Blocked(issues))) => {
            assert!(issues
                .iter()
                .any(|i| i.code == IssueCode::MissingCustomer && i.severity == Severity::Error));
        }
        other => panic!("expected blocked advance, got {:?}", other),
    }
    assert!(backend.state_calls().is_empty());
}

#[tokio::test]
async fn test_advance_walks_the_workflow() {
    let backend = MockDeskBackend::new().with_deal(deal());
    let session = start(&backend, deal(), finance());

    assert_eq!(session.advance_deal().await.unwrap().state, DealState::InProgress);
    assert_eq!(session.advance_deal().await.unwrap().state, DealState::Approved);
    assert!(matches!(
        session.advance_deal().await,
        Err(SessionError::NoNextState(DealState::Approved))
    ));
    assert!(matches!(
        session.cancel_deal().await,
        Err(SessionError::Gate(GateError::InvalidTransition { .. }))
    ));
    assert_eq!(
        backend.state_calls(),
        vec![
            (DealId::new("d1"), DealState::InProgress),
            (DealId::new("d1"), DealState::Approved),
        ]
    );
}

#[tokio::test]
async fn test_missing_vin_only_warns_in_draft() {
    let mut no_vin = deal();
    no_vin.vin = None;
    let backend = MockDeskBackend::new().with_deal(no_vin.clone());
    let session = start(&backend, no_vin, finance());

    let issues = session.validate().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::MissingVin);
    assert_eq!(issues[0].severity, Severity::Warning);

    // entering IN_PROGRESS without a VIN is blocked
    assert!(matches!(
        session.advance_deal().await,
        Err(SessionError::Gate(GateError::Blocked(_)))
    ));
}

#[tokio::test]
async fn test_cancel_skips_validation() {
    let incomplete = Deal::new(DealId::new("d1"));
    let backend = MockDeskBackend::new().with_deal(incomplete.clone());
    let session = start(&backend, incomplete, finance());

    assert_eq!(session.cancel_deal().await.unwrap().state, DealState::Cancelled);
}

#[tokio::test]
async fn test_validation_follows_live_edits() {
    let backend = MockDeskBackend::new().with_deal(deal());
    let session = start(&backend, deal(), finance());
    assert!(session.validate().await.unwrap().is_empty());

    session
        .update_field(CommonUpdate::VehiclePrice(None))
        .await
        .unwrap();
    let issues = session.validate().await.unwrap();
    assert_eq!(issues[0].code, IssueCode::InvalidVehiclePrice);
}
