use dealdesk::domain::{
    CommonUpdate, Deal, DealId, Decimal, FieldName, FinanceUpdate, LeaseUpdate, Scenario,
    ScenarioId, ScenarioType, UserId,
};
use dealdesk::engine::TaxContext;
use dealdesk::store::{SaveStatus, ScenarioStore, SnapshotOutcome, StoreError};
use dealdesk::{DeskSession, MockDeskBackend, SessionConfig, SessionError, SwitchPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

const DEBOUNCE: Duration = Duration::from_millis(1000);

fn d(value: &str) -> Decimal {
    Decimal::from_str_canonical(value).unwrap()
}

fn finance(id: &str) -> Scenario {
    let mut scenario = Scenario::new(ScenarioId::new(id), DealId::new("d1"), ScenarioType::Finance);
    scenario.inputs.vehicle_price = Some(d("20000"));
    scenario.inputs.term_months = Some(60);
    scenario
}

fn start(backend: &MockDeskBackend, scenario: Scenario) -> DeskSession {
    let store = ScenarioStore::new(scenario, TaxContext::placeholder(d("0.07")));
    DeskSession::spawn(
        store,
        Deal::new(DealId::new("d1")),
        Arc::new(backend.clone()),
        SessionConfig::new(UserId::new("desk-7")).with_debounce(DEBOUNCE),
    )
}

async fn wait_for(
    status: &mut watch::Receiver<SaveStatus>,
    want: impl Fn(&SaveStatus) -> bool,
) -> SaveStatus {
    loop {
        let current = status.borrow_and_update().clone();
        if want(&current) {
            return current;
        }
        status.changed().await.expect("session stopped");
    }
}

#[tokio::test(start_paused = true)]
async fn test_edits_within_quiet_period_coalesce_into_one_save() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));
    let mut status = session.status();

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;
    session
        .update_field(FinanceUpdate::Apr(Some(d("6"))))
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;
    session
        .update_field(CommonUpdate::TotalFees(d("650")))
        .await
        .unwrap();

    sleep(Duration::from_millis(999)).await;
    assert!(backend.persist_calls().is_empty());
    assert_eq!(*status.borrow(), SaveStatus::Pending);

    wait_for(&mut status, |s| *s == SaveStatus::Saved).await;
    let calls = backend.persist_calls();
    assert_eq!(calls.len(), 1);

    let fields: Vec<FieldName> = calls[0].updates.iter().map(|u| u.field_name()).collect();
    assert_eq!(fields, vec![FieldName::TotalFees, FieldName::Apr]);

    // one audit entry per field, from the pre-burst value to the latest
    let fees = calls[0]
        .change_log
        .iter()
        .find(|e| e.field_name == FieldName::TotalFees)
        .unwrap();
    assert_eq!(fees.old_value.to_string(), "0");
    assert_eq!(fees.new_value.to_string(), "650");
    assert_eq!(fees.acting_user_id, UserId::new("desk-7"));

    let server = backend.scenario(&ScenarioId::new("s1")).unwrap();
    assert_eq!(server.inputs.total_fees, d("650"));
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_save_goes_out_in_next_save() {
    let backend = MockDeskBackend::new()
        .with_scenario(finance("s1"))
        .with_latency(Duration::from_millis(500));
    let session = start(&backend, finance("s1"));
    let mut status = session.status();

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    wait_for(&mut status, |s| *s == SaveStatus::Saving).await;

    session
        .update_field(CommonUpdate::DownPayment(d("1000")))
        .await
        .unwrap();
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.dirty, vec![FieldName::DownPayment]);

    wait_for(&mut status, |s| *s == SaveStatus::Saved).await;
    let calls = backend.persist_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].updates[0].field_name(), FieldName::TotalFees);
    assert_eq!(calls[1].updates.len(), 1);
    assert_eq!(calls[1].updates[0].field_name(), FieldName::DownPayment);

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.dirty.is_empty());
    assert_eq!(snapshot.scenario.inputs.down_payment, d("1000"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_fields_dirty_until_retry() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    backend.fail_next_saves(1);
    let session = start(&backend, finance("s1"));
    let mut status = session.status();

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    let failed = wait_for(&mut status, SaveStatus::is_error).await;
    assert!(matches!(failed, SaveStatus::Error(msg) if msg.contains("simulated outage")));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.dirty, vec![FieldName::TotalFees]);
    assert_eq!(snapshot.scenario.inputs.total_fees, d("500"));

    // no silent retry
    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.persist_calls().len(), 1);

    assert!(session.retry_save().await.unwrap());
    wait_for(&mut status, |s| *s == SaveStatus::Saved).await;

    let calls = backend.persist_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].change_log[0].old_value.to_string(), "0");
    assert_eq!(calls[1].change_log[0].new_value.to_string(), "500");
}

#[tokio::test(start_paused = true)]
async fn test_next_edit_after_failed_save_resends_both_fields() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    backend.fail_next_saves(1);
    let session = start(&backend, finance("s1"));
    let mut status = session.status();

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    wait_for(&mut status, SaveStatus::is_error).await;
    assert_eq!(backend.persist_calls().len(), 1);

    session
        .update_field(CommonUpdate::DownPayment(d("1000")))
        .await
        .unwrap();
    wait_for(&mut status, |s| *s == SaveStatus::Pending).await;
    sleep(DEBOUNCE - Duration::from_millis(1)).await;
    assert_eq!(backend.persist_calls().len(), 1);

    wait_for(&mut status, |s| *s == SaveStatus::Saved).await;
    let calls = backend.persist_calls();
    assert_eq!(calls.len(), 2);

    let fields: Vec<FieldName> = calls[1].updates.iter().map(|u| u.field_name()).collect();
    assert_eq!(fields, vec![FieldName::DownPayment, FieldName::TotalFees]);
    let fees = calls[1]
        .change_log
        .iter()
        .find(|e| e.field_name == FieldName::TotalFees)
        .unwrap();
    // baseline from before the failed attempt
    assert_eq!(fees.old_value.to_string(), "0");
    assert_eq!(fees.new_value.to_string(), "500");
    assert_ne!(calls[0].save_id, calls[1].save_id);

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.dirty.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_skips_quiet_period() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    let began = Instant::now();
    session
        .update_field(CommonUpdate::TotalTax(d("1200")))
        .await
        .unwrap();
    assert_eq!(session.flush().await.unwrap(), SaveStatus::Saved);
    assert!(began.elapsed() < DEBOUNCE);
    assert_eq!(backend.persist_calls().len(), 1);

    // nothing left to save
    assert_eq!(session.flush().await.unwrap(), SaveStatus::Saved);
    assert_eq!(backend.persist_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switch_with_flush_saves_before_switching() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    let outcome = session
        .switch_scenario(finance("s2"), SwitchPolicy::Flush)
        .await
        .unwrap();
    assert_eq!(outcome, SnapshotOutcome::Switched { discarded: vec![] });

    assert_eq!(backend.persist_calls().len(), 1);
    let server = backend.scenario(&ScenarioId::new("s1")).unwrap();
    assert_eq!(server.inputs.total_fees, d("500"));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.scenario.id, ScenarioId::new("s2"));
    assert!(snapshot.dirty.is_empty());
    assert_eq!(snapshot.status, SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_switch_with_flush_refuses_when_save_fails() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    backend.fail_next_saves(1);
    let session = start(&backend, finance("s1"));

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    let err = session
        .switch_scenario(finance("s2"), SwitchPolicy::Flush)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SaveFailed(_)));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.scenario.id, ScenarioId::new("s1"));
    assert_eq!(snapshot.dirty, vec![FieldName::TotalFees]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_with_discard_never_saves() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    let outcome = session
        .switch_scenario(finance("s2"), SwitchPolicy::Discard)
        .await
        .unwrap();
    assert_eq!(outcome, SnapshotOutcome::Switched { discarded: vec![] });

    sleep(DEBOUNCE * 3).await;
    assert!(backend.persist_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_snapshot_ignored_while_dirty() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    let mut pushed = finance("s1");
    pushed.inputs.total_fees = d("999");
    assert_eq!(
        session.receive_server_snapshot(pushed.clone()).await.unwrap(),
        SnapshotOutcome::Adopted
    );

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    pushed.inputs.total_fees = d("1");
    assert_eq!(
        session.receive_server_snapshot(pushed).await.unwrap(),
        SnapshotOutcome::Ignored
    );
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.scenario.inputs.total_fees, d("500"));
}

#[tokio::test(start_paused = true)]
async fn test_save_result_after_switch_is_discarded() {
    let backend = MockDeskBackend::new()
        .with_scenario(finance("s1"))
        .with_latency(Duration::from_millis(500));
    let session = start(&backend, finance("s1"));
    let mut status = session.status();

    session
        .update_field(CommonUpdate::TotalFees(d("500")))
        .await
        .unwrap();
    wait_for(&mut status, |s| *s == SaveStatus::Saving).await;

    let outcome = session.receive_server_snapshot(finance("s2")).await.unwrap();
    assert_eq!(
        outcome,
        SnapshotOutcome::Switched {
            discarded: vec![FieldName::TotalFees]
        }
    );

    sleep(Duration::from_millis(600)).await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.scenario.id, ScenarioId::new("s2"));
    assert_eq!(snapshot.status, SaveStatus::Idle);
    assert_eq!(snapshot.scenario.inputs.total_fees, Decimal::zero());
}

#[tokio::test(start_paused = true)]
async fn test_lease_field_rejected_on_finance_session() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    let err = session
        .update_fields(vec![
            CommonUpdate::TotalFees(d("500")).into(),
            LeaseUpdate::MoneyFactor(Some(d("0.0025"))).into(),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Store(StoreError::Field(_))));

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.dirty.is_empty());
    assert_eq!(snapshot.scenario.inputs.total_fees, Decimal::zero());
}

#[tokio::test(start_paused = true)]
async fn test_discard_reverts_to_pre_burst_values() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    session
        .update_field(CommonUpdate::VehiclePrice(Some(d("21000"))))
        .await
        .unwrap();
    session
        .update_field(CommonUpdate::VehiclePrice(Some(d("22000"))))
        .await
        .unwrap();
    assert_eq!(
        session.discard_changes().await.unwrap(),
        vec![FieldName::VehiclePrice]
    );

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.scenario.inputs.vehicle_price, Some(d("20000")));
    sleep(DEBOUNCE * 2).await;
    assert!(backend.persist_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_edits() {
    let backend = MockDeskBackend::new().with_scenario(finance("s1"));
    let session = start(&backend, finance("s1"));

    session
        .update_field(CommonUpdate::TradeAllowance(d("4000")))
        .await
        .unwrap();
    assert_eq!(session.shutdown().await.unwrap(), SaveStatus::Saved);
    assert_eq!(backend.persist_calls().len(), 1);

    assert!(matches!(
        session.snapshot().await,
        Err(SessionError::Closed)
    ));
}
