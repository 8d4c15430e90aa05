//! Session worker task: the single owner of the scenario store.

use super::{Command, SessionConfig, SessionError, SessionSnapshot, SwitchPolicy};
use crate::backend::{BackendError, DeskBackend, TaxRecalcResponse};
use crate::domain::{Deal, DealState, Scenario, TaxProfile, TimeMs};
use crate::store::{SaveOutcome, SaveStatus, SaveTicket, ScenarioStore, SnapshotOutcome};
use crate::workflow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Completion of a backend call made from a spawned task.
pub(crate) enum Event {
    SaveFinished {
        ticket: SaveTicket,
        result: Result<Scenario, BackendError>,
    },
    TaxFinished {
        result: Result<TaxRecalcResponse, BackendError>,
        reply: oneshot::Sender<Result<TaxProfile, SessionError>>,
    },
    TransitionFinished {
        target: DealState,
        result: Result<Deal, BackendError>,
        reply: oneshot::Sender<Result<Deal, SessionError>>,
    },
}

/// Caller waiting for the store to have nothing left to save.
enum Waiter {
    Flush(oneshot::Sender<SaveStatus>),
    Switch {
        next: Scenario,
        reply: oneshot::Sender<Result<SnapshotOutcome, SessionError>>,
    },
}

pub(crate) struct SessionWorker {
    store: ScenarioStore,
    deal: Deal,
    backend: Arc<dyn DeskBackend>,
    config: SessionConfig,
    status_tx: watch::Sender<SaveStatus>,
    events_tx: mpsc::UnboundedSender<Event>,
    deadline: Option<Instant>,
    waiters: Vec<Waiter>,
}

impl SessionWorker {
    pub(crate) fn new(
        mut store: ScenarioStore,
        deal: Deal,
        backend: Arc<dyn DeskBackend>,
        config: SessionConfig,
        status_tx: watch::Sender<SaveStatus>,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        if deal.tax_profile.is_some() && store.tax_context().profile != deal.tax_profile {
            store.set_tax_profile(deal.tax_profile.clone());
        }
        Self {
            store,
            deal,
            backend,
            config,
            status_tx,
            events_tx,
            deadline: None,
            waiters: Vec::new(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!(
            "Session started for deal {} on scenario {}",
            self.deal.id,
            self.store.scenario().id
        );

        loop {
            let deadline = self.deadline;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.drain(&mut events).await;
                        self.publish_status();
                        let _ = reply.send(self.store.status().clone());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.drain(&mut events).await;
                        break;
                    }
                },

                Some(event) = events.recv() => self.handle_event(event),

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    self.dispatch_save();
                }
            }

            self.publish_status();
        }

        self.publish_status();
        info!("Session stopped for deal {}", self.deal.id);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Update { updates, reply } => {
                let applied = !updates.is_empty();
                let result = self
                    .store
                    .update_fields(updates)
                    .cloned()
                    .map_err(SessionError::from);
                if result.is_ok() && applied {
                    self.deadline = Some(Instant::now() + self.config.debounce);
                }
                let _ = reply.send(result);
            }
            Command::ReceiveSnapshot { scenario, reply } => {
                let outcome = self.store.receive_server_snapshot(scenario);
                if matches!(outcome, SnapshotOutcome::Switched { .. }) {
                    self.after_switch();
                }
                let _ = reply.send(outcome);
            }
            Command::ReceiveDeal { deal } => {
                if deal.id != self.deal.id {
                    warn!("Ignoring deal {} pushed to session for {}", deal.id, self.deal.id);
                    return;
                }
                if deal.tax_profile != self.deal.tax_profile {
                    self.store.set_tax_profile(deal.tax_profile.clone());
                }
                self.deal = deal;
            }
            Command::Switch {
                next,
                policy,
                reply,
            } => match policy {
                SwitchPolicy::Discard => {
                    let reverted = self.store.discard_changes();
                    if !reverted.is_empty() {
                        info!("Discarded {:?} before switching to {}", reverted, next.id);
                    }
                    let outcome = self.switch_to(next);
                    let _ = reply.send(Ok(outcome));
                }
                SwitchPolicy::Flush => {
                    self.waiters.push(Waiter::Switch { next, reply });
                    self.deadline = None;
                    if !self.store.is_saving() {
                        self.dispatch_save();
                    }
                    self.settle_waiters();
                }
            },
            Command::Flush { reply } => {
                self.waiters.push(Waiter::Flush(reply));
                self.deadline = None;
                if !self.store.is_saving() {
                    self.dispatch_save();
                }
                self.settle_waiters();
            }
            Command::Retry { reply } => {
                self.deadline = None;
                let _ = reply.send(self.dispatch_save());
            }
            Command::Discard { reply } => {
                self.deadline = None;
                let _ = reply.send(self.store.discard_changes());
            }
            Command::RecalculateTax { reply } => {
                let backend = self.backend.clone();
                let events = self.events_tx.clone();
                let deal_id = self.deal.id.clone();
                tokio::spawn(async move {
                    let result = backend.recalculate_tax(&deal_id).await;
                    let _ = events.send(Event::TaxFinished { result, reply });
                });
            }
            Command::Transition { target, reply } => self.start_transition(target, reply),
            Command::Validate { reply } => {
                let _ = reply.send(workflow::validate(&self.deal, self.store.scenario()));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    deal: self.deal.clone(),
                    scenario: self.store.scenario().clone(),
                    calculation: self.store.calculation().clone(),
                    dirty: self.store.dirty().iter().copied().collect(),
                    status: self.store.status().clone(),
                });
            }
            // the run loop intercepts shutdown before it gets here
            Command::Shutdown { reply } => {
                let _ = reply.send(self.store.status().clone());
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::SaveFinished { ticket, result } => {
                let result = result.map_err(|e| e.to_string());
                match self.store.complete_save(&ticket, result) {
                    SaveOutcome::Saved => {
                        debug!("Saved scenario {} (seq {})", ticket.scenario_id, ticket.seq);
                        // edits made while saving go out after a fresh quiet period
                        if !self.store.dirty().is_empty()
                            && self.waiters.is_empty()
                            && self.deadline.is_none()
                        {
                            self.deadline = Some(Instant::now() + self.config.debounce);
                        }
                    }
                    SaveOutcome::Failed { restored } => {
                        warn!(
                            "Save of {:?} for scenario {} failed; fields kept dirty",
                            restored, ticket.scenario_id
                        );
                    }
                    SaveOutcome::Stale => {}
                }
                self.settle_waiters();
            }
            Event::TaxFinished { result, reply } => {
                let outcome = match result {
                    Ok(TaxRecalcResponse {
                        success: true,
                        tax_profile: Some(profile),
                    }) => {
                        info!(
                            "Tax profile for deal {}: {} at {}",
                            self.deal.id, profile.jurisdiction, profile.combined_rate
                        );
                        self.deal.tax_profile = Some(profile.clone());
                        self.store.set_tax_profile(Some(profile.clone()));
                        Ok(profile)
                    }
                    Ok(_) => {
                        warn!(
                            "Tax recalculation for deal {} returned no profile; keeping previous",
                            self.deal.id
                        );
                        Err(SessionError::Recalculation(
                            "tax service returned no profile".to_string(),
                        ))
                    }
                    Err(e) => {
                        warn!("Tax recalculation for deal {} failed: {}", self.deal.id, e);
                        Err(SessionError::Backend(e))
                    }
                };
                let _ = reply.send(outcome);
            }
            Event::TransitionFinished {
                target,
                result,
                reply,
            } => {
                let outcome = match result {
                    Ok(deal) => {
                        info!("Deal {} moved to {}", self.deal.id, deal.state);
                        self.deal.state = deal.state;
                        Ok(self.deal.clone())
                    }
                    Err(e) => {
                        warn!("Moving deal {} to {} failed: {}", self.deal.id, target, e);
                        Err(SessionError::Backend(e))
                    }
                };
                let _ = reply.send(outcome);
            }
        }
    }

    fn start_transition(
        &mut self,
        target: Option<DealState>,
        reply: oneshot::Sender<Result<Deal, SessionError>>,
    ) {
        let target = match target.or_else(|| self.deal.state.next()) {
            Some(target) => target,
            None => {
                let _ = reply.send(Err(SessionError::NoNextState(self.deal.state)));
                return;
            }
        };
        if let Err(e) = workflow::check_transition(&self.deal, self.store.scenario(), target) {
            debug!("Transition of deal {} to {} blocked: {}", self.deal.id, target, e);
            let _ = reply.send(Err(e.into()));
            return;
        }

        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        let deal_id = self.deal.id.clone();
        tokio::spawn(async move {
            let result = backend.update_deal_state(&deal_id, target).await;
            let _ = events.send(Event::TransitionFinished {
                target,
                result,
                reply,
            });
        });
    }

    /// Hand the dirty fields to the backend. Returns false if nothing was sent.
    fn dispatch_save(&mut self) -> bool {
        let Some(batch) = self
            .store
            .begin_save(&self.config.acting_user, TimeMs::now())
        else {
            return false;
        };
        self.deadline = None;
        debug!(
            "Dispatching save of {:?} for scenario {}",
            batch.fields(),
            batch.ticket.scenario_id
        );

        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.persist_scenario(batch.request).await;
            let _ = events.send(Event::SaveFinished {
                ticket: batch.ticket,
                result,
            });
        });
        true
    }

    /// Answer waiters once nothing is in flight and nothing more can be sent.
    fn settle_waiters(&mut self) {
        if self.waiters.is_empty() || self.store.is_saving() {
            return;
        }
        if !self.store.dirty().is_empty() && !self.store.status().is_error() && self.dispatch_save()
        {
            return;
        }

        for waiter in std::mem::take(&mut self.waiters) {
            match waiter {
                Waiter::Flush(reply) => {
                    let _ = reply.send(self.store.status().clone());
                }
                Waiter::Switch { next, reply } => {
                    let failed = match self.store.status() {
                        SaveStatus::Error(message) => Some(message.clone()),
                        _ => None,
                    };
                    let result = match failed {
                        Some(message) => Err(SessionError::SaveFailed(message)),
                        None => Ok(self.switch_to(next)),
                    };
                    let _ = reply.send(result);
                }
            }
        }
    }

    fn switch_to(&mut self, next: Scenario) -> SnapshotOutcome {
        let outcome = self.store.receive_server_snapshot(next);
        if matches!(outcome, SnapshotOutcome::Switched { .. }) {
            self.after_switch();
        }
        outcome
    }

    /// Drop the timer and release anyone waiting on the old scenario's saves.
    fn after_switch(&mut self) {
        self.deadline = None;
        for waiter in std::mem::take(&mut self.waiters) {
            match waiter {
                Waiter::Flush(reply) => {
                    let _ = reply.send(self.store.status().clone());
                }
                Waiter::Switch { reply, .. } => {
                    let _ = reply.send(Err(SessionError::Superseded));
                }
            }
        }
    }

    /// Save everything outstanding, waiting on in-flight results.
    async fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<Event>) {
        self.deadline = None;
        if !self.store.is_saving() {
            self.dispatch_save();
        }
        while self.store.is_saving() {
            match events.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
            if !self.store.is_saving() && !self.store.status().is_error() {
                self.dispatch_save();
            }
        }
        if self.store.status().is_error() {
            warn!(
                "Session for deal {} stopped with unsaved fields {:?}",
                self.deal.id,
                self.store.dirty()
            );
        }
    }

    fn publish_status(&self) {
        let status = self.store.status();
        self.status_tx.send_if_modified(|current| {
            if current != status {
                *current = status.clone();
                true
            } else {
                false
            }
        });
    }
}
