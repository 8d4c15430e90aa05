//! Scenario store: the canonical in-memory scenario for one edit session.
//!
//! Tracks which fields are unsaved (the dirty set), the value each dirty field
//! had before the current edit burst (the previous-value map), and the save in
//! flight, if any. Every accepted edit re-derives the engine outputs from an
//! immutable snapshot and applies them as one batch.

mod save;

pub use save::{SaveBatch, SaveOutcome, SaveStatus, SaveTicket};

use crate::backend::PersistRequest;
use crate::domain::{
    AuditLogEntry, FieldError, FieldName, FieldValue, SaveId, Scenario, ScenarioUpdate,
    TaxProfile, TimeMs, UserId,
};
use crate::engine::{self, Calculation, TaxContext};
use save::InFlightSave;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Fields edited since the last successful save.
pub type DirtySet = BTreeSet<FieldName>;

/// Value of each dirty field at the start of its edit burst.
pub type PreviousValueMap = BTreeMap<FieldName, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Result of reconciling a server-pushed scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Different scenario id: state replaced. Lists unsaved fields dropped.
    Switched { discarded: Vec<FieldName> },
    /// Same id, no unsaved work: server copy adopted.
    Adopted,
    /// Same id with unsaved work: server copy ignored.
    Ignored,
}

pub struct ScenarioStore {
    scenario: Scenario,
    calculation: Calculation,
    tax: TaxContext,
    dirty: DirtySet,
    previous: PreviousValueMap,
    in_flight: Option<InFlightSave>,
    status: SaveStatus,
    generation: u64,
    next_seq: u64,
}

impl ScenarioStore {
    pub fn new(scenario: Scenario, tax: TaxContext) -> Self {
        let mut store = Self {
            scenario,
            calculation: Calculation::default(),
            tax,
            dirty: DirtySet::new(),
            previous: PreviousValueMap::new(),
            in_flight: None,
            status: SaveStatus::Idle,
            generation: 0,
            next_seq: 0,
        };
        store.recompute();
        store
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn calculation(&self) -> &Calculation {
        &self.calculation
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn previous_values(&self) -> &PreviousValueMap {
        &self.previous
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn tax_context(&self) -> &TaxContext {
        &self.tax
    }

    /// Bumped on every scenario switch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Dirty fields or a save not yet acknowledged.
    pub fn has_unsaved_work(&self) -> bool {
        !self.dirty.is_empty() || self.in_flight.is_some()
    }

    pub fn update_field(&mut self, update: ScenarioUpdate) -> Result<&Calculation, StoreError> {
        self.update_fields(std::iter::once(update))
    }

    /// Apply `updates` in order. Either all are applied or, if any targets a
    /// field the scenario type lacks, none are.
    pub fn update_fields(
        &mut self,
        updates: impl IntoIterator<Item = ScenarioUpdate>,
    ) -> Result<&Calculation, StoreError> {
        let updates: Vec<ScenarioUpdate> = updates.into_iter().collect();
        for update in &updates {
            self.scenario.check_update(update)?;
        }

        for update in &updates {
            let field = update.field_name();
            let old = self.scenario.apply_update(update)?;
            if self.dirty.insert(field) {
                self.previous.insert(field, old);
            }
        }

        if !updates.is_empty() && !self.is_saving() {
            self.status = SaveStatus::Pending;
        }
        self.recompute();
        Ok(&self.calculation)
    }

    /// Reconcile a scenario pushed by the server.
    ///
    /// A different id switches scenarios and reports the unsaved fields dropped.
    /// A same-id copy is adopted only with no unsaved work. A save still in
    /// flight counts as unsaved work even when the DirtySet is empty, since the
    /// pushed copy may predate it; the save's own result brings the server state.
    pub fn receive_server_snapshot(&mut self, server: Scenario) -> SnapshotOutcome {
        if server.id != self.scenario.id {
            let mut discarded: BTreeSet<FieldName> = self.dirty.iter().copied().collect();
            if let Some(in_flight) = &self.in_flight {
                discarded.extend(in_flight.fields.iter().copied());
            }
            let discarded: Vec<FieldName> = discarded.into_iter().collect();
            if !discarded.is_empty() {
                warn!(
                    "Switching from scenario {} to {} drops unsaved fields {:?}",
                    self.scenario.id, server.id, discarded
                );
            }

            self.scenario = server;
            self.dirty.clear();
            self.previous.clear();
            self.in_flight = None;
            self.status = SaveStatus::Idle;
            self.generation += 1;
            self.recompute();
            return SnapshotOutcome::Switched { discarded };
        }

        if self.has_unsaved_work() {
            debug!(
                "Ignoring server snapshot for scenario {}: {} unsaved field(s)",
                server.id,
                self.dirty.len()
            );
            return SnapshotOutcome::Ignored;
        }

        self.scenario = server;
        self.recompute();
        SnapshotOutcome::Adopted
    }

    /// Revert every dirty field to its value before the edit burst.
    pub fn discard_changes(&mut self) -> Vec<FieldName> {
        let previous = std::mem::take(&mut self.previous);
        let mut reverted = Vec::with_capacity(previous.len());
        for (field, value) in previous {
            let restored = ScenarioUpdate::from_value(field, &value)
                .map_err(StoreError::from)
                .and_then(|update| self.scenario.apply_update(&update).map_err(Into::into));
            match restored {
                Ok(_) => reverted.push(field),
                Err(e) => warn!("Could not restore {}: {}", field, e),
            }
        }
        self.dirty.clear();
        if !self.is_saving() {
            self.status = SaveStatus::Idle;
        }
        self.recompute();
        reverted
    }

    /// Replace the jurisdiction tax profile and re-derive.
    pub fn set_tax_profile(&mut self, profile: Option<TaxProfile>) {
        self.tax.profile = profile;
        self.recompute();
    }

    /// Take the dirty fields as a save batch.
    ///
    /// Returns `None` when nothing is dirty or a save is already in flight;
    /// edits made meanwhile wait for the next cycle.
    pub fn begin_save(&mut self, acting_user: &UserId, now: TimeMs) -> Option<SaveBatch> {
        if self.in_flight.is_some() || self.dirty.is_empty() {
            return None;
        }

        let fields = std::mem::take(&mut self.dirty);
        let previous = std::mem::take(&mut self.previous);

        let updates: Vec<ScenarioUpdate> = fields
            .iter()
            .filter_map(|field| self.scenario.current_update(*field))
            .collect();
        let change_log: Vec<AuditLogEntry> = fields
            .iter()
            .filter_map(|field| {
                let old = previous.get(field).cloned().unwrap_or(FieldValue::Unset);
                let new = self.scenario.field_value(*field)?;
                AuditLogEntry::diff(*field, old, new, acting_user, now)
            })
            .collect();

        self.next_seq += 1;
        let ticket = SaveTicket {
            scenario_id: self.scenario.id.clone(),
            generation: self.generation,
            seq: self.next_seq,
        };
        let request = PersistRequest {
            save_id: Some(SaveId::generate()),
            deal_id: self.scenario.deal_id.clone(),
            scenario_id: self.scenario.id.clone(),
            updates,
            change_log,
            acting_user_id: acting_user.clone(),
        };

        self.in_flight = Some(InFlightSave {
            ticket: ticket.clone(),
            fields,
            previous,
        });
        self.status = SaveStatus::Saving;
        Some(SaveBatch { ticket, request })
    }

    /// Record the backend's answer to the save identified by `ticket`.
    pub fn complete_save(
        &mut self,
        ticket: &SaveTicket,
        result: Result<Scenario, String>,
    ) -> SaveOutcome {
        let current = matches!(&self.in_flight, Some(in_flight) if &in_flight.ticket == ticket);
        if !current || ticket.generation != self.generation {
            debug!(
                "Discarding stale save result for scenario {} (seq {})",
                ticket.scenario_id, ticket.seq
            );
            return SaveOutcome::Stale;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return SaveOutcome::Stale;
        };

        match result {
            Ok(server) => {
                if self.dirty.is_empty() {
                    self.status = SaveStatus::Saved;
                    if server.id == self.scenario.id {
                        self.scenario = server;
                        self.recompute();
                    }
                } else {
                    self.status = SaveStatus::Pending;
                }
                SaveOutcome::Saved
            }
            Err(message) => {
                let restored: Vec<FieldName> = in_flight.fields.iter().copied().collect();
                for field in in_flight.fields {
                    self.dirty.insert(field);
                    // the server never saw this burst, so its baseline wins
                    if let Some(value) = in_flight.previous.get(&field) {
                        self.previous.insert(field, value.clone());
                    }
                }
                self.status = SaveStatus::Error(message);
                SaveOutcome::Failed { restored }
            }
        }
    }

    fn recompute(&mut self) {
        let calculation = engine::derive(&self.scenario, &self.tax);
        self.scenario.apply_outputs(calculation.outputs.clone());
        self.calculation = calculation;
    }
}
