//! Durable assignment state seam and the service that drives it.

use crate::resolver::{
    choose_assignments, confirm_assignment, transfer_assignments_from_server, AssignmentOutcome,
};
use crate::selector::Randomiser;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use paywall_core::types::{
    Assignment, AssignmentSnapshot, ConfirmableAssignment, ExperimentId, Trigger, Variant,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Durable get/put of the confirmed assignment map. One process-wide key,
/// last write wins; storage mechanics live behind this seam.
pub trait AssignmentStore: Send + Sync {
    fn load_confirmed(&self) -> HashMap<ExperimentId, Variant>;
    fn save_confirmed(&self, confirmed: &HashMap<ExperimentId, Variant>);
}

/// Process-local store for tests and embedders without durable storage.
#[derive(Default)]
pub struct InMemoryAssignmentStore {
    snapshot: RwLock<AssignmentSnapshot>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AssignmentSnapshot {
        self.snapshot.read().clone()
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn load_confirmed(&self) -> HashMap<ExperimentId, Variant> {
        self.snapshot.read().confirmed.clone()
    }

    fn save_confirmed(&self, confirmed: &HashMap<ExperimentId, Variant>) {
        let mut snapshot = self.snapshot.write();
        snapshot.confirmed = confirmed.clone();
        snapshot.updated_at = Utc::now();
    }
}

/// Notified when a variant choice is durably confirmed. Routes to analytics
/// or a server postback in production; no-op by default.
pub trait AssignmentSink: Send + Sync {
    fn assignment_confirmed(&self, assignment: &ConfirmableAssignment);
}

pub struct NoOpSink;

impl AssignmentSink for NoOpSink {
    fn assignment_confirmed(&self, _assignment: &ConfirmableAssignment) {}
}

/// Captures confirmations for assertions in tests.
#[derive(Default)]
pub struct CaptureSink {
    confirmed: Mutex<Vec<ConfirmableAssignment>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirmed(&self) -> Vec<ConfirmableAssignment> {
        self.confirmed.lock().clone()
    }
}

impl AssignmentSink for CaptureSink {
    fn assignment_confirmed(&self, assignment: &ConfirmableAssignment) {
        self.confirmed.lock().push(assignment.clone());
    }
}

/// Owns the in-memory unconfirmed map and composes the resolver functions
/// with the durable store. Constructed explicitly by the composition root and
/// passed by reference; there is no process-wide instance.
pub struct Assignments {
    store: Arc<dyn AssignmentStore>,
    sink: Arc<dyn AssignmentSink>,
    randomiser: Arc<dyn Randomiser>,
    unconfirmed: RwLock<HashMap<ExperimentId, Variant>>,
}

impl Assignments {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        sink: Arc<dyn AssignmentSink>,
        randomiser: Arc<dyn Randomiser>,
    ) -> Self {
        Self {
            store,
            sink,
            randomiser,
            unconfirmed: RwLock::new(HashMap::new()),
        }
    }

    /// Locally computes candidate variants for every campaign in `triggers`.
    pub fn choose_paywall_variants(&self, triggers: &HashSet<Trigger>) {
        self.update(|confirmed, _| {
            choose_assignments(triggers, &confirmed, self.randomiser.as_ref())
        });
    }

    /// Applies a server-pushed assignment list over local state.
    pub fn transfer_assignments(&self, assignments: &[Assignment], triggers: &HashSet<Trigger>) {
        self.update(|confirmed, unconfirmed| {
            transfer_assignments_from_server(assignments, triggers, &confirmed, &unconfirmed)
        });
    }

    /// Durably commits a variant that was actually used and notifies the sink.
    pub fn confirm_assignment(&self, assignment: &ConfirmableAssignment) {
        self.update(|confirmed, unconfirmed| {
            confirm_assignment(assignment, &unconfirmed, &confirmed)
        });
        self.sink.assignment_confirmed(assignment);
        debug!(
            experiment_id = %assignment.experiment_id,
            variant_id = %assignment.variant.id,
            "assignment confirmed"
        );
    }

    pub fn confirmed(&self) -> HashMap<ExperimentId, Variant> {
        self.store.load_confirmed()
    }

    pub fn unconfirmed(&self) -> HashMap<ExperimentId, Variant> {
        self.unconfirmed.read().clone()
    }

    /// Clears local candidate choices; confirmed state is untouched.
    pub fn reset(&self) {
        self.unconfirmed.write().clear();
    }

    fn update<F>(&self, operation: F)
    where
        F: FnOnce(HashMap<ExperimentId, Variant>, HashMap<ExperimentId, Variant>) -> AssignmentOutcome,
    {
        let confirmed = self.store.load_confirmed();
        let unconfirmed = self.unconfirmed.read().clone();

        let outcome = operation(confirmed, unconfirmed);

        *self.unconfirmed.write() = outcome.unconfirmed;
        self.store.save_confirmed(&outcome.confirmed);
    }
}
