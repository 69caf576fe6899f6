//! Experiment assignment engine — maps placement triggers to campaigns,
//! picks weighted-random variants, and reconciles locally computed choices
//! with server-confirmed state.

pub mod active;
pub mod evaluator;
pub mod grouping;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod testing;

pub use active::{active_treatment_paywall_ids, all_active_treatment_paywall_ids};
pub use evaluator::{RuleEvaluator, RuleOutcome};
pub use resolver::AssignmentOutcome;
pub use selector::{choose_variant, Randomiser, ThreadRngRandomiser};
pub use store::{AssignmentSink, AssignmentStore, Assignments, InMemoryAssignmentStore};
