//! Rule-condition evaluation seam.
//!
//! The condition-expression language itself lives outside this engine; the
//! evaluator is handed in as a collaborator and treated as pure with respect
//! to assignment state.

use async_trait::async_trait;
use paywall_core::types::{EventData, TriggerRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Match,
    NoMatch,
}

/// Evaluates a rule's condition expression against event data. An `Err` is
/// treated by callers as no-match for that rule only.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    async fn evaluate_expression(
        &self,
        rule: &TriggerRule,
        event_data: Option<&EventData>,
    ) -> anyhow::Result<RuleOutcome>;
}

/// Evaluator that matches every rule. For tests and embedders without a
/// condition language.
pub struct AlwaysMatchEvaluator;

#[async_trait]
impl RuleEvaluator for AlwaysMatchEvaluator {
    async fn evaluate_expression(
        &self,
        _rule: &TriggerRule,
        _event_data: Option<&EventData>,
    ) -> anyhow::Result<RuleOutcome> {
        Ok(RuleOutcome::Match)
    }
}
