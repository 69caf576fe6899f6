//! Derives the set of paywall ids currently backed by a non-holdout
//! assignment.
//!
//! Two entry points on purpose: the synchronous resolver answers from
//! assignment state alone (used for cache eviction decisions), the async one
//! additionally honors each rule's preload behavior and condition via the
//! rule evaluator (used for preload targeting). Call sites want different
//! tradeoffs, so they stay distinct rather than merged.

use crate::evaluator::{RuleEvaluator, RuleOutcome};
use crate::grouping::rules_per_campaign;
use paywall_core::types::{
    EventData, ExperimentId, PaywallIdentifier, PreloadBehavior, Trigger, Variant, VariantType,
};
use std::collections::{HashMap, HashSet};
use tracing::warn;

fn treatment_paywall_id(variant: &Variant) -> Option<PaywallIdentifier> {
    if variant.variant_type == VariantType::Treatment {
        variant.paywall_id.clone()
    } else {
        None
    }
}

/// Paywall ids backed by a treatment assignment, confirmed entries taking
/// precedence. Holdouts and variants without a paywall contribute nothing.
pub fn active_treatment_paywall_ids(
    triggers: &HashSet<Trigger>,
    confirmed: &HashMap<ExperimentId, Variant>,
    unconfirmed: &HashMap<ExperimentId, Variant>,
) -> HashSet<PaywallIdentifier> {
    let mut identifiers = HashSet::new();

    for rule_group in rules_per_campaign(triggers) {
        for rule in &rule_group {
            let Some(variant) = confirmed
                .get(&rule.experiment_id)
                .or_else(|| unconfirmed.get(&rule.experiment_id))
            else {
                continue;
            };
            if let Some(id) = treatment_paywall_id(variant) {
                identifiers.insert(id);
            }
        }
    }
    identifiers
}

/// Audience-filtered variant of [`active_treatment_paywall_ids`].
///
/// Each deduplicated rule is consulted exactly once, even when several
/// triggers share its experiment group. `IfTrue` rules go through the
/// evaluator; an evaluator failure counts as no-match for that rule only.
/// Confirmed assignments for experiments no longer referenced by any trigger
/// are ignored.
pub async fn all_active_treatment_paywall_ids(
    triggers: &HashSet<Trigger>,
    confirmed: &HashMap<ExperimentId, Variant>,
    unconfirmed: &HashMap<ExperimentId, Variant>,
    evaluator: &dyn RuleEvaluator,
    event_data: Option<&EventData>,
) -> HashSet<PaywallIdentifier> {
    let mut referenced_experiments: HashSet<&ExperimentId> = HashSet::new();
    let mut skipped_experiments: HashSet<ExperimentId> = HashSet::new();

    let rule_groups = rules_per_campaign(triggers);
    for rule_group in &rule_groups {
        for rule in rule_group {
            referenced_experiments.insert(&rule.experiment_id);

            match rule.preload {
                PreloadBehavior::Always => {}
                PreloadBehavior::Never => {
                    skipped_experiments.insert(rule.experiment_id.clone());
                }
                PreloadBehavior::IfTrue => {
                    let outcome = match evaluator.evaluate_expression(rule, event_data).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(
                                experiment_id = %rule.experiment_id,
                                error = %e,
                                "rule evaluation failed, treating as no-match"
                            );
                            RuleOutcome::NoMatch
                        }
                    };
                    if outcome == RuleOutcome::NoMatch {
                        skipped_experiments.insert(rule.experiment_id.clone());
                    }
                }
            }
        }
    }

    let mut identifiers = HashSet::new();
    for (experiment_id, variant) in confirmed.iter().chain(unconfirmed.iter()) {
        if !referenced_experiments.contains(experiment_id)
            || skipped_experiments.contains(experiment_id)
        {
            continue;
        }
        if let Some(id) = treatment_paywall_id(variant) {
            identifiers.insert(id);
        }
    }
    identifiers
}
