//! Fixture builders and deterministic randomisers for tests.
//!
//! Kept in the library (not behind `cfg(test)`) so downstream crates can
//! build trigger graphs in their own tests without re-deriving the wire
//! shapes.

use crate::selector::Randomiser;
use paywall_core::types::{
    PreloadBehavior, Trigger, TriggerRule, VariantOption, VariantType,
};

pub fn trigger(event_name: &str, rules: Vec<TriggerRule>) -> Trigger {
    Trigger {
        event_name: event_name.to_string(),
        rules,
    }
}

pub fn rule(
    experiment_id: &str,
    group_id: &str,
    variants: &[(&str, u32, Option<&str>, VariantType)],
) -> TriggerRule {
    TriggerRule {
        experiment_id: experiment_id.to_string(),
        experiment_group_id: group_id.to_string(),
        variants: variants
            .iter()
            .map(|(id, percentage, paywall_id, variant_type)| VariantOption {
                id: id.to_string(),
                percentage: *percentage,
                paywall_id: paywall_id.map(str::to_string),
                variant_type: *variant_type,
            })
            .collect(),
        preload: PreloadBehavior::Always,
        condition_expression: None,
    }
}

/// Always returns the same draw, clamped into range.
pub struct FixedRandomiser(pub u32);

impl Randomiser for FixedRandomiser {
    fn next_in(&self, upper: u32) -> u32 {
        self.0.min(upper.saturating_sub(1))
    }
}
