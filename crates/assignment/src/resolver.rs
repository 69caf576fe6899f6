//! Assignment resolution — reconciling locally computed variant choices with
//! durable confirmed state and with server-pushed assignment lists.

use crate::grouping::rules_per_campaign;
use crate::selector::{choose_variant, Randomiser};
use paywall_core::types::{
    Assignment, ConfirmableAssignment, ExperimentId, Trigger, Variant,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

/// Confirmed and unconfirmed maps after one resolution step. An experiment id
/// keys at most one of the two.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentOutcome {
    pub confirmed: HashMap<ExperimentId, Variant>,
    pub unconfirmed: HashMap<ExperimentId, Variant>,
}

/// Computes candidate variants for every campaign the triggers reference.
///
/// Confirmed entries are sticky: they pass through untouched and are never
/// recomputed here. Experiments without a confirmed entry get a weighted
/// pick into `unconfirmed`. A confirmed experiment whose rule now carries no
/// variants is dropped from the output entirely rather than carried stale.
pub fn choose_assignments(
    triggers: &HashSet<Trigger>,
    confirmed_assignments: &HashMap<ExperimentId, Variant>,
    randomiser: &dyn Randomiser,
) -> AssignmentOutcome {
    let mut confirmed = confirmed_assignments.clone();
    let mut unconfirmed: HashMap<ExperimentId, Variant> = HashMap::new();

    for rule_group in rules_per_campaign(triggers) {
        for rule in &rule_group {
            if rule.variants.is_empty() {
                if confirmed.remove(&rule.experiment_id).is_some() {
                    debug!(
                        experiment_id = %rule.experiment_id,
                        "dropping confirmed assignment for experiment with no variants"
                    );
                }
                continue;
            }
            if confirmed.contains_key(&rule.experiment_id) {
                continue;
            }
            match choose_variant(&rule.variants, randomiser) {
                Ok(variant) => {
                    unconfirmed.insert(rule.experiment_id.clone(), variant);
                }
                Err(e) => {
                    // Only reachable if the weight partition itself is broken.
                    error!(
                        experiment_id = %rule.experiment_id,
                        error = %e,
                        "variant selection failed, experiment left unassigned"
                    );
                }
            }
        }
    }

    AssignmentOutcome {
        confirmed,
        unconfirmed,
    }
}

/// Applies a server-pushed assignment list on top of local state.
///
/// Each incoming record that still resolves against the current trigger
/// rules lands in `confirmed`, displacing any prior confirmed or unconfirmed
/// entry for that experiment (server wins). Records that no longer resolve
/// are dropped without comment — config skew between the recorded assignment
/// and the current snapshot is expected, not an error. Untouched keys pass
/// through unchanged.
pub fn transfer_assignments_from_server(
    assignments: &[Assignment],
    triggers: &HashSet<Trigger>,
    confirmed_assignments: &HashMap<ExperimentId, Variant>,
    unconfirmed_assignments: &HashMap<ExperimentId, Variant>,
) -> AssignmentOutcome {
    let mut confirmed = confirmed_assignments.clone();
    let mut unconfirmed = unconfirmed_assignments.clone();

    for assignment in assignments {
        let Some(trigger) = triggers.iter().find(|t| {
            t.rules
                .iter()
                .any(|rule| rule.experiment_id == assignment.experiment_id)
        }) else {
            continue;
        };

        let Some(option) = trigger
            .rules
            .iter()
            .flat_map(|rule| rule.variants.iter())
            .find(|variant| variant.id == assignment.variant_id)
        else {
            continue;
        };

        confirmed.insert(assignment.experiment_id.clone(), option.to_variant());
        unconfirmed.remove(&assignment.experiment_id);
    }

    AssignmentOutcome {
        confirmed,
        unconfirmed,
    }
}

/// Promotes a variant that was actually used into confirmed state, clearing
/// its unconfirmed entry.
pub fn confirm_assignment(
    assignment: &ConfirmableAssignment,
    unconfirmed_assignments: &HashMap<ExperimentId, Variant>,
    confirmed_assignments: &HashMap<ExperimentId, Variant>,
) -> AssignmentOutcome {
    let mut confirmed = confirmed_assignments.clone();
    confirmed.insert(assignment.experiment_id.clone(), assignment.variant.clone());

    let mut unconfirmed = unconfirmed_assignments.clone();
    unconfirmed.remove(&assignment.experiment_id);

    AssignmentOutcome {
        confirmed,
        unconfirmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rule, trigger, FixedRandomiser};
    use paywall_core::types::VariantType;

    fn holdout_variant(id: &str) -> Variant {
        Variant {
            id: id.to_string(),
            variant_type: VariantType::Holdout,
            paywall_id: None,
        }
    }

    // 1. choose_assignments --------------------------------------------------

    #[test]
    fn test_unconfirmed_choice_for_new_experiment() {
        // 80/20 split, draw 10 lands in the first range.
        let triggers = HashSet::from([trigger(
            "t1",
            vec![rule(
                "e1",
                "g1",
                &[
                    ("v1", 80, Some("pw_1"), VariantType::Treatment),
                    ("v2", 20, None, VariantType::Holdout),
                ],
            )],
        )]);

        let outcome = choose_assignments(&triggers, &HashMap::new(), &FixedRandomiser(10));
        assert!(outcome.confirmed.is_empty());
        let variant = &outcome.unconfirmed["e1"];
        assert_eq!(variant.id, "v1");
        assert_eq!(variant.paywall_id.as_deref(), Some("pw_1"));
    }

    #[test]
    fn test_confirmed_entries_are_sticky() {
        let triggers = HashSet::from([trigger(
            "t1",
            vec![rule(
                "e1",
                "g1",
                &[("v1", 100, Some("pw_1"), VariantType::Treatment)],
            )],
        )]);
        let confirmed = HashMap::from([("e1".to_string(), holdout_variant("v_old"))]);

        let outcome = choose_assignments(&triggers, &confirmed, &FixedRandomiser(0));
        assert_eq!(outcome.confirmed["e1"], holdout_variant("v_old"));
        assert!(
            !outcome.unconfirmed.contains_key("e1"),
            "confirmed experiments are never recomputed"
        );
    }

    #[test]
    fn test_confirmed_experiment_with_no_variants_is_dropped() {
        let triggers = HashSet::from([trigger("t1", vec![rule("e1", "g1", &[])])]);
        let confirmed = HashMap::from([("e1".to_string(), holdout_variant("v_old"))]);

        let outcome = choose_assignments(&triggers, &confirmed, &FixedRandomiser(0));
        assert!(outcome.confirmed.is_empty());
        assert!(outcome.unconfirmed.is_empty());
    }

    #[test]
    fn test_unrelated_confirmed_entries_pass_through() {
        let triggers = HashSet::from([trigger(
            "t1",
            vec![rule(
                "e1",
                "g1",
                &[("v1", 100, Some("pw_1"), VariantType::Treatment)],
            )],
        )]);
        let confirmed = HashMap::from([("e_other".to_string(), holdout_variant("v9"))]);

        let outcome = choose_assignments(&triggers, &confirmed, &FixedRandomiser(0));
        assert_eq!(outcome.confirmed["e_other"], holdout_variant("v9"));
        assert_eq!(outcome.unconfirmed["e1"].id, "v1");
    }

    #[test]
    fn test_shared_campaign_processed_once() {
        let shared = rule(
            "e1",
            "g1",
            &[("v1", 100, Some("pw_1"), VariantType::Treatment)],
        );
        let triggers = HashSet::from([
            trigger("t1", vec![shared.clone()]),
            trigger("t2", vec![shared]),
        ]);

        let outcome = choose_assignments(&triggers, &HashMap::new(), &FixedRandomiser(0));
        assert_eq!(outcome.unconfirmed.len(), 1);
    }

    // 2. transfer_assignments_from_server ------------------------------------

    fn transfer_fixture() -> HashSet<Trigger> {
        HashSet::from([trigger(
            "t1",
            vec![rule(
                "e1",
                "g1",
                &[
                    ("v1", 80, Some("pw_1"), VariantType::Treatment),
                    ("v2", 20, None, VariantType::Holdout),
                ],
            )],
        )])
    }

    #[test]
    fn test_server_assignment_overwrites_unconfirmed() {
        let triggers = transfer_fixture();
        let unconfirmed = HashMap::from([(
            "e1".to_string(),
            Variant {
                id: "v1".into(),
                variant_type: VariantType::Treatment,
                paywall_id: Some("pw_1".into()),
            },
        )]);
        let wire = vec![Assignment {
            experiment_id: "e1".into(),
            variant_id: "v2".into(),
        }];

        let outcome =
            transfer_assignments_from_server(&wire, &triggers, &HashMap::new(), &unconfirmed);
        assert_eq!(outcome.confirmed["e1"].id, "v2");
        assert_eq!(outcome.confirmed["e1"].variant_type, VariantType::Holdout);
        assert!(outcome.unconfirmed.is_empty());
    }

    #[test]
    fn test_unresolvable_server_assignment_is_dropped() {
        let triggers = transfer_fixture();
        let wire = vec![
            Assignment {
                experiment_id: "e_gone".into(),
                variant_id: "v1".into(),
            },
            Assignment {
                experiment_id: "e1".into(),
                variant_id: "v_gone".into(),
            },
        ];

        let outcome =
            transfer_assignments_from_server(&wire, &triggers, &HashMap::new(), &HashMap::new());
        assert!(outcome.confirmed.is_empty());
        assert!(outcome.unconfirmed.is_empty());
    }

    #[test]
    fn test_transfer_leaves_untouched_keys_alone() {
        let triggers = transfer_fixture();
        let confirmed = HashMap::from([("e_other".to_string(), holdout_variant("v9"))]);
        let unconfirmed = HashMap::from([("e_unrelated".to_string(), holdout_variant("v8"))]);
        let wire = vec![Assignment {
            experiment_id: "e1".into(),
            variant_id: "v1".into(),
        }];

        let outcome = transfer_assignments_from_server(&wire, &triggers, &confirmed, &unconfirmed);
        assert_eq!(outcome.confirmed["e_other"], holdout_variant("v9"));
        assert_eq!(outcome.unconfirmed["e_unrelated"], holdout_variant("v8"));
        assert_eq!(outcome.confirmed["e1"].id, "v1");
    }

    // 3. confirm_assignment --------------------------------------------------

    #[test]
    fn test_confirm_moves_unconfirmed_to_confirmed() {
        let variant = Variant {
            id: "v1".into(),
            variant_type: VariantType::Treatment,
            paywall_id: Some("pw_1".into()),
        };
        let unconfirmed = HashMap::from([("e1".to_string(), variant.clone())]);

        let outcome = confirm_assignment(
            &ConfirmableAssignment {
                experiment_id: "e1".into(),
                variant: variant.clone(),
            },
            &unconfirmed,
            &HashMap::new(),
        );
        assert_eq!(outcome.confirmed["e1"], variant);
        assert!(outcome.unconfirmed.is_empty());
    }
}
