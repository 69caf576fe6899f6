//! Campaign grouping and trigger filtering.
//!
//! Several placements can point at the same experiment group; grouping by
//! `experiment_group_id` makes sure each campaign is processed once no matter
//! how many triggers reference it.

use paywall_core::types::{Config, Paywall, PreloadingDisabled, Trigger, TriggerRule};
use std::collections::{HashMap, HashSet};

/// One rule list per distinct experiment group.
///
/// The group id is read off the first rule, matching the wire format where
/// every rule in a trigger shares a group. Triggers with no rules contribute
/// nothing.
pub fn rules_per_campaign(triggers: &HashSet<Trigger>) -> Vec<Vec<TriggerRule>> {
    let mut seen_groups: HashSet<&str> = HashSet::new();
    let mut grouped: Vec<Vec<TriggerRule>> = Vec::new();

    for trigger in triggers {
        let Some(first_rule) = trigger.rules.first() else {
            continue;
        };
        if !seen_groups.insert(&first_rule.experiment_group_id) {
            continue;
        }
        grouped.push(trigger.rules.clone());
    }
    grouped
}

/// Lookup map for O(1) dispatch from an event name to its trigger.
pub fn triggers_by_event_name(triggers: &HashSet<Trigger>) -> HashMap<String, Trigger> {
    triggers
        .iter()
        .map(|t| (t.event_name.clone(), t.clone()))
        .collect()
}

/// Drops triggers the preload configuration disables. `all` wins over the
/// per-trigger list.
pub fn filter_triggers(
    triggers: &HashSet<Trigger>,
    disabled: &PreloadingDisabled,
) -> HashSet<Trigger> {
    if disabled.all {
        return HashSet::new();
    }
    triggers
        .iter()
        .filter(|t| !disabled.triggers.contains(&t.event_name))
        .cloned()
        .collect()
}

/// Locale-fallback lookup for a statically referenced paywall.
///
/// A localized paywall is served by the network path; this only answers when
/// neither the full device locale nor its short form is localized (English
/// short-locale devices always take the static copy).
pub fn static_paywall<'a>(
    paywall_id: Option<&str>,
    config: Option<&'a Config>,
    device_locale: &str,
) -> Option<&'a Paywall> {
    let paywall_id = paywall_id?;
    let config = config?;

    if config.locales.contains(device_locale) {
        return None;
    }
    let short_locale = device_locale.split('_').next()?;
    if short_locale == "en" || !config.locales.contains(short_locale) {
        config.paywalls.iter().find(|p| p.identifier == paywall_id)
    } else {
        None
    }
}
