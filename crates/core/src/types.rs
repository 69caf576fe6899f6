//! Domain types for trigger-driven paywall experimentation.
//!
//! Everything here is shaped by the server wire format: the surrounding
//! network layer materializes `Config` and `Assignment` values and hands
//! them in already parsed. Ids are server-issued opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

pub type ExperimentId = String;
pub type PaywallIdentifier = String;
pub type CacheKey = String;

/// A named placement event mapping to zero or more campaign rules.
///
/// Identity is the event name alone: two triggers with the same name are the
/// same trigger, regardless of rule payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub event_name: String,
    pub rules: Vec<TriggerRule>,
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.event_name == other.event_name
    }
}

impl Eq for Trigger {}

impl Hash for Trigger {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_name.hash(state);
    }
}

/// One campaign rule attached to a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub experiment_id: ExperimentId,
    pub experiment_group_id: String,
    pub variants: Vec<VariantOption>,
    pub preload: PreloadBehavior,
    pub condition_expression: Option<String>,
}

/// When a rule's paywall should be considered for preloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreloadBehavior {
    /// Preload only while the rule's condition currently evaluates true.
    IfTrue,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantType {
    /// Shows a specific paywall.
    Treatment,
    /// Deliberately shows nothing.
    Holdout,
}

/// An experiment arm as configured, carrying its random-selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    pub id: String,
    pub percentage: u32,
    pub paywall_id: Option<PaywallIdentifier>,
    pub variant_type: VariantType,
}

impl VariantOption {
    pub fn to_variant(&self) -> Variant {
        Variant {
            id: self.id.clone(),
            variant_type: self.variant_type,
            paywall_id: self.paywall_id.clone(),
        }
    }
}

/// A resolved experiment arm, stripped of selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub variant_type: VariantType,
    pub paywall_id: Option<PaywallIdentifier>,
}

/// Server wire record tying an experiment to the variant it assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub experiment_id: ExperimentId,
    pub variant_id: String,
}

/// A locally used variant choice on its way to durable confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmableAssignment {
    pub experiment_id: ExperimentId,
    pub variant: Variant,
}

/// Durable snapshot of assignment state.
///
/// Invariant: an experiment id keys at most one of the two maps. Confirmed
/// entries are sticky until explicitly replaced; unconfirmed entries are the
/// product of local rule evaluation and may be overwritten freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSnapshot {
    pub confirmed: HashMap<ExperimentId, Variant>,
    pub unconfirmed: HashMap<ExperimentId, Variant>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AssignmentSnapshot {
    fn default() -> Self {
        Self {
            confirmed: HashMap::new(),
            unconfirmed: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Cacheable paywall descriptor. `cache_key` changes whenever the paywall's
/// content changes server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paywall {
    pub identifier: PaywallIdentifier,
    pub cache_key: CacheKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadingDisabled {
    pub all: bool,
    pub triggers: HashSet<String>,
}

/// One server configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub triggers: HashSet<Trigger>,
    pub paywalls: Vec<Paywall>,
    pub locales: HashSet<String>,
    pub preloading_disabled: PreloadingDisabled,
}

/// Event payload handed to rule evaluation; parameters are opaque here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventData {
    pub name: String,
    pub params: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_identity_is_event_name() {
        let a = Trigger {
            event_name: "campaign_trigger".into(),
            rules: vec![],
        };
        let b = Trigger {
            event_name: "campaign_trigger".into(),
            rules: vec![TriggerRule {
                experiment_id: "e1".into(),
                experiment_group_id: "g1".into(),
                variants: vec![],
                preload: PreloadBehavior::Always,
                condition_expression: None,
            }],
        };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b), "same event name must collapse in a set");
    }

    #[test]
    fn test_variant_option_to_variant() {
        let option = VariantOption {
            id: "v1".into(),
            percentage: 80,
            paywall_id: Some("pw_intro".into()),
            variant_type: VariantType::Treatment,
        };
        let variant = option.to_variant();
        assert_eq!(variant.id, "v1");
        assert_eq!(variant.variant_type, VariantType::Treatment);
        assert_eq!(variant.paywall_id.as_deref(), Some("pw_intro"));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            triggers: HashSet::from([Trigger {
                event_name: "onboarding_complete".into(),
                rules: vec![],
            }]),
            paywalls: vec![Paywall {
                identifier: "pw_intro".into(),
                cache_key: "ck_1".into(),
            }],
            locales: HashSet::from(["en".to_string()]),
            preloading_disabled: PreloadingDisabled::default(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.paywalls, config.paywalls);
        assert!(parsed.triggers.contains(&Trigger {
            event_name: "onboarding_complete".into(),
            rules: vec![],
        }));
    }
}
