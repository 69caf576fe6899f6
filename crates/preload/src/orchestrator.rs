//! Single-flight preload sweeps and config-refresh cache eviction.

use crate::fetcher::{PaywallFetcher, PaywallViewCache};
use paywall_assignment::active::{active_treatment_paywall_ids, all_active_treatment_paywall_ids};
use paywall_assignment::evaluator::RuleEvaluator;
use paywall_assignment::grouping::filter_triggers;
use paywall_assignment::store::Assignments;
use paywall_core::types::{Config, EventData, PaywallIdentifier, Trigger};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Releases the single-flight flag on every exit path, including
/// cancellation of the sweep future.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Decides which paywalls to warm and keeps the view cache consistent across
/// configuration refreshes.
///
/// Sweeps are single-flight: a call arriving while one is running is a
/// logged no-op, not a queued retry. Per-id fetches within a sweep run
/// concurrently; the sweep waits for all of them before the flag releases.
pub struct PreloadOrchestrator {
    assignments: Arc<Assignments>,
    evaluator: Arc<dyn RuleEvaluator>,
    fetcher: Arc<dyn PaywallFetcher>,
    view_cache: Arc<dyn PaywallViewCache>,
    in_flight: AtomicBool,
}

impl PreloadOrchestrator {
    pub fn new(
        assignments: Arc<Assignments>,
        evaluator: Arc<dyn RuleEvaluator>,
        fetcher: Arc<dyn PaywallFetcher>,
        view_cache: Arc<dyn PaywallViewCache>,
    ) -> Self {
        Self {
            assignments,
            evaluator,
            fetcher,
            view_cache,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Warms every paywall backed by an active treatment assignment whose
    /// rule currently applies. One fetch failure leaves that id cold and the
    /// sweep continues.
    pub async fn preload_all_paywalls(&self, config: &Config, event_data: Option<&EventData>) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("preload sweep already in flight, ignoring call");
            metrics::counter!("preload.sweeps_skipped").increment(1);
            return;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let run_id = Uuid::new_v4();
        let triggers = filter_triggers(&config.triggers, &config.preloading_disabled);
        let paywall_ids = all_active_treatment_paywall_ids(
            &triggers,
            &self.assignments.confirmed(),
            &self.assignments.unconfirmed(),
            self.evaluator.as_ref(),
            event_data,
        )
        .await;

        info!(
            run_id = %run_id,
            candidates = paywall_ids.len(),
            "preload sweep starting"
        );
        self.preload_paywalls(run_id, paywall_ids).await;
    }

    /// Warms only the paywalls reachable from the named placement events,
    /// answering from assignment state without consulting the evaluator.
    pub async fn preload_paywalls_for_events(
        &self,
        config: &Config,
        event_names: &HashSet<String>,
    ) {
        let named: HashSet<Trigger> = config
            .triggers
            .iter()
            .filter(|t| event_names.contains(&t.event_name))
            .cloned()
            .collect();
        let preloadable = filter_triggers(&named, &config.preloading_disabled);
        if preloadable.is_empty() {
            return;
        }

        let paywall_ids = active_treatment_paywall_ids(
            &preloadable,
            &self.assignments.confirmed(),
            &self.assignments.unconfirmed(),
        );
        self.preload_paywalls(Uuid::new_v4(), paywall_ids).await;
    }

    async fn preload_paywalls(&self, run_id: Uuid, identifiers: HashSet<PaywallIdentifier>) {
        let mut fetches = JoinSet::new();
        for identifier in identifiers {
            if self.view_cache.contains(&identifier) {
                continue;
            }
            let fetcher = self.fetcher.clone();
            fetches.spawn(async move {
                match fetcher.fetch(&identifier).await {
                    Ok(_) => {
                        metrics::counter!("preload.warmed").increment(1);
                    }
                    Err(e) => {
                        metrics::counter!("preload.fetch_failures").increment(1);
                        warn!(
                            paywall_id = %identifier,
                            error = %e,
                            "paywall preload fetch failed, leaving it cold"
                        );
                    }
                }
            });
        }
        while fetches.join_next().await.is_some() {}
        debug!(run_id = %run_id, "preload sweep finished");
    }

    /// Evicts cached views made stale by a config refresh: identifiers gone
    /// from the new config, and identifiers whose cache key changed. The
    /// currently presented paywall is never evicted out from under its
    /// presentation; its own dismissal path cleans it up.
    pub fn remove_unused_paywalls(&self, old_config: &Config, new_config: &Config) {
        let presented = self.view_cache.presented().map(|(identifier, _)| identifier);

        let old_keys: HashMap<&str, &str> = old_config
            .paywalls
            .iter()
            .map(|p| (p.identifier.as_str(), p.cache_key.as_str()))
            .collect();
        let new_keys: HashMap<&str, &str> = new_config
            .paywalls
            .iter()
            .map(|p| (p.identifier.as_str(), p.cache_key.as_str()))
            .collect();

        let mut stale: HashSet<&str> = old_keys
            .keys()
            .filter(|identifier| !new_keys.contains_key(*identifier))
            .copied()
            .collect();
        for (identifier, new_key) in &new_keys {
            if old_keys.get(identifier).is_some_and(|old_key| old_key != new_key) {
                stale.insert(*identifier);
            }
        }

        for identifier in stale {
            if presented.as_deref() == Some(identifier) {
                debug!(paywall_id = %identifier, "presented paywall kept despite config change");
                continue;
            }
            self.view_cache.remove(identifier);
            metrics::counter!("preload.evicted").increment(1);
        }
    }
}
