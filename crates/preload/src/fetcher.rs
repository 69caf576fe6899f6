//! Collaborator seams for fetching paywall content and tracking warm views.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use paywall_core::types::{CacheKey, Paywall, PaywallIdentifier};

/// Requests a paywall's content and warms the view cache with it. Retry and
/// timeout policy belong to the implementor, not this engine.
#[async_trait]
pub trait PaywallFetcher: Send + Sync {
    async fn fetch(&self, paywall_id: &str) -> anyhow::Result<Paywall>;
}

/// Warm-view bookkeeping. The currently presented paywall must be queryable
/// so eviction can steer around it.
pub trait PaywallViewCache: Send + Sync {
    fn contains(&self, identifier: &str) -> bool;
    fn remove(&self, identifier: &str);
    fn presented(&self) -> Option<(PaywallIdentifier, CacheKey)>;
}

/// In-process view cache for tests and embedders.
#[derive(Default)]
pub struct InMemoryViewCache {
    views: DashMap<PaywallIdentifier, Paywall>,
    presented: RwLock<Option<Paywall>>,
}

impl InMemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, paywall: Paywall) {
        self.views.insert(paywall.identifier.clone(), paywall);
    }

    /// Marks a paywall as being presented, shielding it from eviction.
    pub fn set_presented(&self, paywall: Option<Paywall>) {
        *self.presented.write() = paywall;
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl PaywallViewCache for InMemoryViewCache {
    fn contains(&self, identifier: &str) -> bool {
        self.views.contains_key(identifier)
    }

    fn remove(&self, identifier: &str) {
        self.views.remove(identifier);
    }

    fn presented(&self) -> Option<(PaywallIdentifier, CacheKey)> {
        self.presented
            .read()
            .as_ref()
            .map(|p| (p.identifier.clone(), p.cache_key.clone()))
    }
}
