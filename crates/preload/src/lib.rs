//! Preload orchestration — decides which paywalls to warm ahead of
//! presentation and keeps the warm-view cache safe across config refreshes.

pub mod fetcher;
pub mod orchestrator;

pub use fetcher::{InMemoryViewCache, PaywallFetcher, PaywallViewCache};
pub use orchestrator::PreloadOrchestrator;
