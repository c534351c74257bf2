//! Tracing setup and in-process counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "mediaslots=info,tower_http=info";

/// Install the global fmt subscriber, honoring `RUST_LOG` when set
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Counters for generation and curation activity
#[derive(Debug, Default)]
pub struct Metrics {
    variants_generated: AtomicU64,
    variants_failed: AtomicU64,
    selections_saved: AtomicU64,
    variants_deleted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant_generated(&self) {
        self.variants_generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "variants_generated", "Metric incremented");
    }

    pub fn variant_failed(&self) {
        self.variants_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "variants_failed", "Metric incremented");
    }

    pub fn selection_saved(&self) {
        self.selections_saved.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "selections_saved", "Metric incremented");
    }

    pub fn variant_deleted(&self) {
        self.variants_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "variants_deleted", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            variants_generated: self.variants_generated.load(Ordering::Relaxed),
            variants_failed: self.variants_failed.load(Ordering::Relaxed),
            selections_saved: self.selections_saved.load(Ordering::Relaxed),
            variants_deleted: self.variants_deleted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub variants_generated: u64,
    pub variants_failed: u64,
    pub selections_saved: u64,
    pub variants_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.variant_generated();
        metrics.variant_generated();
        metrics.variant_failed();
        metrics.selection_saved();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.variants_generated, 2);
        assert_eq!(snapshot.variants_failed, 1);
        assert_eq!(snapshot.selections_saved, 1);
        assert_eq!(snapshot.variants_deleted, 0);
    }
}
