//! Per-run counters and the closing summary line
//!
//! Counters are atomics so components can record through a shared
//! reference. Relaxed ordering: these are statistics only.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct RunMetrics {
    pending_features: AtomicU64,
    features_without_geometry: AtomicU64,
    probes_sent: AtomicU64,
    probes_located: AtomicU64,
    probes_missed: AtomicU64,
    groups_paired: AtomicU64,
    leftovers_dropped: AtomicU64,
    events_submitted: AtomicU64,
    records_updated: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub pending_features: u64,
    pub features_without_geometry: u64,
    pub probes_sent: u64,
    pub probes_located: u64,
    pub probes_missed: u64,
    pub groups_paired: u64,
    pub leftovers_dropped: u64,
    pub events_submitted: u64,
    pub records_updated: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_pending(&self, features: usize, without_geometry: usize) {
        Self::add(&self.pending_features, features);
        Self::add(&self.features_without_geometry, without_geometry);
    }

    pub fn record_locate(&self, sent: usize, located: usize) {
        Self::add(&self.probes_sent, sent);
        Self::add(&self.probes_located, located);
        Self::add(&self.probes_missed, sent.saturating_sub(located));
    }

    pub fn record_pairing(&self, groups: usize, leftovers: usize) {
        Self::add(&self.groups_paired, groups);
        Self::add(&self.leftovers_dropped, leftovers);
    }

    pub fn record_submitted(&self, events: usize) {
        Self::add(&self.events_submitted, events);
    }

    pub fn record_updated(&self, records: usize) {
        Self::add(&self.records_updated, records);
    }

    pub fn summary(&self) -> RunSummary {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        RunSummary {
            pending_features: load(&self.pending_features),
            features_without_geometry: load(&self.features_without_geometry),
            probes_sent: load(&self.probes_sent),
            probes_located: load(&self.probes_located),
            probes_missed: load(&self.probes_missed),
            groups_paired: load(&self.groups_paired),
            leftovers_dropped: load(&self.leftovers_dropped),
            events_submitted: load(&self.events_submitted),
            records_updated: load(&self.records_updated),
        }
    }
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            pending_features = %self.pending_features,
            features_without_geometry = %self.features_without_geometry,
            probes_sent = %self.probes_sent,
            probes_located = %self.probes_located,
            probes_missed = %self.probes_missed,
            groups_paired = %self.groups_paired,
            leftovers_dropped = %self.leftovers_dropped,
            events_submitted = %self.events_submitted,
            records_updated = %self.records_updated,
            "run_summary"
        );
    }
}
