//! Sandbox counters
//!
//! - Counters only, monotonic
//! - Thread-safe, Relaxed ordering
//! - Passive: counters never influence mapping decisions

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for contexts, mappings and plan runs
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    contexts_created: AtomicU64,
    contexts_disposed: AtomicU64,
    tables_mapped: AtomicU64,
    indexes_mapped: AtomicU64,
    guard_pages_installed: AtomicU64,
    bytes_mapped: AtomicU64,
    plans_compiled: AtomicU64,
    plans_executed: AtomicU64,
    plans_failed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_contexts_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_contexts_disposed(&self) {
        self.contexts_disposed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a mapped table and its footprint
    pub fn record_table_mapped(&self, bytes: u64) {
        self.tables_mapped.fetch_add(1, Ordering::Relaxed);
        self.bytes_mapped.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a mapped index and its footprint
    pub fn record_index_mapped(&self, bytes: u64) {
        self.indexes_mapped.fetch_add(1, Ordering::Relaxed);
        self.bytes_mapped.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_guard_pages(&self) {
        self.guard_pages_installed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_compiled(&self) {
        self.plans_compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_executed(&self) {
        self.plans_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_failed(&self) {
        self.plans_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Contexts created and not yet disposed
    pub fn live_contexts(&self) -> u64 {
        let created = self.contexts_created.load(Ordering::Relaxed);
        created.saturating_sub(self.contexts_disposed.load(Ordering::Relaxed))
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            contexts_disposed: self.contexts_disposed.load(Ordering::Relaxed),
            tables_mapped: self.tables_mapped.load(Ordering::Relaxed),
            indexes_mapped: self.indexes_mapped.load(Ordering::Relaxed),
            guard_pages_installed: self.guard_pages_installed.load(Ordering::Relaxed),
            bytes_mapped: self.bytes_mapped.load(Ordering::Relaxed),
            plans_compiled: self.plans_compiled.load(Ordering::Relaxed),
            plans_executed: self.plans_executed.load(Ordering::Relaxed),
            plans_failed: self.plans_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MetricsRegistry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub contexts_created: u64,
    pub contexts_disposed: u64,
    pub tables_mapped: u64,
    pub indexes_mapped: u64,
    pub guard_pages_installed: u64,
    pub bytes_mapped: u64,
    pub plans_compiled: u64,
    pub plans_executed: u64,
    pub plans_failed: u64,
}
