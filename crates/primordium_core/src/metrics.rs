//! Per-stage timing and diagnostic counters (§2 "Metrics & diagnostics").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-wide metrics collector. One instance is owned by the engine for
/// its lifetime and scoped exactly like the food-web/niche caches (§3
/// Ownership: invalidated on save-context switch is not needed here since
/// metrics are a rolling history, not per-save state).
pub struct Metrics {
    turn_count: AtomicU64,
    species_count: AtomicU64,
    tile_count: AtomicU64,
    counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            turn_count: AtomicU64::new(0),
            species_count: AtomicU64::new(0),
            tile_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_turn(&self, duration: Duration, species: usize, tiles: usize) {
        self.turn_count.fetch_add(1, Ordering::Relaxed);
        self.species_count.store(species as u64, Ordering::Relaxed);
        self.tile_count.store(tiles as u64, Ordering::Relaxed);

        let turn = self.turn_count.load(Ordering::Relaxed);
        tracing::info!(
            turn = turn,
            species = species,
            tiles = tiles,
            duration_ms = duration.as_millis() as u64,
            "turn complete"
        );
    }

    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.entry(name.to_string()).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    #[must_use]
    pub fn turn_count(&self) -> u64 {
        self.turn_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_degraded_species(&self, lineage_code: &str, reason: &str) {
        tracing::warn!(lineage_code, reason, "species degraded this turn");
    }

    pub fn log_tectonic_failure(&self, reason: &str) {
        tracing::error!(reason, "tectonic stage failed; feedback zeroed for this turn");
    }
}

/// Initializes the global tracing subscriber from `RUST_LOG` (or `info` if
/// unset). Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_turn_and_counts() {
        let metrics = Metrics::new();
        metrics.record_turn(Duration::from_millis(5), 3, 256);
        assert_eq!(metrics.turn_count(), 1);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.increment_counter("speciation");
        metrics.increment_counter("speciation");
        assert_eq!(metrics.counter("speciation"), 2);
        assert_eq!(metrics.counter("missing"), 0);
    }
}
