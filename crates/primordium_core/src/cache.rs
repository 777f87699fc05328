//! Engine-owned caches (§9 re-architecture note: "global caches map to an
//! engine-owned cache registry with explicit `invalidate()` ... and
//! `apply_pending_updates()`"). Caches are read-only during kernel
//! execution and mutated only between pipeline stages (§5).

use std::collections::HashMap;

/// Read-through cache in front of the food-web maintainer, keyed by
/// lineage code, holding the last computed prey assignment. Grounded on the
/// Python original's `food_web_cache.py` / `food_web_manager.py` split
/// between a fast cache and the maintainer that repopulates it.
#[derive(Debug, Default)]
pub struct FoodWebCache {
    prey_by_species: HashMap<String, Vec<String>>,
    dirty: bool,
}

impl FoodWebCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, lineage_code: &str) -> Option<&[String]> {
        self.prey_by_species.get(lineage_code).map(Vec::as_slice)
    }

    pub fn put(&mut self, lineage_code: &str, prey: Vec<String>) {
        self.prey_by_species.insert(lineage_code.to_string(), prey);
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drops every cached entry. Called on save-context switch (§3
    /// Ownership).
    pub fn invalidate(&mut self) {
        self.prey_by_species.clear();
        self.dirty = false;
    }

    /// Reconciles the cache against species that went extinct this turn,
    /// called after the speciation/extinction stages (§9).
    pub fn apply_pending_updates(&mut self, extinct_codes: &[String]) {
        for code in extinct_codes {
            self.prey_by_species.remove(code);
        }
        self.dirty = false;
    }
}

/// Cache in front of the niche-overlap helper (§4.2): the `N x N` overlap
/// matrix is expensive to recompute every turn, so it is kept until a
/// species set changes.
#[derive(Debug, Default)]
pub struct NicheCache {
    overlap: HashMap<(String, String), f32>,
    species_count_at_build: usize,
}

impl NicheCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f32> {
        let key = if a <= b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) };
        self.overlap.get(&key).copied()
    }

    pub fn put(&mut self, a: &str, b: &str, overlap: f32) {
        let key = if a <= b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) };
        self.overlap.insert(key, overlap);
    }

    pub fn rebuild_for(&mut self, species_count: usize) {
        self.overlap.clear();
        self.species_count_at_build = species_count;
    }

    #[must_use]
    pub fn is_stale(&self, current_species_count: usize) -> bool {
        current_species_count != self.species_count_at_build
    }

    pub fn invalidate(&mut self) {
        self.overlap.clear();
        self.species_count_at_build = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn food_web_cache_round_trips() {
        let mut cache = FoodWebCache::new();
        cache.put("B", vec!["A".to_string()]);
        assert_eq!(cache.get("B"), Some(&["A".to_string()][..]));
    }

    #[test]
    fn food_web_cache_removes_extinct_prey() {
        let mut cache = FoodWebCache::new();
        cache.put("B", vec!["A".to_string()]);
        cache.apply_pending_updates(&["B".to_string()]);
        assert_eq!(cache.get("B"), None);
    }

    #[test]
    fn niche_cache_is_order_independent() {
        let mut cache = NicheCache::new();
        cache.put("A", "B", 0.5);
        assert_eq!(cache.get("B", "A"), Some(0.5));
    }

    #[test]
    fn niche_cache_detects_staleness() {
        let mut cache = NicheCache::new();
        cache.rebuild_for(3);
        assert!(!cache.is_stale(3));
        assert!(cache.is_stale(4));
    }
}
