//! Allocates fresh, unique lineage codes for speciation and hybridization,
//! and checks the ancestry invariants (§3: `parent_code` is a strict prefix;
//! `genus_code` is shared by sister lineages).

use primordium_data::species::Species;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct LineageRegistry {
    known_codes: HashSet<String>,
    next_child_suffix: HashMap<String, u32>,
    next_hybrid_suffix: HashMap<String, u32>,
}

impl LineageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry's bookkeeping from an existing species list,
    /// e.g. after loading a save. Does not re-derive suffix counters from
    /// existing codes beyond marking them known, since the counters only
    /// need to avoid collisions going forward.
    pub fn rebuild(species: &[Species]) -> Self {
        let mut registry = Self::new();
        for s in species {
            registry.known_codes.insert(s.lineage_code.clone());
        }
        registry
    }

    /// Registers a user- or background-created founder lineage code.
    /// Returns an error if the code is malformed or already taken.
    pub fn register_founder(&mut self, code: &str) -> Result<(), String> {
        if !Species::is_valid_lineage_code(code) {
            return Err(format!("invalid lineage code {code:?}"));
        }
        if !self.known_codes.insert(code.to_string()) {
            return Err(format!("lineage code {code:?} already exists"));
        }
        Ok(())
    }

    /// Allocates the next child code for speciation from `parent_code`:
    /// `{parent_code}{n}` for the smallest `n` not yet used, which is
    /// always a strict prefix extension of the parent.
    pub fn next_child_code(&mut self, parent_code: &str) -> String {
        loop {
            let n = self.next_child_suffix.entry(parent_code.to_string()).or_insert(1);
            let candidate = format!("{parent_code}{n}");
            *n += 1;
            if self.known_codes.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Allocates the next hybrid code for a primary parent: `{primary}h{n}`
    /// (§4.4, §8 scenario 6: the first hybrid of `A1` is `A1h1`).
    pub fn next_hybrid_code(&mut self, primary_code: &str) -> String {
        loop {
            let n = self.next_hybrid_suffix.entry(primary_code.to_string()).or_insert(1);
            let candidate = format!("{primary_code}h{n}");
            *n += 1;
            if self.known_codes.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    #[must_use]
    pub fn is_known(&self, code: &str) -> bool {
        self.known_codes.contains(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_codes_are_strict_prefixes_and_unique() {
        let mut reg = LineageRegistry::new();
        reg.register_founder("Rex").unwrap();
        let a = reg.next_child_code("Rex");
        let b = reg.next_child_code("Rex");
        assert_ne!(a, b);
        assert!(Species::is_strict_prefix("Rex", &a));
        assert!(Species::is_strict_prefix("Rex", &b));
    }

    #[test]
    fn hybrid_code_matches_scenario_6() {
        let mut reg = LineageRegistry::new();
        reg.register_founder("A1").unwrap();
        reg.register_founder("A2").unwrap();
        assert_eq!(reg.next_hybrid_code("A1"), "A1h1");
        assert_eq!(reg.next_hybrid_code("A1"), "A1h2");
    }

    #[test]
    fn register_founder_rejects_duplicate() {
        let mut reg = LineageRegistry::new();
        reg.register_founder("Rex").unwrap();
        assert!(reg.register_founder("Rex").is_err());
    }

    #[test]
    fn register_founder_rejects_malformed_code() {
        let mut reg = LineageRegistry::new();
        assert!(reg.register_founder("rex").is_err());
    }
}
