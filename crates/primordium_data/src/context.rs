//! The per-turn working set ([`TurnContext`]) and the report emitted to
//! callers at the end of a turn ([`TurnReport`]).

use crate::events::{AdaptationEvent, ContactEvent, ExtinctionEvent, IsolationEvent, SpeciationEvent, TectonicEvent};
use crate::pressure::PressureDescriptor;
use crate::species::{Species, SpeciesStatus};
use crate::tensor::Tensor3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-stage timing and cache counters accumulated over one turn. The
/// timings are wall-clock milliseconds; the diagnostics component
/// (`primordium_core::metrics`) is the one that actually measures them, this
/// type is only the carrier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsAccumulator {
    pub stage_timings_ms: HashMap<String, f64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl MetricsAccumulator {
    pub fn record_stage(&mut self, stage: &str, elapsed_ms: f64) {
        *self.stage_timings_ms.entry(stage.to_string()).or_insert(0.0) += elapsed_ms;
    }

    pub fn record_cache(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }
}

/// The outcome of a single species' per-turn processing, accumulated by
/// pipeline stages and folded into the turn report at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesTurnResult {
    pub lineage_code: String,
    pub population_before: f64,
    pub population_after: f64,
    pub migrated: bool,
    pub degraded: bool,
}

/// The mutable state threaded through the turn pipeline (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnContext {
    pub turn_index: u64,
    pub pop: Tensor3,
    pub env: Tensor3,
    pub modifiers: HashMap<String, f32>,
    pub pressures: Vec<PressureDescriptor>,
    /// Caller-visible record of what the pressure bridge folded into `env`
    /// this turn: channels 0/1/2 are the temperature delta, humidity delta
    /// and external-pressure intensity it applied. Not read by any kernel —
    /// `env` itself already carries the result (§4.6: the bridge is
    /// idempotent and stateless across turns).
    pub pressure_overlay: Tensor3,
    pub new_populations: HashMap<String, f64>,
    pub new_species: Vec<Species>,
    pub trigger_codes: HashSet<String>,
    pub species_results: Vec<SpeciesTurnResult>,
    pub metrics: MetricsAccumulator,
}

impl TurnContext {
    #[must_use]
    pub fn new(turn_index: u64, pop: Tensor3, env: Tensor3, pressures: Vec<PressureDescriptor>) -> Self {
        let overlay = Tensor3::zeros(3, env.height, env.width);
        Self {
            turn_index,
            pop,
            env,
            modifiers: HashMap::new(),
            pressures,
            pressure_overlay: overlay,
            new_populations: HashMap::new(),
            new_species: Vec::new(),
            trigger_codes: HashSet::new(),
            species_results: Vec::new(),
            metrics: MetricsAccumulator::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesSnapshot {
    pub lineage_code: String,
    pub population: f64,
    pub status: SpeciesStatus,
    pub trophic_level: f32,
}

impl SpeciesSnapshot {
    #[must_use]
    pub fn from_species(species: &Species) -> Self {
        Self {
            lineage_code: species.lineage_code.clone(),
            population: species.population(),
            status: species.status,
            trophic_level: species.trophic_level,
        }
    }
}

/// Emitted to the caller at the end of a turn (§3, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn_index: u64,
    pub species_snapshots: Vec<SpeciesSnapshot>,
    pub speciation_events: Vec<SpeciationEvent>,
    pub extinction_events: Vec<ExtinctionEvent>,
    pub tectonic_events: Vec<TectonicEvent>,
    pub adaptation_events: Vec<AdaptationEvent>,
    pub isolation_events: Vec<IsolationEvent>,
    pub contact_events: Vec<ContactEvent>,
    pub pressure_feedback: HashMap<String, f32>,
    pub narrative: Option<String>,
    pub metrics: MetricsAccumulator,
    /// Lineage codes whose AI-assisted steps failed this turn (§7: a turn
    /// always produces a report even when some species degrade gracefully).
    pub degraded_species: Vec<String>,
    /// Model-router requests dropped because the whole-turn deadline expired
    /// before they could run (§5).
    pub deferred_requests: u32,
}

impl TurnReport {
    #[must_use]
    pub fn empty(turn_index: u64) -> Self {
        Self {
            turn_index,
            species_snapshots: Vec::new(),
            speciation_events: Vec::new(),
            extinction_events: Vec::new(),
            tectonic_events: Vec::new(),
            adaptation_events: Vec::new(),
            isolation_events: Vec::new(),
            contact_events: Vec::new(),
            pressure_feedback: HashMap::new(),
            narrative: None,
            metrics: MetricsAccumulator::default(),
            degraded_species: Vec::new(),
            deferred_requests: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_accumulate_across_stages() {
        let mut m = MetricsAccumulator::default();
        m.record_stage("mortality", 1.5);
        m.record_stage("mortality", 2.5);
        assert_eq!(m.stage_timings_ms["mortality"], 4.0);
    }

    #[test]
    fn empty_report_has_no_events() {
        let r = TurnReport::empty(3);
        assert_eq!(r.turn_index, 3);
        assert!(r.species_snapshots.is_empty());
        assert!(r.degraded_species.is_empty());
    }
}
