//! Speciation detection and adaptation (§4.4): wires the tensor monitor,
//! auto-tradeoff calculator, gradual adaptation, degeneration, and
//! hybridization into one per-turn pass over the living species list.

pub mod adaptation;
pub mod degeneration;
pub mod hybridization;
pub mod monitor;
pub mod tradeoff;

use crate::config::{BalanceConfig, TradeoffConfig};
use crate::lineage_registry::LineageRegistry;
use primordium_data::events::{AdaptationEvent, ContactEvent, InteractionType, SpeciationEvent, SpeciationTrigger};
use primordium_data::pressure::PressureDescriptor;
use primordium_data::species::{Species, TraitName};
use primordium_data::tensor::{SpeciesMap, Tensor3};
use rand::Rng;
use std::collections::HashMap;

pub struct SpeciationTurnOutputs {
    pub speciation_events: Vec<SpeciationEvent>,
    pub adaptation_events: Vec<AdaptationEvent>,
}

/// The minimum population a trigger must be backed by before a child
/// species is actually founded; smaller populations record the trigger
/// only as an adaptation nudge.
const SPECIATION_POPULATION_FLOOR: f64 = 50.0;

/// Drives the speciation/adaptation stage for one turn.
pub struct SpeciationSystem {
    registry: LineageRegistry,
}

impl SpeciationSystem {
    #[must_use]
    pub fn new(registry: LineageRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &LineageRegistry {
        &self.registry
    }

    /// Runs the monitor, founds child species for qualifying triggers,
    /// then applies gradual adaptation and degeneration to every living
    /// species in place.
    #[allow(clippy::too_many_arguments)]
    pub fn run_turn<R: Rng + ?Sized>(
        &mut self,
        species: &mut Vec<Species>,
        species_map: &mut SpeciesMap,
        pop: &mut Tensor3,
        env: &Tensor3,
        pressures: &[PressureDescriptor],
        balance: &BalanceConfig,
        tradeoff_config: &TradeoffConfig,
        niche_overlap: &HashMap<String, f32>,
        turn: u64,
        rng: &mut R,
    ) -> SpeciationTurnOutputs {
        let triggers = monitor::scan(pop, env, species_map, balance.divergence_normalizer, balance.divergence_threshold);

        let mut speciation_events = Vec::new();
        for (lineage_code, trigger) in triggers {
            let Some(parent_idx) = species.iter().position(|s| s.lineage_code == lineage_code) else { continue };
            if species[parent_idx].population() < SPECIATION_POPULATION_FLOOR {
                continue;
            }
            if let Some(event) = self.found_child(species, species_map, pop, parent_idx, &trigger, turn, tradeoff_config, rng) {
                speciation_events.push(event);
            }
        }

        let mut adaptation_events = Vec::new();
        for s in species.iter_mut().filter(|s| s.is_alive()) {
            let generation = s.morphology.get(&primordium_data::species::MorphologyStat::GenerationTimeDays).copied().unwrap_or(1.0).max(1.0) as u32;
            let overlap = niche_overlap.get(&s.lineage_code).copied().unwrap_or(0.0);
            if let Some(event) = adaptation::apply(s, pressures, generation, turn, overlap) {
                adaptation_events.push(event);
            }
            if let Some(event) = degeneration::apply(s, turn, rng) {
                adaptation_events.push(event);
            }
        }

        SpeciationTurnOutputs { speciation_events, adaptation_events }
    }

    /// Founds a new child species from a trigger: copies the parent, shifts
    /// one or two trait axes toward the trigger's implied direction, runs
    /// the tradeoff calculator to compensate, and grows `pop`/`species_map`
    /// in lockstep (§3 tensor invariant).
    #[allow(clippy::too_many_arguments)]
    fn found_child<R: Rng + ?Sized>(
        &mut self,
        species: &mut Vec<Species>,
        species_map: &mut SpeciesMap,
        pop: &mut Tensor3,
        parent_idx: usize,
        trigger: &SpeciationTrigger,
        turn: u64,
        tradeoff_config: &TradeoffConfig,
        rng: &mut R,
    ) -> Option<SpeciationEvent> {
        let parent_code = species[parent_idx].lineage_code.clone();
        let child_code = self.registry.next_child_code(&parent_code);

        let mut gains = HashMap::new();
        let shifted_trait = TraitName::ALL[rng.gen_range(0..TraitName::ALL.len())];
        let gain_amount = rng.gen_range(0.5..2.0);
        gains.insert(shifted_trait, gain_amount);
        let penalties = tradeoff::compute_penalties(&gains, &species[parent_idx].traits, tradeoff_config);

        let mut child = species[parent_idx].clone();
        child.lineage_code = child_code.clone();
        child.parent_code = Some(parent_code.clone());
        child.created_turn = turn;
        child.hybrid_parent_codes = None;
        child.hybrid_fertility = None;
        *child.traits.entry(shifted_trait).or_insert(0.0) += gain_amount;
        for (trait_name, penalty) in penalties {
            *child.traits.entry(trait_name).or_insert(0.0) -= penalty;
        }

        species.push(child);
        species_map.insert(child_code.clone());
        pop.push_channel();

        Some(SpeciationEvent { parent_code, child_code, turn, trigger: trigger.clone() })
    }

    /// Attempts a natural hybridization between two species present on both
    /// sides of a regained plate connection (§4.3 species tracker feeding
    /// §4.4 hybridization).
    pub fn attempt_hybridization<R: Rng + ?Sized>(
        &mut self,
        species: &mut Vec<Species>,
        species_map: &mut SpeciesMap,
        pop: &mut Tensor3,
        contact: &ContactEvent,
        other_code: &str,
        turn: u64,
        rng: &mut R,
    ) -> Option<SpeciationEvent> {
        if matches!(contact.interaction, InteractionType::Predation) {
            return None;
        }
        let a_idx = species.iter().position(|s| s.lineage_code == contact.lineage_code)?;
        let b_idx = species.iter().position(|s| s.lineage_code == other_code)?;
        if a_idx == b_idx {
            return None;
        }
        let (a, b) = (species[a_idx].clone(), species[b_idx].clone());
        let hybrid = hybridization::cross(&a, &b, false, &mut self.registry, turn, rng)?;
        let child_code = hybrid.lineage_code.clone();

        species.push(hybrid);
        species_map.insert(child_code.clone());
        pop.push_channel();

        Some(SpeciationEvent {
            parent_code: a.lineage_code.clone(),
            child_code,
            turn,
            trigger: SpeciationTrigger::EcologicalDivergence { divergence: 0.0 },
        })
    }
}
