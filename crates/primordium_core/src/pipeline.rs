//! Turn-driving pipeline (§5 "Turn-level driver"): stages run in a fixed
//! order — pressure bridge, tectonics, the tensor ecology engine, food-web
//! maintenance, speciation/adaptation, then extinction detection — each a
//! pure function of the previous stage's committed output.

use crate::cache::FoodWebCache;
use crate::config::AppConfig;
use crate::foodweb;
use crate::lineage_registry::LineageRegistry;
use crate::metrics::Metrics;
use crate::niche;
use crate::speciation::hybridization;
use crate::speciation::SpeciationSystem;
use crate::tectonics::TectonicWorld;
use crate::tensors::{self, habitat_channel_for, EcologyBackend, StageContext};
use primordium_data::context::{MetricsAccumulator, SpeciesSnapshot, TurnReport};
use primordium_data::events::{ExtinctionEvent, InteractionType};
use primordium_data::pressure::PressureDescriptor;
use primordium_data::species::{Era, MorphologyStat, Species, SpeciesStatus};
use primordium_data::tensor::{EnvChannel, SpeciesMap, SpeciesParamFeature, SpeciesParamsTensor, Tensor3};
use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

/// Zero-or-negligible population below which a species is declared extinct
/// at the end of a turn.
const EXTINCTION_FLOOR: f64 = 0.5;
/// Turns a species sits out of migration scoring after a migration event,
/// mirroring the `cooldown` flag the dense/scalar backends both consume.
const MIGRATION_COOLDOWN_TURNS: u64 = 3;

/// Owns every piece of per-world state the turn driver threads through the
/// pipeline: tensors, species records, the tectonic world, the speciation
/// system, and the food-web/niche caches (§3 Ownership).
pub struct Pipeline {
    pub species: Vec<Species>,
    pub species_map: SpeciesMap,
    pub pop: Tensor3,
    pub env: Tensor3,
    pub tectonics: TectonicWorld,
    speciation: SpeciationSystem,
    foodweb_cache: FoodWebCache,
    metrics: Metrics,
    last_mortality_by_species: HashMap<String, f32>,
    last_migrated_turn: HashMap<String, u64>,
}

impl Pipeline {
    #[must_use]
    pub fn new(species: Vec<Species>, species_map: SpeciesMap, pop: Tensor3, env: Tensor3, tectonics: TectonicWorld) -> Self {
        let registry = LineageRegistry::rebuild(&species);
        Self {
            species,
            species_map,
            pop,
            env,
            tectonics,
            speciation: SpeciationSystem::new(registry),
            foodweb_cache: FoodWebCache::new(),
            metrics: Metrics::new(),
            last_mortality_by_species: HashMap::new(),
            last_migrated_turn: HashMap::new(),
        }
    }

    fn build_species_params(&self) -> SpeciesParamsTensor {
        let mut params = SpeciesParamsTensor::zeros(self.species_map.len());
        for (idx, code) in (0..self.species_map.len()).filter_map(|i| self.species_map.code_of(i).map(|c| (i, c))) {
            let Some(s) = self.species.iter().find(|s| s.lineage_code == code) else { continue };
            params.set(idx, SpeciesParamFeature::TemperaturePref, 0.5);
            params.set(idx, SpeciesParamFeature::HumidityPref, 0.5);
            params.set(idx, SpeciesParamFeature::ToleranceWidth, 0.4);
            params.set(idx, SpeciesParamFeature::DispersalAbility, 0.5);
            params.set(idx, SpeciesParamFeature::Mobility, 0.5);
            params.set(idx, SpeciesParamFeature::ReproductiveRate, s.trophic_level.recip());
            let affinity = match habitat_channel_for(s.habitat_type) {
                primordium_data::tensor::EnvChannel::HabitatTerrestrial => SpeciesParamFeature::HabitatAffinityTerrestrial,
                primordium_data::tensor::EnvChannel::HabitatAquatic => SpeciesParamFeature::HabitatAffinityAquatic,
                _ => SpeciesParamFeature::HabitatAffinityAmphibious,
            };
            params.set(idx, affinity, 1.0);
        }
        params
    }

    /// Per-cell, per-consumer prey biomass available this turn, normalized
    /// against local carrying capacity so the mortality/migration kernels
    /// can read it as a `[0, 1]` density (§4.1). Built from the population
    /// committed at the end of the previous turn and each consumer's
    /// `prey_species` list, one turn behind like `death_rate_by_species`.
    fn build_prey_density(&self, balance: &crate::config::BalanceConfig) -> Tensor3 {
        let channels = self.species_map.len();
        let (height, width) = (self.pop.height, self.pop.width);
        let mut density = Tensor3::zeros(channels, height, width);
        let plane = height * width;
        let resources = self.env.channel(EnvChannel::Resources.index()).to_vec();

        for idx in 0..channels {
            let Some(code) = self.species_map.code_of(idx) else { continue };
            let Some(consumer) = self.species.iter().find(|s| s.lineage_code == code) else { continue };
            if !consumer.is_consumer() || consumer.prey_species.is_empty() {
                continue;
            }
            {
                let out = density.channel_mut(idx);
                for prey_code in &consumer.prey_species {
                    if let Some(prey_idx) = self.species_map.index_of(prey_code) {
                        let prey_pop = self.pop.channel(prey_idx);
                        for cell in 0..plane {
                            out[cell] += prey_pop[cell];
                        }
                    }
                }
            }
            let out = density.channel_mut(idx);
            for cell in 0..plane {
                let capacity = (resources[cell] * balance.capacity_multiplier).max(1e-3);
                out[cell] = (out[cell] / capacity).clamp(0.0, 1.0);
            }
        }

        density
    }

    /// Per-species mean niche overlap against every other living species
    /// (§4.2), keyed by lineage code so the food-web and adaptation stages
    /// can each consult it without recomputing the overlap matrix twice a
    /// turn. Total carrying capacity mirrors the per-cell capacity formula
    /// `build_prey_density` already uses, summed over the world.
    fn niche_overlap_by_species(
        &self,
        occupied: &HashMap<String, std::collections::HashSet<(u32, u32)>>,
        balance: &crate::config::BalanceConfig,
    ) -> HashMap<String, f32> {
        let empty = std::collections::HashSet::new();
        let tiles: Vec<std::collections::HashSet<(u32, u32)>> =
            self.species.iter().map(|s| occupied.get(&s.lineage_code).cloned().unwrap_or_else(|| empty.clone())).collect();
        let matrix = niche::overlap_matrix(&self.species, &tiles);
        let total_capacity =
            self.env.channel(EnvChannel::Resources.index()).iter().map(|&r| f64::from(r)).sum::<f64>() * f64::from(balance.capacity_multiplier);
        let metrics = niche::niche_metrics(&self.species, &matrix, total_capacity);
        self.species.iter().zip(metrics.iter()).map(|(s, m)| (s.lineage_code.clone(), m.niche_overlap)).collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run_turn<R: Rng + ?Sized>(
        &mut self,
        turn_index: u64,
        pressures: Vec<PressureDescriptor>,
        config: &AppConfig,
        backend: &dyn EcologyBackend,
        era: Era,
        rng: &mut R,
    ) -> TurnReport {
        let turn_start = Instant::now();
        let mut metrics_acc = MetricsAccumulator::default();

        let stage_start = Instant::now();
        let _overlay = crate::pressure_bridge::apply(&mut self.env, &pressures);
        metrics_acc.record_stage("pressure_bridge", stage_start.elapsed().as_secs_f64() * 1000.0);

        let stage_start = Instant::now();
        let tectonic_outputs = self.tectonics.advance(
            &mut self.env,
            &self.pop,
            &self.species,
            &self.species_map,
            &pressures,
            &config.tectonic,
            turn_index,
            rng,
        );
        metrics_acc.record_stage("tectonics", stage_start.elapsed().as_secs_f64() * 1000.0);

        let stage_start = Instant::now();
        let species_params = self.build_species_params();
        let habitat_channels: Vec<_> = self.species.iter().map(|s| habitat_channel_for(s.habitat_type)).collect();
        let trophic_levels: Vec<f32> = self.species.iter().map(|s| s.trophic_level).collect();
        let is_consumer: Vec<bool> = self.species.iter().map(Species::is_consumer).collect();
        let cooldown: Vec<bool> = self
            .species
            .iter()
            .map(|s| {
                self.last_migrated_turn
                    .get(&s.lineage_code)
                    .is_some_and(|&last| turn_index.saturating_sub(last) < MIGRATION_COOLDOWN_TURNS)
            })
            .collect();
        let death_rate_by_species: Vec<f32> =
            self.species.iter().map(|s| self.last_mortality_by_species.get(&s.lineage_code).copied().unwrap_or(0.0)).collect();
        let prey_density = self.build_prey_density(&config.balance);

        let ctx = StageContext {
            env: &self.env,
            species_params: &species_params,
            habitat_channels: &habitat_channels,
            trophic_levels: &trophic_levels,
            is_consumer: &is_consumer,
            cooldown: &cooldown,
            prey_density: Some(&prey_density),
            death_rate_by_species: &death_rate_by_species,
            era,
            balance: &config.balance,
        };

        let pop = std::mem::replace(&mut self.pop, Tensor3::zeros(0, 0, 0));
        let turn_outputs = backend.run_turn(pop, &ctx);
        self.pop = turn_outputs.pop;
        metrics_acc.record_stage("tensor_engine", stage_start.elapsed().as_secs_f64() * 1000.0);

        for (idx, code) in (0..self.species_map.len()).filter_map(|i| self.species_map.code_of(i).map(|c| (i, c.to_string()))) {
            let Some(s) = self.species.iter_mut().find(|s| s.lineage_code == code) else { continue };
            let population_after = self.pop.channel_sum(idx);
            s.morphology.insert(MorphologyStat::PopulationCount, population_after);

            let mortality = if idx < turn_outputs.mortality_rates.channels {
                let plane = turn_outputs.mortality_rates.channel(idx);
                plane.iter().sum::<f32>() / plane.len().max(1) as f32
            } else {
                0.0
            };
            self.last_mortality_by_species.insert(code.clone(), mortality);

            if turn_outputs.migrated_species.contains(&idx) {
                self.last_migrated_turn.insert(code.clone(), turn_index);
            }
        }

        let stage_start = Instant::now();
        let occupied = occupied_tiles(&self.pop, &self.species_map);
        let niche_overlap = self.niche_overlap_by_species(&occupied, &config.balance);
        let mut alive_species: Vec<Species> = self.species.clone();
        for s in alive_species.iter_mut().filter(|s| s.is_alive() && s.trophic_level >= 2.0) {
            foodweb::assign_prey(s, &self.species, &occupied, &config.foodweb, &niche_overlap);
        }
        self.species = alive_species;
        let trophic_feedback = foodweb::trophic_feedback(&self.species, &config.foodweb);
        self.foodweb_cache.mark_dirty();
        metrics_acc.record_stage("foodweb", stage_start.elapsed().as_secs_f64() * 1000.0);

        let stage_start = Instant::now();
        let mut speciation_outputs = self.speciation.run_turn(
            &mut self.species,
            &mut self.species_map,
            &mut self.pop,
            &self.env,
            &pressures,
            &config.balance,
            &config.tradeoff,
            &niche_overlap,
            turn_index,
            rng,
        );
        for contact in &tectonic_outputs.contact_events {
            if matches!(contact.interaction, InteractionType::Predation) {
                continue;
            }
            let Some(contact_species) = self.species.iter().find(|s| s.lineage_code == contact.lineage_code && s.is_alive()).cloned() else {
                continue;
            };
            let partner = self
                .species
                .iter()
                .filter(|s| s.is_alive() && s.lineage_code != contact.lineage_code)
                .filter(|s| {
                    self.tectonics
                        .species_plates(&s.lineage_code)
                        .is_some_and(|plates| plates.contains(&contact.plate_a) || plates.contains(&contact.plate_b))
                })
                .filter(|s| hybridization::is_hybridizable(&contact_species, s))
                .min_by(|a, b| {
                    hybridization::genetic_distance(&contact_species, a)
                        .partial_cmp(&hybridization::genetic_distance(&contact_species, b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|s| s.lineage_code.clone());
            let Some(other_code) = partner else { continue };
            if let Some(event) =
                self.speciation.attempt_hybridization(&mut self.species, &mut self.species_map, &mut self.pop, contact, &other_code, turn_index, rng)
            {
                speciation_outputs.speciation_events.push(event);
            }
        }
        metrics_acc.record_stage("speciation", stage_start.elapsed().as_secs_f64() * 1000.0);

        let stage_start = Instant::now();
        let mut extinction_events = Vec::new();
        for (idx, code) in (0..self.species_map.len()).filter_map(|i| self.species_map.code_of(i).map(|c| (i, c.to_string()))) {
            if self.pop.channel_sum(idx) >= EXTINCTION_FLOOR {
                continue;
            }
            let Some(s) = self.species.iter_mut().find(|s| s.lineage_code == code) else { continue };
            if s.is_alive() {
                s.status = SpeciesStatus::Extinct;
                self.pop.zero_channel(idx);
                extinction_events.push(ExtinctionEvent { lineage_code: code.clone(), turn: turn_index, cause: None });
                self.foodweb_cache.apply_pending_updates(std::slice::from_ref(&code));
            }
        }
        metrics_acc.record_stage("extinction", stage_start.elapsed().as_secs_f64() * 1000.0);

        let mut pressure_feedback = tectonic_outputs.pressure_feedback;
        for (level, scarcity) in trophic_feedback.scarcity_by_trophic_level {
            pressure_feedback.insert(format!("trophic_scarcity_t{level}"), scarcity);
        }

        self.metrics.record_turn(turn_start.elapsed(), self.species.len(), self.pop.height * self.pop.width);

        TurnReport {
            turn_index,
            species_snapshots: self.species.iter().map(SpeciesSnapshot::from_species).collect(),
            speciation_events: speciation_outputs.speciation_events,
            extinction_events,
            tectonic_events: tectonic_outputs.tectonic_events,
            adaptation_events: speciation_outputs.adaptation_events,
            isolation_events: tectonic_outputs.isolation_events,
            contact_events: tectonic_outputs.contact_events,
            pressure_feedback,
            narrative: None,
            metrics: metrics_acc,
            degraded_species: Vec::new(),
            deferred_requests: 0,
        }
    }
}

fn occupied_tiles(pop: &Tensor3, species_map: &SpeciesMap) -> HashMap<String, std::collections::HashSet<(u32, u32)>> {
    let mut occupied = HashMap::new();
    for idx in 0..pop.channels {
        let Some(code) = species_map.code_of(idx) else { continue };
        let tiles: std::collections::HashSet<(u32, u32)> = pop
            .channel(idx)
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p > 0.0)
            .map(|(i, _)| ((i % pop.width) as u32, (i / pop.width) as u32))
            .collect();
        occupied.insert(code.to_string(), tiles);
    }
    occupied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use primordium_data::species::{DietType, HabitatType};
    use primordium_data::tensor::EnvChannel;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap as Map;

    fn founder() -> Species {
        let mut morphology = Map::new();
        morphology.insert(MorphologyStat::PopulationCount, 200.0);
        Species {
            lineage_code: "Rex".into(),
            parent_code: None,
            genus_code: "Rex".into(),
            common_name: "Founder".into(),
            latin_name: "Rex foundus".into(),
            description: String::new(),
            traits: Map::new(),
            hidden_traits: Map::new(),
            morphology,
            organs: Map::new(),
            plasticity_buffer: Some(0.2),
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: 1.0,
            prey_species: vec![],
            prey_preferences: Map::new(),
            status: SpeciesStatus::Alive,
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: Map::new(),
        }
    }

    fn prey() -> Species {
        let mut morphology = Map::new();
        morphology.insert(MorphologyStat::PopulationCount, 0.0);
        Species {
            lineage_code: "Hare".into(),
            parent_code: None,
            genus_code: "Hare".into(),
            common_name: "Hare".into(),
            latin_name: "Hare latinus".into(),
            description: String::new(),
            traits: Map::new(),
            hidden_traits: Map::new(),
            morphology,
            organs: Map::new(),
            plasticity_buffer: None,
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: 1.0,
            prey_species: vec![],
            prey_preferences: Map::new(),
            status: SpeciesStatus::Alive,
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: Map::new(),
        }
    }

    #[test]
    fn prey_density_reflects_assigned_prey_population() {
        let mut species_map = SpeciesMap::new();
        let wolf_idx = species_map.insert("Wolf");
        let hare_idx = species_map.insert("Hare");

        let mut wolf = founder();
        wolf.lineage_code = "Wolf".into();
        wolf.genus_code = "Wolf".into();
        wolf.trophic_level = 2.5;
        wolf.diet_type = DietType::Carnivore;
        wolf.prey_species = vec!["Hare".to_string()];

        let mut pop = Tensor3::zeros(2, 4, 4);
        for v in pop.channel_mut(hare_idx) {
            *v = 50.0;
        }

        let mut env = Tensor3::zeros(EnvChannel::COUNT, 4, 4);
        for v in env.channel_mut(EnvChannel::Resources.index()) {
            *v = 10.0;
        }

        let world_config = WorldConfig { width: 4, height: 4, ..WorldConfig::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tectonics = TectonicWorld::generate(4, 4, &world_config, &mut rng);
        let pipeline = Pipeline::new(vec![wolf, prey()], species_map, pop, env, tectonics);

        let balance = crate::config::BalanceConfig::default();
        let density = pipeline.build_prey_density(&balance);
        assert!(density.channel(wolf_idx).iter().all(|&d| d > 0.0));
        assert!(density.channel(hare_idx).iter().all(|&d| d == 0.0));
    }

    #[test]
    fn a_turn_runs_end_to_end_without_panicking() {
        let mut species_map = SpeciesMap::new();
        species_map.insert("Rex");
        let mut pop = Tensor3::zeros(1, 8, 8);
        for v in pop.channel_mut(0) {
            *v = 10.0;
        }
        let mut env = Tensor3::zeros(EnvChannel::COUNT, 8, 8);
        for v in env.channel_mut(EnvChannel::Resources.index()) {
            *v = 1.0;
        }
        let world_config = WorldConfig { width: 8, height: 8, ..WorldConfig::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let tectonics = TectonicWorld::generate(8, 8, &world_config, &mut rng);

        let mut pipeline = Pipeline::new(vec![founder()], species_map, pop, env, tectonics);
        let config = AppConfig::default();
        let backend = tensors::scalar::ScalarBackend;
        let report = pipeline.run_turn(1, vec![], &config, &backend, Era::Hadean, &mut rng);

        assert_eq!(report.turn_index, 1);
    }
}
