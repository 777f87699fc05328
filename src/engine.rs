//! The thin facade the CLI drives: genesis/load a world, validate and run
//! turn requests, and produce a save-state snapshot (§6).

use primordium_core::config::AppConfig;
use primordium_core::pipeline::Pipeline;
use primordium_core::tectonics::TectonicWorld;
use primordium_core::tensors::{self, EcologyBackend};
use primordium_data::context::TurnReport;
use primordium_data::pressure::PressureDescriptor;
use primordium_data::species::{Era, Species};
use primordium_data::tensor::{EnvChannel, SpeciesMap, Tensor3};
use primordium_data::tile::{Biome, Tile};
use primordium_io::snapshot::Snapshot;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// The three failure modes the thin wrapper maps to exit codes 1-3 (§6).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("engine invariant violation: {0}")]
    InvariantViolation(String),
    #[error("external dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

/// A turn-run request (§6 "Turn request"): number of rounds plus the
/// pressure descriptors applied identically across every round.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TurnRunRequest {
    pub rounds: u32,
    #[serde(default)]
    pub pressures: Vec<PressureDescriptor>,
}

impl TurnRunRequest {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.rounds < 1 {
            return Err(RunError::InvalidRequest("rounds must be >= 1".to_string()));
        }
        for p in &self.pressures {
            if !p.is_intensity_valid() {
                return Err(RunError::InvalidRequest(format!("pressure intensity {} out of range [1, 10]", p.intensity)));
            }
        }
        Ok(())
    }
}

/// Classifies a tile's biome from elevation/temperature/humidity. The
/// spec leaves exact biome boundaries unspecified; these thresholds are a
/// deliberate design choice, recorded in DESIGN.md.
fn classify_biome(elevation_m: f32, temperature_c: f32, humidity: f32) -> Biome {
    if elevation_m < 0.0 {
        return Biome::Ocean;
    }
    if elevation_m < 5.0 {
        return Biome::Coast;
    }
    if elevation_m > 2500.0 {
        return Biome::Mountain;
    }
    if temperature_c < -5.0 {
        return Biome::Ice;
    }
    if temperature_c < 5.0 {
        return Biome::Tundra;
    }
    if humidity < 0.2 {
        return Biome::Desert;
    }
    if humidity > 0.8 && temperature_c > 20.0 {
        return Biome::Rainforest;
    }
    if humidity > 0.6 {
        return Biome::Forest;
    }
    if humidity > 0.75 && temperature_c < 15.0 {
        return Biome::Wetland;
    }
    Biome::Plains
}

/// Owns the running world and drives turns against a configured backend.
pub struct Engine {
    pipeline: Pipeline,
    config: AppConfig,
    backend: Box<dyn EcologyBackend>,
    rng: ChaCha8Rng,
    turn_index: u64,
    era: Era,
    seed: u64,
}

impl Engine {
    /// Builds a fresh world from config: generates plates, seeds a
    /// uniform baseline environment, and places the given founders evenly
    /// across the grid.
    pub fn genesis(config: AppConfig, species: Vec<Species>) -> Result<Self, RunError> {
        config.validate().map_err(|e| RunError::InvariantViolation(e.to_string()))?;

        let seed = config.world.seed.unwrap_or(0);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let width = config.world.width;
        let height = config.world.height;

        let mut species_map = SpeciesMap::new();
        for s in &species {
            species_map.insert(&s.lineage_code);
        }

        let mut pop = Tensor3::zeros(species.len(), height as usize, width as usize);
        for (idx, s) in species.iter().enumerate() {
            let total = s.population();
            let cells = pop.channel(idx).len();
            if total > 0.0 && cells > 0 {
                let per_tile = (total / cells as f64) as f32;
                for v in pop.channel_mut(idx) {
                    *v = per_tile;
                }
            }
        }

        let mut env = Tensor3::zeros(EnvChannel::COUNT, height as usize, width as usize);
        for v in env.channel_mut(EnvChannel::Temperature.index()) {
            *v = 20.0;
        }
        for v in env.channel_mut(EnvChannel::Humidity.index()) {
            *v = 0.5;
        }
        for v in env.channel_mut(EnvChannel::Resources.index()) {
            *v = 1.0;
        }

        let tectonics = TectonicWorld::generate(width, height, &config.world, &mut rng);
        let pipeline = Pipeline::new(species, species_map, pop, env, tectonics);
        let backend = tensors::select_backend(config.world.seed.is_none());

        Ok(Self { pipeline, config, backend, rng, turn_index: 0, era: Era::Hadean, seed })
    }

    /// Rehydrates a world from a save-state snapshot (§6). The tectonic
    /// subsystem's plate-presence cache is not part of the schema and is
    /// rebuilt fresh; see DESIGN.md.
    pub fn from_snapshot(config: AppConfig, snapshot: Snapshot) -> Result<Self, RunError> {
        snapshot.validate().map_err(|e| RunError::InvariantViolation(e.to_string()))?;
        config.validate().map_err(|e| RunError::InvariantViolation(e.to_string()))?;

        let mut species_map = SpeciesMap::new();
        for s in &snapshot.species {
            species_map.insert(&s.lineage_code);
        }

        let mut pop = Tensor3::zeros(snapshot.species.len(), snapshot.height as usize, snapshot.width as usize);
        let mut env = Tensor3::zeros(EnvChannel::COUNT, snapshot.height as usize, snapshot.width as usize);
        for tile in &snapshot.tiles {
            let i = tile.y as usize * snapshot.width as usize + tile.x as usize;
            env.channel_mut(EnvChannel::Elevation.index())[i] = tile.elevation_m;
            env.channel_mut(EnvChannel::Temperature.index())[i] = tile.temperature_c;
            env.channel_mut(EnvChannel::Humidity.index())[i] = tile.humidity;
            env.channel_mut(EnvChannel::Resources.index())[i] = tile.resources;
        }
        for (idx, s) in snapshot.species.iter().enumerate() {
            let total = s.population();
            let cells = pop.channel(idx).len();
            if total > 0.0 && cells > 0 {
                let per_tile = (total / cells as f64) as f32;
                for v in pop.channel_mut(idx) {
                    *v = per_tile;
                }
            }
        }

        let tectonics = TectonicWorld::from_parts(
            snapshot.width,
            snapshot.height,
            snapshot.plates.clone(),
            snapshot.plate_of_tile.clone(),
            snapshot.features.clone(),
            snapshot.mantle.clone(),
        );

        let pipeline = Pipeline::new(snapshot.species.clone(), species_map, pop, env, tectonics);
        let backend = tensors::select_backend(true);
        let rng = ChaCha8Rng::seed_from_u64(snapshot.seed);

        Ok(Self { pipeline, config, backend, rng, turn_index: snapshot.turn, era: Era::Hadean, seed: snapshot.seed })
    }

    pub fn run_request(&mut self, request: &TurnRunRequest) -> Result<Vec<TurnReport>, RunError> {
        request.validate()?;
        let mut reports = Vec::with_capacity(request.rounds as usize);
        for _ in 0..request.rounds {
            self.turn_index += 1;
            let report =
                self.pipeline.run_turn(self.turn_index, request.pressures.clone(), &self.config, self.backend.as_ref(), self.era, &mut self.rng);
            reports.push(report);
        }
        Ok(reports)
    }

    #[must_use]
    pub fn turn_index(&self) -> u64 {
        self.turn_index
    }

    /// Materializes a save-state snapshot of the current world (§6).
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        let width = self.pipeline.tectonics.width;
        let height = self.pipeline.tectonics.height;
        let mut tiles = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let i = (y * width + x) as usize;
                let elevation_m = self.pipeline.env.channel(EnvChannel::Elevation.index())[i];
                let temperature_c = self.pipeline.env.channel(EnvChannel::Temperature.index())[i];
                let humidity = self.pipeline.env.channel(EnvChannel::Humidity.index())[i];
                let resources = self.pipeline.env.channel(EnvChannel::Resources.index())[i];
                tiles.push(Tile {
                    x,
                    y,
                    biome: classify_biome(elevation_m, temperature_c, humidity),
                    elevation_m,
                    temperature_c,
                    humidity,
                    resources,
                    plate_id: self.pipeline.tectonics.plate_of_tile.get(i).copied().unwrap_or(0),
                });
            }
        }

        Snapshot {
            version: primordium_io::SNAPSHOT_VERSION,
            width,
            height,
            seed: self.seed,
            turn: self.turn_index,
            plates: self.pipeline.tectonics.plates.clone(),
            plate_of_tile: self.pipeline.tectonics.plate_of_tile.clone(),
            tiles,
            features: self.pipeline.tectonics.features.clone(),
            mantle: self.pipeline.tectonics.mantle.clone(),
            species: self.pipeline.species.clone(),
            species_history: std::collections::HashMap::new(),
            pressure_feedback: std::collections::HashMap::new(),
            metrics_history: Vec::new(),
            config_fingerprint: Some(self.config.fingerprint()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_core::config::WorldConfig;
    use primordium_data::species::{DietType, HabitatType, MorphologyStat, SpeciesStatus};
    use std::collections::HashMap;

    fn founder() -> Species {
        let mut morphology = HashMap::new();
        morphology.insert(MorphologyStat::PopulationCount, 500.0);
        Species {
            lineage_code: "Rex".into(),
            parent_code: None,
            genus_code: "Rex".into(),
            common_name: "Founder".into(),
            latin_name: "Rex foundus".into(),
            description: String::new(),
            traits: HashMap::new(),
            hidden_traits: HashMap::new(),
            morphology,
            organs: HashMap::new(),
            plasticity_buffer: Some(0.2),
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: 1.0,
            prey_species: vec![],
            prey_preferences: HashMap::new(),
            status: SpeciesStatus::Alive,
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: HashMap::new(),
        }
    }

    fn small_config() -> AppConfig {
        AppConfig { world: WorldConfig { width: 6, height: 6, seed: Some(3), ..WorldConfig::default() }, ..AppConfig::default() }
    }

    #[test]
    fn genesis_runs_a_request_and_advances_turn_index() {
        let mut engine = Engine::genesis(small_config(), vec![founder()]).unwrap();
        let reports = engine.run_request(&TurnRunRequest { rounds: 2, pressures: vec![] }).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(engine.turn_index(), 2);
    }

    #[test]
    fn invalid_request_rejects_zero_rounds() {
        let mut engine = Engine::genesis(small_config(), vec![founder()]).unwrap();
        let err = engine.run_request(&TurnRunRequest { rounds: 0, pressures: vec![] }).unwrap_err();
        assert!(matches!(err, RunError::InvalidRequest(_)));
    }

    #[test]
    fn invalid_request_rejects_out_of_range_intensity() {
        let mut engine = Engine::genesis(small_config(), vec![founder()]).unwrap();
        let pressures = vec![PressureDescriptor { kind: primordium_data::pressure::PressureKind::Temperature, intensity: 20, extent: None, narrative_note: None }];
        let err = engine.run_request(&TurnRunRequest { rounds: 1, pressures }).unwrap_err();
        assert!(matches!(err, RunError::InvalidRequest(_)));
    }

    #[test]
    fn snapshot_round_trips_through_from_snapshot() {
        let mut engine = Engine::genesis(small_config(), vec![founder()]).unwrap();
        engine.run_request(&TurnRunRequest { rounds: 1, pressures: vec![] }).unwrap();
        let snapshot = engine.to_snapshot();
        assert_eq!(snapshot.turn, 1);
        assert!(snapshot.validate().is_ok());

        let reloaded = Engine::from_snapshot(small_config(), snapshot).unwrap();
        assert_eq!(reloaded.turn_index(), 1);
    }
}
