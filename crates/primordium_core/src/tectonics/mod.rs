//! Tectonic subsystem (§4.3): plate generation, Wilson-cycle mantle
//! dynamics, per-turn motion and boundary reclassification, terrain-delta
//! application, geological-feature eruptions, and species-plate tracking.
//!
//! [`TectonicWorld`] owns everything the subsystem needs and advances
//! independently of the tensor ecology engine each turn, writing its
//! terrain deltas back into the shared `env` tensor's elevation channel
//! (§2 data-flow: "tectonic subsystem advances independently... then
//! writes terrain deltas back into the environment tensor").

pub mod boundary;
pub mod features;
pub mod mantle;
pub mod motion;
pub mod plate_gen;
pub mod species_tracker;

use crate::config::{TectonicConfig, WorldConfig};
use mantle::{ConvectionCell, MantleState};
use primordium_data::events::{ContactEvent, IsolationEvent, TectonicEvent, TectonicEventKind};
use primordium_data::plate::{BoundaryType, GeoFeature, GeoFeatureKind, Plate};
use primordium_data::pressure::PressureDescriptor;
use primordium_data::species::Species;
use primordium_data::tensor::{EnvChannel, SpeciesMap, Tensor3};
use primordium_data::tile::Tile;
use rand::Rng;
use species_tracker::SpeciesTracker;
use std::collections::{HashMap, HashSet};

fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

pub struct TectonicTurnOutputs {
    pub tectonic_events: Vec<TectonicEvent>,
    pub isolation_events: Vec<IsolationEvent>,
    pub contact_events: Vec<ContactEvent>,
    /// Folded into next turn's modifiers (§4.3: "pressure-feedback mapping").
    pub pressure_feedback: HashMap<String, f32>,
}

pub struct TectonicWorld {
    pub width: u32,
    pub height: u32,
    pub plates: Vec<Plate>,
    /// Flat `width * height` raster, `y * width + x`.
    pub plate_of_tile: Vec<u32>,
    pub features: Vec<GeoFeature>,
    pub mantle: MantleState,
    tracker: SpeciesTracker,
}

impl TectonicWorld {
    /// Rehydrates a world from save-state parts (§6). The species-plate
    /// presence cache is not part of the schema and is rebuilt fresh here;
    /// it resynchronizes against current occupancy on the first post-load
    /// `advance` call.
    #[must_use]
    pub fn from_parts(width: u32, height: u32, plates: Vec<Plate>, plate_of_tile: Vec<u32>, features: Vec<GeoFeature>, mantle: MantleState) -> Self {
        Self { width, height, plates, plate_of_tile, features, mantle, tracker: SpeciesTracker::new() }
    }

    /// Generates a fresh plate partition and seeds a handful of mantle
    /// convection cells (§4.3 "Plate generation").
    pub fn generate<R: Rng + ?Sized>(width: u32, height: u32, world_config: &WorldConfig, rng: &mut R) -> Self {
        let generated = plate_gen::generate(width, height, world_config, rng);
        let convection_cells: Vec<ConvectionCell> = (0..4)
            .map(|_| ConvectionCell {
                center: (rng.gen_range(0.0..width as f32), rng.gen_range(0.0..height as f32)),
                strength: rng.gen_range(0.2..1.0),
            })
            .collect();

        Self {
            width,
            height,
            plates: generated.plates,
            plate_of_tile: generated.ownership,
            features: Vec::new(),
            mantle: MantleState::new(convection_cells),
            tracker: SpeciesTracker::new(),
        }
    }

    /// Plate ids a species currently has positive population on, per the
    /// species tracker's last `advance` call (§4.3). Used by the pipeline
    /// to find a contact species' neighbors across a just-reconnected
    /// boundary.
    #[must_use]
    pub fn species_plates(&self, lineage_code: &str) -> Option<&HashSet<u32>> {
        self.tracker.plates_for(lineage_code)
    }

    /// Every boundary cell pair `(plate_a, plate_b)` with adjacent tiles
    /// belonging to different plates, classified under current velocities.
    fn boundary_pairs(&self) -> HashMap<(u32, u32), BoundaryType> {
        let mut pairs: HashMap<(u32, u32), BoundaryType> = HashMap::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let own = self.plate_of_tile[(y * self.width + x) as usize];
                for (nx, ny) in Tile::neighbor_coords(x, y, self.width, self.height) {
                    let other = self.plate_of_tile[(ny * self.width + nx) as usize];
                    if other == own {
                        continue;
                    }
                    let key = pair_key(own, other);
                    if pairs.contains_key(&key) {
                        continue;
                    }
                    let plate_a = &self.plates[own as usize];
                    let plate_b = &self.plates[other as usize];
                    pairs.insert(key, boundary::classify(plate_a, plate_b));
                }
            }
        }
        pairs
    }

    /// Advances the subsystem by one turn: mantle phase, plate motion,
    /// boundary reclassification, terrain deltas written into `env`'s
    /// elevation channel, earthquake/volcanic rolls, and species-plate
    /// connectivity tracking.
    #[allow(clippy::too_many_arguments)]
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        env: &mut Tensor3,
        pop: &Tensor3,
        species: &[Species],
        species_map: &SpeciesMap,
        pressures: &[PressureDescriptor],
        config: &TectonicConfig,
        turn: u64,
        rng: &mut R,
    ) -> TectonicTurnOutputs {
        self.mantle.step(&mut self.plates);
        motion::step(&mut self.plates, pressures, self.height as f32, config);

        let boundaries = self.boundary_pairs();
        let mut tectonic_events = Vec::new();

        let elevation = env.channel_mut(EnvChannel::Elevation.index());
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                let own = self.plate_of_tile[idx];
                for (nx, ny) in Tile::neighbor_coords(x, y, self.width, self.height) {
                    let other = self.plate_of_tile[(ny * self.width + nx) as usize];
                    if other == own {
                        continue;
                    }
                    let Some(&boundary_type) = boundaries.get(&pair_key(own, other)) else { continue };
                    let tile = Tile {
                        x,
                        y,
                        biome: primordium_data::tile::Biome::Plains,
                        elevation_m: elevation[idx],
                        temperature_c: 0.0,
                        humidity: 0.0,
                        resources: 0.0,
                        plate_id: own,
                    };
                    let delta = boundary::terrain_delta(boundary_type, &tile, &self.plates[own as usize], &self.plates[other as usize], config);
                    elevation[idx] += delta;

                    if let Some(event) =
                        features::maybe_earthquake(boundary_type, own, x, y, turn, pressures, config, rng)
                    {
                        tectonic_events.push(event);
                    }
                    if let Some(kind) = features::volcano_kind_for_boundary(boundary_type) {
                        let nearby_exists = self.features.iter().any(|f| f.kind == kind && f.x == x && f.y == y);
                        if !nearby_exists && features::can_place_hotspot(x, y, &self.features, config.min_eruption_interval_turns.min(6) as u32) {
                            self.features.push(GeoFeature {
                                kind,
                                x,
                                y,
                                intensity: (delta.abs() / config.max_elevation_delta_per_turn.max(1e-3)).clamp(0.1, 1.0),
                                owning_plate: own,
                                dormant: false,
                                last_eruption_turn: None,
                            });
                            tectonic_events.push(TectonicEvent {
                                kind: TectonicEventKind::TerrainChange,
                                turn,
                                plate_id: own,
                                x,
                                y,
                                intensity: Some(delta.abs()),
                            });
                        }
                    }
                }
            }
        }

        for feature in &mut self.features {
            if let Some(event) = features::maybe_erupt(feature, turn, pressures, config, rng) {
                tectonic_events.push(event);
            }
        }

        let (isolation_events, contact_events) =
            self.tracker.update(pop, species, species_map, &self.plate_of_tile, &boundaries, turn);

        let earthquake_count = tectonic_events.iter().filter(|e| e.kind == TectonicEventKind::Earthquake).count();
        let volcanic_count = tectonic_events.iter().filter(|e| e.kind == TectonicEventKind::Volcanic).count();
        let mut pressure_feedback = HashMap::new();
        pressure_feedback.insert("tectonic".to_string(), earthquake_count as f32 * 0.05);
        pressure_feedback.insert("volcanic".to_string(), volcanic_count as f32 * 0.1);

        TectonicTurnOutputs { tectonic_events, isolation_events, contact_events, pressure_feedback }
    }
}
