//! Save-state schema (§6 "Save-state schema (conceptual)"): a versioned,
//! forward-tolerant snapshot of everything needed to resume a world.
//!
//! `SpeciesTracker`'s plate-presence cache is deliberately not part of the
//! schema: it's a derived diffing cache the tectonic subsystem rebuilds
//! from `species` and `plate_of_tile` on its first post-load turn, not
//! canonical state (see DESIGN.md).

use primordium_core::tectonics::mantle::MantleState;
use primordium_data::plate::{GeoFeature, Plate};
use primordium_data::species::Species;
use primordium_data::tile::Tile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Per-species counters that live outside `Species` itself because they
/// describe bookkeeping about a lineage rather than its biology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesHistory {
    #[serde(default)]
    pub last_description_update_turn: u64,
    #[serde(default)]
    pub accumulated_adaptation_score: f32,
}

/// One rolling entry of the metrics history captured at save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSample {
    pub turn: u64,
    pub species_count: u32,
    pub tile_count: u32,
    pub duration_ms: u64,
}

/// A complete, versioned save of a running world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub turn: u64,
    pub plates: Vec<Plate>,
    /// Flat `width * height` raster, `y * width + x`, matching
    /// [`primordium_core::tectonics::TectonicWorld::plate_of_tile`].
    pub plate_of_tile: Vec<u32>,
    pub tiles: Vec<Tile>,
    pub features: Vec<GeoFeature>,
    pub mantle: MantleState,
    pub species: Vec<Species>,
    #[serde(default)]
    pub species_history: HashMap<String, SpeciesHistory>,
    #[serde(default)]
    pub pressure_feedback: HashMap<String, f32>,
    #[serde(default)]
    pub metrics_history: Vec<MetricsSample>,
    /// The config fingerprint ([`primordium_core::config::AppConfig::fingerprint`])
    /// active when this save was written, so a loader can warn on mismatch
    /// rather than silently running with different balance constants.
    #[serde(default)]
    pub config_fingerprint: Option<String>,
}

impl Snapshot {
    /// Structural self-checks a loader should run before trusting a save
    /// (§7 "engine invariant violation" exit path).
    pub fn validate(&self) -> crate::error::Result<()> {
        let expected_tiles = self.width as usize * self.height as usize;
        if self.tiles.len() != expected_tiles {
            return Err(crate::error::IoError::validation(format!(
                "tile count {} does not match width*height {}",
                self.tiles.len(),
                expected_tiles
            )));
        }
        if self.plate_of_tile.len() != expected_tiles {
            return Err(crate::error::IoError::validation(format!(
                "plate_of_tile length {} does not match width*height {}",
                self.plate_of_tile.len(),
                expected_tiles
            )));
        }
        let max_plate_id = self.plates.len() as u32;
        if self.plate_of_tile.iter().any(|&id| id >= max_plate_id) {
            return Err(crate::error::IoError::validation("plate_of_tile references an out-of-range plate id"));
        }
        if self.version > SNAPSHOT_VERSION {
            return Err(crate::error::IoError::VersionUnsupported(self.version));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_core::tectonics::mantle::{ConvectionCell, MantlePhase};
    use primordium_data::plate::{MotionPhase, PlateType};
    use primordium_data::tile::Biome;

    fn sample_snapshot() -> Snapshot {
        let plate = Plate {
            id: 0,
            plate_type: PlateType::Continental,
            density: 2.7,
            thickness_km: 35.0,
            age_turns: 0,
            velocity: (0.0, 0.0),
            angular_velocity: 0.0,
            rotation_center: (0.0, 0.0),
            motion_phase: MotionPhase::Stable,
            tile_count: 4,
            boundary_tile_count: 0,
        };
        let tile = Tile { x: 0, y: 0, biome: Biome::Plains, elevation_m: 100.0, temperature_c: 20.0, humidity: 0.5, resources: 0.5, plate_id: 0 };
        Snapshot {
            version: SNAPSHOT_VERSION,
            width: 2,
            height: 2,
            seed: 42,
            turn: 10,
            plates: vec![plate],
            plate_of_tile: vec![0, 0, 0, 0],
            tiles: vec![tile.clone(), tile.clone(), tile.clone(), tile],
            features: vec![],
            mantle: MantleState::new(vec![ConvectionCell { center: (0.0, 0.0), strength: 0.5 }]),
            species: vec![],
            species_history: HashMap::new(),
            pressure_feedback: HashMap::new(),
            metrics_history: vec![],
            config_fingerprint: None,
        }
    }

    #[test]
    fn valid_snapshot_passes_validation() {
        assert!(sample_snapshot().validate().is_ok());
    }

    #[test]
    fn mismatched_tile_count_fails_validation() {
        let mut snap = sample_snapshot();
        snap.tiles.pop();
        assert!(snap.validate().is_err());
    }

    #[test]
    fn out_of_range_plate_id_fails_validation() {
        let mut snap = sample_snapshot();
        snap.plate_of_tile[0] = 99;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn deserializing_without_optional_fields_uses_defaults() {
        let json = serde_json::json!({
            "version": 1,
            "width": 1,
            "height": 1,
            "seed": 1,
            "turn": 0,
            "plates": [],
            "plate_of_tile": [],
            "tiles": [],
            "features": [],
            "mantle": {"phase": "Supercontinent", "progress": 0.0, "convection_cells": [], "total_cycles": 0},
            "species": [],
        });
        let snap: Snapshot = serde_json::from_value(json).unwrap();
        assert!(snap.species_history.is_empty());
        assert!(snap.metrics_history.is_empty());
        assert_eq!(snap.mantle.phase, MantlePhase::Supercontinent);
    }
}
