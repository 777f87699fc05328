//! The hex-grid world surface: one [`Tile`] per cell, odd-q offset layout.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Biome {
    Ocean,
    Coast,
    Plains,
    Forest,
    Rainforest,
    Desert,
    Tundra,
    Ice,
    Mountain,
    Wetland,
}

/// A single odd-q hex cell. `x` wraps around the world width; `y` does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub biome: Biome,
    pub elevation_m: f32,
    pub temperature_c: f32,
    pub humidity: f32,
    pub resources: f32,
    pub plate_id: u32,
}

/// Lapse rate applied to temperature per meter of elevation (§3).
pub const LAPSE_RATE_C_PER_M: f32 = 0.006;

impl Tile {
    /// `temperature = base - 0.006 * elevation + latitude_term` (§3 invariant).
    /// `latitude_term` is supplied by the caller since it depends on world
    /// height and is not stored per tile.
    #[must_use]
    pub fn expected_temperature(base_c: f32, elevation_m: f32, latitude_term: f32) -> f32 {
        base_c - LAPSE_RATE_C_PER_M * elevation_m + latitude_term
    }

    #[must_use]
    pub fn temperature_is_consistent(&self, base_c: f32, latitude_term: f32, epsilon: f32) -> bool {
        (self.temperature_c - Self::expected_temperature(base_c, self.elevation_m, latitude_term)).abs()
            <= epsilon
    }

    /// The six odd-q neighbor offsets, in order N, NE, SE, S, SW, NW, for an
    /// even or odd column. `x` wraps modulo `world_width`; `y` does not wrap
    /// and neighbors beyond `[0, world_height)` are omitted.
    #[must_use]
    pub fn neighbor_coords(x: u32, y: u32, world_width: u32, world_height: u32) -> Vec<(u32, u32)> {
        let even = x % 2 == 0;
        let xi = x as i64;
        let yi = y as i64;
        let deltas: [(i64, i64); 6] = if even {
            [(0, -1), (1, -1), (1, 0), (0, 1), (-1, 0), (-1, -1)]
        } else {
            [(0, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)]
        };
        deltas
            .iter()
            .filter_map(|(dx, dy)| {
                let ny = yi + dy;
                if ny < 0 || ny >= world_height as i64 {
                    return None;
                }
                let nx = (xi + dx).rem_euclid(world_width as i64);
                Some((nx as u32, ny as u32))
            })
            .collect()
    }
}
