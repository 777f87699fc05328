//! Boundary reclassification and terrain-delta computation (§4.3 "Motion
//! engine", boundary bullets).

use crate::config::TectonicConfig;
use primordium_data::plate::{BoundaryType, Plate, PlateType};
use primordium_data::tile::Tile;

/// Relative-motion projection along the line joining two plate centroids,
/// positive meaning the plates are closing on each other.
fn closing_speed(a: &Plate, b: &Plate) -> f32 {
    let dx = b.rotation_center.0 - a.rotation_center.0;
    let dy = b.rotation_center.1 - a.rotation_center.1;
    let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
    let (nx, ny) = (dx / dist, dy / dist);
    let relative = (a.velocity.0 - b.velocity.0, a.velocity.1 - b.velocity.1);
    relative.0 * nx + relative.1 * ny
}

/// Shear component: relative motion perpendicular to the centroid line.
fn shear_speed(a: &Plate, b: &Plate) -> f32 {
    let dx = b.rotation_center.0 - a.rotation_center.0;
    let dy = b.rotation_center.1 - a.rotation_center.1;
    let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
    let (tx, ty) = (-dy / dist, dx / dist);
    let relative = (a.velocity.0 - b.velocity.0, a.velocity.1 - b.velocity.1);
    relative.0 * tx + relative.1 * ty
}

const CONTRACTION_THRESHOLD: f32 = 0.15;
const SHEAR_DOMINANCE_RATIO: f32 = 1.5;

/// Contraction -> convergent (or subduction if one plate is oceanic),
/// expansion -> divergent, shear -> transform (§4.3).
#[must_use]
pub fn classify(a: &Plate, b: &Plate) -> BoundaryType {
    let closing = closing_speed(a, b);
    let shear = shear_speed(a, b).abs();

    if shear > closing.abs() * SHEAR_DOMINANCE_RATIO {
        return BoundaryType::Transform;
    }
    if closing > CONTRACTION_THRESHOLD {
        if a.plate_type == PlateType::Oceanic || b.plate_type == PlateType::Oceanic {
            return BoundaryType::Subduction;
        }
        return BoundaryType::Convergent;
    }
    BoundaryType::Divergent
}

/// Single-turn elevation delta for a boundary tile, capped to
/// `max_elevation_delta_per_turn` (§4.3: "temporally stable").
#[must_use]
pub fn terrain_delta(boundary: BoundaryType, tile: &Tile, owning: &Plate, other: &Plate, config: &TectonicConfig) -> f32 {
    let raw = match boundary {
        BoundaryType::Convergent => 8.0,
        BoundaryType::Subduction => {
            if owning.plate_type == PlateType::Oceanic {
                -6.0
            } else {
                10.0
            }
        }
        BoundaryType::Divergent => -4.0,
        BoundaryType::Transform => 0.5,
    };

    let erosion = if tile.elevation_m > 2000.0 { -(tile.elevation_m - 2000.0) * config.erosion_rate } else { 0.0 };
    let _ = other;
    (raw + erosion).clamp(-config.max_elevation_delta_per_turn, config.max_elevation_delta_per_turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::plate::MotionPhase;
    use primordium_data::tile::Biome;

    fn plate_at(x: f32, y: f32, vx: f32, vy: f32, plate_type: PlateType) -> Plate {
        Plate {
            id: 0,
            plate_type,
            density: 2.7,
            thickness_km: 35.0,
            age_turns: 0,
            velocity: (vx, vy),
            angular_velocity: 0.0,
            rotation_center: (x, y),
            motion_phase: MotionPhase::Stable,
            tile_count: 10,
            boundary_tile_count: 2,
        }
    }

    #[test]
    fn head_on_closing_motion_is_convergent() {
        let a = plate_at(0.0, 0.0, 1.0, 0.0, PlateType::Continental);
        let b = plate_at(10.0, 0.0, -1.0, 0.0, PlateType::Continental);
        assert_eq!(classify(&a, &b), BoundaryType::Convergent);
    }

    #[test]
    fn closing_motion_with_oceanic_plate_is_subduction() {
        let a = plate_at(0.0, 0.0, 1.0, 0.0, PlateType::Oceanic);
        let b = plate_at(10.0, 0.0, -1.0, 0.0, PlateType::Continental);
        assert_eq!(classify(&a, &b), BoundaryType::Subduction);
    }

    #[test]
    fn receding_motion_is_divergent() {
        let a = plate_at(0.0, 0.0, -1.0, 0.0, PlateType::Continental);
        let b = plate_at(10.0, 0.0, 1.0, 0.0, PlateType::Continental);
        assert_eq!(classify(&a, &b), BoundaryType::Divergent);
    }

    #[test]
    fn elevation_delta_is_capped() {
        let config = TectonicConfig { max_elevation_delta_per_turn: 2.0, ..TectonicConfig::default() };
        let owning = plate_at(0.0, 0.0, 0.0, 0.0, PlateType::Continental);
        let other = plate_at(1.0, 0.0, 0.0, 0.0, PlateType::Continental);
        let tile = Tile { x: 0, y: 0, biome: Biome::Plains, elevation_m: 100.0, temperature_c: 10.0, humidity: 0.5, resources: 0.5, plate_id: 0 };
        let delta = terrain_delta(BoundaryType::Convergent, &tile, &owning, &other, &config);
        assert!(delta <= 2.0);
    }
}
