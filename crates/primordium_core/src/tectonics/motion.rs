//! Per-turn plate motion update (§4.3 "Motion engine"): pressure-driven
//! speed multipliers, latitude damping, velocity clamping, and polar bounce.

use crate::config::TectonicConfig;
use primordium_data::plate::{MotionPhase, Plate};
use primordium_data::pressure::{PressureDescriptor, PressureKind};

/// Orogeny boosts colliding plates, rifting boosts diverging plates (§4.3).
fn pressure_speed_multiplier(plate: &Plate, pressures: &[PressureDescriptor]) -> f32 {
    let mut multiplier = 1.0;
    for p in pressures {
        let boost = match (p.kind, plate.motion_phase) {
            (PressureKind::Orogeny, MotionPhase::Colliding | MotionPhase::Subducting) => {
                1.0 + f32::from(p.intensity) * 0.1
            }
            (PressureKind::Orogeny, MotionPhase::Rifting | MotionPhase::Drifting) => {
                1.0 + f32::from(p.intensity) * 0.03
            }
            _ => 1.0,
        };
        multiplier *= boost;
    }
    multiplier
}

/// Damping grows toward the poles, modeling mantle drag that is stronger
/// away from the equatorial upwelling band.
fn latitude_damping(y: f32, world_height: f32, base_damping: f32) -> f32 {
    let center = world_height / 2.0;
    let normalized = ((y - center).abs() / center.max(1.0)).clamp(0.0, 1.0);
    1.0 - base_damping * normalized
}

/// Advances every plate's velocity by one turn: pressure multiplier,
/// latitude damping, speed clamp, then polar bounce if the plate's
/// rotation center is about to cross the map edge.
pub fn step(plates: &mut [Plate], pressures: &[PressureDescriptor], world_height: f32, config: &TectonicConfig) {
    for plate in plates.iter_mut() {
        let multiplier = pressure_speed_multiplier(plate, pressures);
        plate.velocity.0 *= multiplier;
        plate.velocity.1 *= multiplier;

        let damping = latitude_damping(plate.rotation_center.1, world_height, config.latitude_damping);
        plate.velocity.0 *= damping;
        plate.velocity.1 *= damping;

        plate.clamp_speed(config.min_velocity, config.max_velocity);

        plate.rotation_center.0 += plate.velocity.0;
        plate.rotation_center.1 += plate.velocity.1;

        let margin = world_height * 0.02;
        if plate.rotation_center.1 < margin || plate.rotation_center.1 > world_height - margin {
            plate.velocity.1 = -plate.velocity.1;
            plate.rotation_center.1 = plate.rotation_center.1.clamp(margin, world_height - margin);
        }

        plate.age_turns += 1;
    }
}
