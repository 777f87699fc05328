//! Wilson-cycle mantle dynamics (§4.3 "Mantle dynamics"): a global phase
//! that cycles forever, each phase nudging plate velocities, plus a handful
//! of convection cells that add their own velocity contribution near their
//! centroid.

use primordium_data::plate::Plate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MantlePhase {
    Supercontinent,
    Rifting,
    Drifting,
    Subduction,
    Collision,
    Orogeny,
}

impl MantlePhase {
    const CYCLE: [MantlePhase; 6] = [
        MantlePhase::Supercontinent,
        MantlePhase::Rifting,
        MantlePhase::Drifting,
        MantlePhase::Subduction,
        MantlePhase::Collision,
        MantlePhase::Orogeny,
    ];

    #[must_use]
    fn next(self) -> Self {
        let idx = Self::CYCLE.iter().position(|&p| p == self).unwrap_or(0);
        Self::CYCLE[(idx + 1) % Self::CYCLE.len()]
    }

    /// Global velocity multiplier applied to every plate while this phase
    /// is active.
    #[must_use]
    pub fn velocity_modifier(self) -> f32 {
        match self {
            MantlePhase::Supercontinent => 0.3,
            MantlePhase::Rifting => 1.4,
            MantlePhase::Drifting => 1.0,
            MantlePhase::Subduction => 1.2,
            MantlePhase::Collision => 0.8,
            MantlePhase::Orogeny => 0.6,
        }
    }

    /// Directional bias applied to plates whose motion phase matches this
    /// mantle phase's theme (e.g. rifting plates accelerate outward during
    /// a `Rifting` mantle phase).
    #[must_use]
    fn directional_bias(self, plate: &Plate) -> (f32, f32) {
        use primordium_data::plate::MotionPhase;
        match (self, plate.motion_phase) {
            (MantlePhase::Rifting, MotionPhase::Rifting) => (plate.velocity.0 * 0.1, plate.velocity.1 * 0.1),
            (MantlePhase::Collision, MotionPhase::Colliding) => (-plate.velocity.0 * 0.1, -plate.velocity.1 * 0.1),
            (MantlePhase::Subduction, MotionPhase::Subducting) => (plate.velocity.0 * 0.15, plate.velocity.1 * 0.15),
            _ => (0.0, 0.0),
        }
    }
}

/// A single mantle convection cell, contributing additive velocity at
/// nearby plate centroids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConvectionCell {
    pub center: (f32, f32),
    pub strength: f32,
}

/// How far a phase advances per turn before cycling to the next one.
pub const PHASE_STEP: f32 = 1.0 / 40.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MantleState {
    pub phase: MantlePhase,
    pub progress: f32,
    pub convection_cells: Vec<ConvectionCell>,
    pub total_cycles: u64,
}

impl MantleState {
    #[must_use]
    pub fn new(convection_cells: Vec<ConvectionCell>) -> Self {
        Self { phase: MantlePhase::Supercontinent, progress: 0.0, convection_cells, total_cycles: 0 }
    }

    /// Advances the Wilson cycle by one turn and folds this phase's velocity
    /// modifier, directional biases, and convection-cell contributions into
    /// every plate's velocity. Does not clamp or damp — [`super::motion`]
    /// does that afterward.
    pub fn step(&mut self, plates: &mut [Plate]) {
        self.progress += PHASE_STEP;
        if self.progress >= 1.0 {
            self.progress -= 1.0;
            let was_last_phase = self.phase == MantlePhase::Orogeny;
            self.phase = self.phase.next();
            if was_last_phase {
                self.total_cycles += 1;
            }
        }

        let modifier = self.phase.velocity_modifier();
        for plate in plates.iter_mut() {
            plate.velocity = (plate.velocity.0 * modifier, plate.velocity.1 * modifier);
            let (bx, by) = self.phase.directional_bias(plate);
            plate.velocity.0 += bx;
            plate.velocity.1 += by;

            for cell in &self.convection_cells {
                let (cx, cy) = cell.center;
                let dx = plate.rotation_center.0 - cx;
                let dy = plate.rotation_center.1 - cy;
                let dist = (dx * dx + dy * dy).sqrt().max(1.0);
                let falloff = (cell.strength / dist).min(cell.strength);
                plate.velocity.0 += (dx / dist) * falloff;
                plate.velocity.1 += (dy / dist) * falloff;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::plate::{MotionPhase, PlateType};

    fn plate() -> Plate {
        Plate {
            id: 0,
            plate_type: PlateType::Continental,
            density: 2.7,
            thickness_km: 35.0,
            age_turns: 0,
            velocity: (1.0, 0.0),
            angular_velocity: 0.0,
            rotation_center: (5.0, 5.0),
            motion_phase: MotionPhase::Stable,
            tile_count: 10,
            boundary_tile_count: 2,
        }
    }

    #[test]
    fn phase_cycles_and_counts_full_rotations() {
        let mut state = MantleState::new(vec![]);
        let mut plates = vec![plate()];
        for _ in 0..(40 * 6) {
            state.step(&mut plates);
        }
        assert_eq!(state.total_cycles, 1);
        assert_eq!(state.phase, MantlePhase::Supercontinent);
    }

    #[test]
    fn convection_cell_perturbs_velocity() {
        let mut state = MantleState::new(vec![ConvectionCell { center: (0.0, 0.0), strength: 2.0 }]);
        let mut plates = vec![plate()];
        let before = plates[0].velocity;
        state.step(&mut plates);
        assert_ne!(before, plates[0].velocity);
    }
}
