//! Tectonic plates and the geological features seated on them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateType {
    Continental,
    Oceanic,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionPhase {
    Stable,
    Rifting,
    Drifting,
    Colliding,
    Subducting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryType {
    Convergent,
    Divergent,
    Transform,
    Subduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoFeatureKind {
    Volcano,
    Hotspot,
    Trench,
    Ridge,
    Rift,
    Lake,
    MountainRange,
    CraterLake,
}

impl GeoFeatureKind {
    /// Whether this feature can erupt and is therefore subject to the
    /// minimum inter-eruption interval.
    #[must_use]
    pub fn can_erupt(self) -> bool {
        matches!(self, GeoFeatureKind::Volcano | GeoFeatureKind::Hotspot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFeature {
    pub kind: GeoFeatureKind,
    pub x: u32,
    pub y: u32,
    pub intensity: f32,
    pub owning_plate: u32,
    pub dormant: bool,
    pub last_eruption_turn: Option<u64>,
}

impl GeoFeature {
    #[must_use]
    pub fn is_intensity_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.intensity)
    }

    pub fn can_erupt_at(&self, turn: u64, min_interval: u64) -> bool {
        if self.dormant || !self.kind.can_erupt() {
            return false;
        }
        match self.last_eruption_turn {
            Some(last) => turn.saturating_sub(last) >= min_interval,
            None => true,
        }
    }
}

/// A tectonic plate. `id` indexes into the world's plate arena; tiles refer
/// back to plates only by this id, never by reference (§9 re-architecture
/// note on cyclic back-references).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plate {
    pub id: u32,
    pub plate_type: PlateType,
    pub density: f32,
    pub thickness_km: f32,
    pub age_turns: u64,
    pub velocity: (f32, f32),
    pub angular_velocity: f32,
    pub rotation_center: (f32, f32),
    pub motion_phase: MotionPhase,
    pub tile_count: u32,
    pub boundary_tile_count: u32,
}

impl Plate {
    #[must_use]
    pub fn speed(&self) -> f32 {
        let (vx, vy) = self.velocity;
        (vx * vx + vy * vy).sqrt()
    }

    pub fn clamp_speed(&mut self, min_velocity: f32, max_velocity: f32) {
        let speed = self.speed();
        if speed < 1e-6 {
            return;
        }
        let clamped = speed.clamp(min_velocity, max_velocity);
        if (clamped - speed).abs() > 1e-6 {
            let scale = clamped / speed;
            self.velocity = (self.velocity.0 * scale, self.velocity.1 * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plate() -> Plate {
        Plate {
            id: 0,
            plate_type: PlateType::Continental,
            density: 2.7,
            thickness_km: 35.0,
            age_turns: 0,
            velocity: (3.0, 4.0),
            angular_velocity: 0.0,
            rotation_center: (0.0, 0.0),
            motion_phase: MotionPhase::Stable,
            tile_count: 10,
            boundary_tile_count: 2,
        }
    }

    #[test]
    fn speed_is_euclidean_norm() {
        let p = sample_plate();
        assert!((p.speed() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_speed_rescales_velocity() {
        let mut p = sample_plate();
        p.clamp_speed(0.0, 2.0);
        assert!((p.speed() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn eruption_gating_respects_min_interval() {
        let f = GeoFeature {
            kind: GeoFeatureKind::Volcano,
            x: 0,
            y: 0,
            intensity: 0.5,
            owning_plate: 0,
            dormant: false,
            last_eruption_turn: Some(10),
        };
        assert!(!f.can_erupt_at(12, 5));
        assert!(f.can_erupt_at(16, 5));
    }
}
