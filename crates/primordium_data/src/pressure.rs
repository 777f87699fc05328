//! The pressure vocabulary (§6) and the descriptors callers submit per turn.

use serde::{Deserialize, Serialize};

/// A recognized environmental pressure kind. Closed per §6 — the pressure
/// bridge has a fixed mapping from each kind to an overlay channel and scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureKind {
    Temperature,
    Drought,
    Humidity,
    Radiation,
    Predation,
    VolcanicEruption,
    Orogeny,
    EarthquakePeriod,
}

impl PressureKind {
    pub const ALL: [PressureKind; 8] = [
        PressureKind::Temperature,
        PressureKind::Drought,
        PressureKind::Humidity,
        PressureKind::Radiation,
        PressureKind::Predation,
        PressureKind::VolcanicEruption,
        PressureKind::Orogeny,
        PressureKind::EarthquakePeriod,
    ];

    /// Whether this pressure feeds the tectonic motion engine rather than
    /// an `env` overlay channel.
    #[must_use]
    pub fn is_tectonic(self) -> bool {
        matches!(self, PressureKind::Orogeny | PressureKind::EarthquakePeriod)
    }
}

/// A tile-coordinate rectangle, inclusive on both ends, used to bound a
/// pressure's spatial extent. `None` on [`PressureDescriptor::extent`] means
/// the pressure applies to every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureExtent {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PressureExtent {
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }
}

/// One pressure instance in a turn-run request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureDescriptor {
    pub kind: PressureKind,
    pub intensity: u8,
    pub extent: Option<PressureExtent>,
    pub narrative_note: Option<String>,
}

impl PressureDescriptor {
    /// Intensity is an integer in `[1, 10]` (§6).
    #[must_use]
    pub fn is_intensity_valid(&self) -> bool {
        (1..=10).contains(&self.intensity)
    }

    #[must_use]
    pub fn applies_to(&self, x: u32, y: u32) -> bool {
        match &self.extent {
            Some(extent) => extent.contains(x, y),
            None => true,
        }
    }
}
