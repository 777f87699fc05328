//! Flat tensor buffers shared by the ecology engine: `env` (C,H,W), `pop`
//! (S,H,W) and `species_params` (S,F), plus the lineage-code <-> row-index
//! bijection that addresses them.
//!
//! These are plain row-major flat buffers, not a tensor-algebra library:
//! the engine's kernels (`primordium_core::tensors`) own the math, this
//! crate only owns shape and indexing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A 2-D `(rows, cols)` flat buffer, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor2 {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Tensor2 {
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Appends a zeroed row, growing `rows` by one. Used when a new species
    /// is created mid-simulation and every per-species tensor must grow in
    /// lockstep (§3 tensor invariant: all three tensors agree on `S`).
    pub fn push_row(&mut self) {
        self.data.resize(self.data.len() + self.cols, 0.0);
        self.rows += 1;
    }
}

/// A 3-D `(channels, height, width)` flat buffer, row-major within each
/// channel. Used for both `env` (channels = environment channels) and `pop`
/// (channels = species index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor3 {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl Tensor3 {
    #[must_use]
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width, data: vec![0.0; channels * height * width] }
    }

    #[inline]
    #[must_use]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    #[inline]
    #[must_use]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(c, y, x)]
    }

    #[inline]
    pub fn set(&mut self, c: usize, y: usize, x: usize, value: f32) {
        let i = self.index(c, y, x);
        self.data[i] = value;
    }

    #[must_use]
    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }

    pub fn channel_mut(&mut self, c: usize) -> &mut [f32] {
        let plane = self.height * self.width;
        &mut self.data[c * plane..(c + 1) * plane]
    }

    /// Appends a zeroed channel, growing `channels` by one.
    pub fn push_channel(&mut self) {
        self.data.resize(self.data.len() + self.height * self.width, 0.0);
        self.channels += 1;
    }

    /// Sets an entire channel's values to zero, e.g. when a species goes
    /// extinct and its `pop` row must be zeroed (§3 tensor invariant).
    pub fn zero_channel(&mut self, c: usize) {
        for v in self.channel_mut(c) {
            *v = 0.0;
        }
    }

    #[must_use]
    pub fn channel_sum(&self, c: usize) -> f64 {
        self.channel(c).iter().map(|&v| v as f64).sum()
    }
}

/// The fixed base `env` channels. Pressure-overlay channels are stacked
/// after these at runtime and addressed by [`crate::pressure::PressureKind`]
/// rather than by this enum, since which overlay channels exist varies by
/// turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvChannel {
    Elevation,
    Temperature,
    Humidity,
    Resources,
    HabitatTerrestrial,
    HabitatAquatic,
    HabitatAmphibious,
    /// Per-turn external pressure (radiation, predation, volcanic eruption);
    /// zeroed and rebuilt every turn by the pressure bridge, never persisted.
    ExternalPressure,
}

impl EnvChannel {
    pub const COUNT: usize = 8;

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            EnvChannel::Elevation => 0,
            EnvChannel::Temperature => 1,
            EnvChannel::Humidity => 2,
            EnvChannel::Resources => 3,
            EnvChannel::HabitatTerrestrial => 4,
            EnvChannel::HabitatAquatic => 5,
            EnvChannel::HabitatAmphibious => 6,
            EnvChannel::ExternalPressure => 7,
        }
    }
}

/// Named feature columns of `species_params` (S, F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeciesParamFeature {
    TemperaturePref,
    HumidityPref,
    HabitatAffinityTerrestrial,
    HabitatAffinityAquatic,
    HabitatAffinityAmphibious,
    ToleranceWidth,
    DispersalAbility,
    Mobility,
    ReproductiveRate,
}

impl SpeciesParamFeature {
    pub const COUNT: usize = 9;

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            SpeciesParamFeature::TemperaturePref => 0,
            SpeciesParamFeature::HumidityPref => 1,
            SpeciesParamFeature::HabitatAffinityTerrestrial => 2,
            SpeciesParamFeature::HabitatAffinityAquatic => 3,
            SpeciesParamFeature::HabitatAffinityAmphibious => 4,
            SpeciesParamFeature::ToleranceWidth => 5,
            SpeciesParamFeature::DispersalAbility => 6,
            SpeciesParamFeature::Mobility => 7,
            SpeciesParamFeature::ReproductiveRate => 8,
        }
    }
}

/// `species_params`: shape `(S, F)`, addressed by [`SpeciesParamFeature`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesParamsTensor {
    pub table: Tensor2,
}

impl SpeciesParamsTensor {
    #[must_use]
    pub fn zeros(species_count: usize) -> Self {
        Self { table: Tensor2::zeros(species_count, SpeciesParamFeature::COUNT) }
    }

    #[must_use]
    pub fn get(&self, species_idx: usize, feature: SpeciesParamFeature) -> f32 {
        self.table.get(species_idx, feature.index())
    }

    pub fn set(&mut self, species_idx: usize, feature: SpeciesParamFeature, value: f32) {
        self.table.set(species_idx, feature.index(), value);
    }

    pub fn push_species(&mut self) {
        self.table.push_row();
    }
}

/// The bijection between lineage code and tensor row index (`pop` and
/// `species_params`). Row indices are stable for the lifetime of a species;
/// extinct species keep their row (zeroed) rather than being compacted, so
/// that indices already captured by in-flight turn state remain valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesMap {
    codes: Vec<String>,
    index: HashMap<String, usize>,
}

impl SpeciesMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Inserts a new lineage code and returns its row index. Panics if the
    /// code is already present — callers must check first via
    /// [`SpeciesMap::index_of`].
    pub fn insert(&mut self, code: impl Into<String>) -> usize {
        let code = code.into();
        assert!(!self.index.contains_key(&code), "duplicate lineage code {code:?}");
        let idx = self.codes.len();
        self.index.insert(code.clone(), idx);
        self.codes.push(code);
        idx
    }

    #[must_use]
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.index.get(code).copied()
    }

    #[must_use]
    pub fn code_of(&self, index: usize) -> Option<&str> {
        self.codes.get(index).map(String::as_str)
    }
}
