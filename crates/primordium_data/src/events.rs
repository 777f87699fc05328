//! Event types emitted by the tectonic subsystem, the speciation monitor,
//! and the adaptation/degeneration/hybridization services.

use crate::species::TraitName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the tensor speciation monitor detected (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SpeciationTrigger {
    /// `component_masks[i]` lists the `(x, y)` cells of connected component `i`.
    GeographicIsolation { component_masks: Vec<Vec<(u32, u32)>> },
    EcologicalDivergence { divergence: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciationEvent {
    pub parent_code: String,
    pub child_code: String,
    pub turn: u64,
    pub trigger: SpeciationTrigger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtinctionEvent {
    pub lineage_code: String,
    pub turn: u64,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TectonicEventKind {
    Earthquake,
    Volcanic,
    TerrainChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TectonicEvent {
    pub kind: TectonicEventKind,
    pub turn: u64,
    pub plate_id: u32,
    pub x: u32,
    pub y: u32,
    pub intensity: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptationEventKind {
    GradualAdaptation,
    Degeneration,
    AutoTradeoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationEvent {
    pub lineage_code: String,
    pub turn: u64,
    pub kind: AdaptationEventKind,
    pub trait_deltas: HashMap<TraitName, f32>,
}

/// A species' populations on two plates were connected last turn and are
/// not this turn (§4.3 species tracker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationEvent {
    pub lineage_code: String,
    pub plate_a: u32,
    pub plate_b: u32,
    pub turn: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    Competition,
    Predation,
    Neutral,
}

/// A previously disconnected plate pair regained a connected path and a
/// species present on both now interacts (§4.3 species tracker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactEvent {
    pub lineage_code: String,
    pub plate_a: u32,
    pub plate_b: u32,
    pub turn: u64,
    pub interaction: InteractionType,
}
