//! # Primordium Data
//!
//! Plain data types shared across the Primordium engine: species records,
//! world tiles, tectonic plates, the environment/population/parameter
//! tensors, per-turn context and report types, and the save-state schema.
//!
//! This crate holds no simulation logic — only the types the engine
//! (`primordium_core`), the model-router collaborator (`primordium_observer`)
//! and the persistence layer (`primordium_io`) all need to agree on.

/// Species records, lineage codes, traits, organs and diet/habitat enums.
pub mod species;
/// Hex-grid tile and biome types.
pub mod tile;
/// Tectonic plate and geological feature types.
pub mod plate;
/// Flat `(C, H, W)`/`(S, H, W)`/`(S, F)` tensor buffers used by the ecology engine.
pub mod tensor;
/// Turn-scoped working context and the per-turn report emitted to callers.
pub mod context;
/// Speciation, extinction, tectonic and adaptation event types.
pub mod events;
/// Pressure vocabulary and descriptors (the pressure bridge's input).
pub mod pressure;

pub use context::{TurnContext, TurnReport};
pub use events::{AdaptationEvent, ContactEvent, ExtinctionEvent, IsolationEvent, SpeciationEvent, TectonicEvent};
pub use plate::{BoundaryType, GeoFeature, GeoFeatureKind, MotionPhase, Plate, PlateType};
pub use pressure::{PressureDescriptor, PressureKind};
pub use species::{
    DietType, Era, HabitatType, Organ, OrganCategory, OrganEvolutionStage, Species, SpeciesStatus,
};
pub use tensor::{SpeciesMap, SpeciesParamsTensor, Tensor2, Tensor3};
pub use tile::Tile;
