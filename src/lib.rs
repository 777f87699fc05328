//! Thin facade wiring the engine crates together behind a single
//! `Engine` entry point for the CLI binary.

pub mod engine;

pub use engine::{Engine, RunError, TurnRunRequest};

pub use primordium_core::config::AppConfig;
pub use primordium_data::context::TurnReport;
pub use primordium_data::pressure::{PressureDescriptor, PressureExtent, PressureKind};
pub use primordium_data::species::Species;
pub use primordium_io::Snapshot;
