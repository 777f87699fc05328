//! Engine error types (§7).
//!
//! Configuration and invariant violations are fatal and surfaced with
//! [`EngineError`]; transient failures (model-router timeouts, per-species
//! soft failures) are recovered locally and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("unknown lineage code: {0}")]
    UnknownLineageCode(String),

    #[error("tile ({x}, {y}) has no owning plate")]
    TileMissingPlate { x: u32, y: u32 },

    #[error("backend initialization failed: {0}")]
    BackendInit(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
