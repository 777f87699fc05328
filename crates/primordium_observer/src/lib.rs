//! Model Router Contract (§4.7): capability-indexed dispatch to remote AI
//! providers with a deterministic local fallback, plus the narrative
//! worker built on top of it.

pub mod capability;
pub mod http;
pub mod local;
pub mod narrative;
pub mod router;

pub use capability::{CapabilityOverride, CapabilityTable, ModelConfig};
pub use local::InvocationResult;
pub use narrative::{HeuristicNarrator, NarrationLog, Narrator, RoutedNarrator};
pub use router::{Diagnostics, Router, StreamEvent};
