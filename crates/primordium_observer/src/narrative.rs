//! Narrative generation on top of the model router: a background worker
//! drains narration requests and asks the router for prose, falling back
//! to the heuristic narrator in local mode.

use crate::capability::NARRATIVE;
use crate::router::Router;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A single narrative entry describing a simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub tick: u64,
    pub event_type: String,
    pub text: String,
    pub severity: f32,
}

/// Trait for generating narrative text from simulation events.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn generate_narration(&self, tick: u64, event_type: &str, description: &str, severity: f32) -> String;
}

/// A template-based narrator that generates stylized narratives for known event types.
/// Used as the local-mode fallback when the router has no remote credentials.
pub struct HeuristicNarrator;

#[async_trait]
impl Narrator for HeuristicNarrator {
    async fn generate_narration(&self, tick: u64, event_type: &str, description: &str, severity: f32) -> String {
        let prefix = if severity > 0.8 { "◈" } else if severity > 0.5 { "◇" } else { "○" };
        match event_type {
            "ExtinctionEvent" => format!("{prefix} The Great Thinning: population collapsed. (Tick {tick})"),
            "TectonicEvent" => format!("{prefix} The Land Remembers: the crust has shifted. (Tick {tick})"),
            "SpeciationEvent" => format!("{prefix} A Lineage Branches: a new kind has emerged. (Tick {tick})"),
            "AdaptationEvent" => format!("{prefix} Slow Fire: a trait has shifted under pressure. (Tick {tick})"),
            _ => format!("{prefix} Turn {tick}: {description}"),
        }
    }
}

/// Asks the router for a narration, falling back to the heuristic
/// narrator when the router has no route or the remote call errors.
pub struct RoutedNarrator {
    router: Arc<Router>,
    fallback: HeuristicNarrator,
}

impl RoutedNarrator {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router, fallback: HeuristicNarrator }
    }
}

#[async_trait]
impl Narrator for RoutedNarrator {
    async fn generate_narration(&self, tick: u64, event_type: &str, description: &str, severity: f32) -> String {
        let payload = json!({"tick": tick, "event_type": event_type, "description": description, "severity": severity});
        let result = self.router.invoke(NARRATIVE, payload).await;
        match result.content {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => self.fallback.generate_narration(tick, event_type, description, severity).await,
        }
    }
}

struct NarrationRequest {
    tick: u64,
    event_type: String,
    description: String,
    severity: f32,
}

/// Background narration worker: queues requests over an unbounded
/// channel and drains them on a spawned task, capping retained history.
pub struct NarrationLog {
    narrations: Arc<Mutex<Vec<Narration>>>,
    max_history: usize,
    tx: mpsc::UnboundedSender<NarrationRequest>,
}

impl NarrationLog {
    pub fn new(narrator: Box<dyn Narrator>, max_history: usize) -> Self {
        let narrations = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<NarrationRequest>();
        let narrations_clone = Arc::clone(&narrations);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                while let Some(req) = rx.recv().await {
                    let text = narrator.generate_narration(req.tick, &req.event_type, &req.description, req.severity).await;
                    let narration = Narration { tick: req.tick, event_type: req.event_type, text, severity: req.severity };
                    if let Ok(mut list) = narrations_clone.lock() {
                        if list.len() >= max_history {
                            list.remove(0);
                        }
                        list.push(narration);
                    }
                }
            });
        }

        Self { narrations, max_history, tx }
    }

    pub fn narrate(&self, tick: u64, event_type: &str, description: &str, severity: f32) {
        let _ = self.tx.send(NarrationRequest { tick, event_type: event_type.to_string(), description: description.to_string(), severity });
    }

    pub fn consume(&self) -> Vec<Narration> {
        if let Ok(mut list) = self.narrations.lock() {
            std::mem::take(&mut *list)
        } else {
            Vec::new()
        }
    }
}
