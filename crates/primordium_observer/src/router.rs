//! Capability-dispatching model router (§4.7): the single entry point the
//! engine calls for name-and-description generation and narrative hints.
//!
//! Concurrency is capped by a semaphore, failed requests are retried with
//! exponential backoff (longer for `429`s), and every invocation returns a
//! result rather than raising across the async boundary.

use crate::capability::{CapabilityOverride, CapabilityTable, ModelConfig};
use crate::http::{self, PreparedRequest};
use crate::local::InvocationResult;
use primordium_core::config::RouterConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// One event in a capability's streaming response (§4.7).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Status { state: String },
    Error { message: String },
    Chunk(String),
}

/// Per-capability request counters, used by [`Router::diagnostics`].
#[derive(Debug, Clone, Default)]
pub struct CapabilityStats {
    pub total: u64,
    pub success: u64,
    pub timeout: u64,
    pub error: u64,
}

/// Snapshot of the router's live concurrency and timeout state.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub active_requests: u64,
    pub queued_requests: u64,
    pub total_requests: u64,
    pub total_timeouts: u64,
    pub timeout_rate: f32,
    pub per_capability: HashMap<String, CapabilityStats>,
}

#[derive(Default)]
struct Counters {
    active: AtomicU64,
    queued: AtomicU64,
    total: AtomicU64,
    timeouts: AtomicU64,
    per_capability: Mutex<HashMap<String, CapabilityStats>>,
}

/// Routes capability invocations to remote providers when credentials are
/// configured, and to the deterministic local fallback otherwise.
pub struct Router {
    table: Arc<Mutex<CapabilityTable>>,
    base_url: Option<String>,
    api_key: Option<String>,
    config: RouterConfig,
    semaphore: Arc<Semaphore>,
    client: reqwest::Client,
    counters: Arc<Counters>,
}

impl Router {
    pub fn new(config: RouterConfig, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            table: Arc::new(Mutex::new(CapabilityTable::default())),
            base_url,
            api_key,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            client: reqwest::Client::new(),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn register(&self, capability: &str, config: ModelConfig) {
        self.table.lock().unwrap().register(capability, config);
    }

    pub fn set_prompt(&self, capability: &str, prompt: &str) {
        self.table.lock().unwrap().set_prompt(capability, prompt);
    }

    pub fn set_override(&self, capability: &str, over: CapabilityOverride) {
        self.table.lock().unwrap().set_override(capability, over);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let total = self.counters.total.load(Ordering::Relaxed);
        let timeouts = self.counters.timeouts.load(Ordering::Relaxed);
        Diagnostics {
            active_requests: self.counters.active.load(Ordering::Relaxed),
            queued_requests: self.counters.queued.load(Ordering::Relaxed),
            total_requests: total,
            total_timeouts: timeouts,
            timeout_rate: if total == 0 { 0.0 } else { timeouts as f32 / total as f32 },
            per_capability: self.counters.per_capability.lock().unwrap().clone(),
        }
    }

    fn prepare(&self, capability: &str, payload: Value) -> Option<PreparedRequest> {
        let table = self.table.lock().unwrap();
        let config = table.resolve(capability)?.clone();
        let prompt = table.prompt(capability).map(str::to_string);
        let over = table.override_for(capability).cloned();
        Some(http::prepare_request(
            capability,
            &config,
            prompt.as_deref(),
            payload,
            self.base_url.as_deref(),
            self.api_key.as_deref(),
            Duration::from_secs(self.config.request_timeout_secs),
            over.as_ref(),
        ))
    }

    /// Invokes a capability, retrying transient failures up to
    /// `max_retries` times with exponential backoff (longer for `429`).
    pub async fn invoke(&self, capability: &str, payload: Value) -> InvocationResult {
        let Some(req) = self.prepare(capability, payload) else {
            return InvocationResult { provider: "unknown".into(), model: String::new(), prompt: None, payload: Value::Null, content: None, error: Some(format!("no route configured for capability {capability}")) };
        };

        let (url, body, api_key, timeout, provider, model, prompt, payload) = match req {
            PreparedRequest::Local { provider, model, prompt, payload } => {
                return InvocationResult::local(provider, model, prompt, payload);
            }
            PreparedRequest::Remote { url, body, api_key, timeout, provider, model, prompt, payload } => {
                (url, body, api_key, timeout, provider, model, prompt, payload)
            }
        };

        self.counters.total.fetch_add(1, Ordering::Relaxed);
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        {
            let mut stats = self.counters.per_capability.lock().unwrap();
            stats.entry(capability.to_string()).or_default().total += 1;
        }

        let mut last_error = "unknown error".to_string();
        for attempt in 0..self.config.max_retries.max(1) {
            let permit = self.semaphore.clone().acquire_owned().await;
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            self.counters.active.fetch_add(1, Ordering::Relaxed);

            let result = http::post_once(&self.client, &url, &body, &api_key, timeout).await;
            self.counters.active.fetch_sub(1, Ordering::Relaxed);
            drop(permit);

            match result {
                Ok(value) => {
                    let mut stats = self.counters.per_capability.lock().unwrap();
                    stats.entry(capability.to_string()).or_default().success += 1;
                    return InvocationResult {
                        provider,
                        model,
                        prompt,
                        payload,
                        content: value.get("content").cloned(),
                        error: None,
                    };
                }
                Err(e) => {
                    let is_timeout = e.starts_with("timeout");
                    let is_rate_limited = e.contains("429");
                    last_error = e;
                    if is_timeout {
                        self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                        let mut stats = self.counters.per_capability.lock().unwrap();
                        stats.entry(capability.to_string()).or_default().timeout += 1;
                    } else {
                        let mut stats = self.counters.per_capability.lock().unwrap();
                        stats.entry(capability.to_string()).or_default().error += 1;
                    }

                    if attempt + 1 < self.config.max_retries {
                        self.counters.queued.fetch_add(1, Ordering::Relaxed);
                        let backoff = if is_rate_limited {
                            self.config.rate_limit_backoff_ms * u64::from(attempt + 1)
                        } else {
                            self.config.base_backoff_ms * 2u64.pow(attempt)
                        };
                        tracing::warn!(capability, attempt, backoff_ms = backoff, error = %last_error, "model router request failed, retrying");
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    } else {
                        tracing::error!(capability, error = %last_error, "model router request exhausted retries");
                    }
                }
            }
        }

        InvocationResult { provider, model, prompt, payload, content: None, error: Some(format!("{last_error} (after {} attempts)", self.config.max_retries)) }
    }

    /// Streams a capability's response as status/chunk/error events. The
    /// local fallback yields a single error event, matching §4.7's
    /// "streaming returns an error event" fallback rule.
    pub fn stream(&self, capability: &str, payload: Value) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let Some(req) = self.prepare(capability, payload) else {
            let _ = tx.send(StreamEvent::Error { message: format!("no route configured for capability {capability}") });
            return rx;
        };

        let (url, mut body, api_key, timeout) = match req {
            PreparedRequest::Local { .. } => {
                let _ = tx.send(StreamEvent::Error { message: "streaming not supported for local provider".into() });
                return rx;
            }
            PreparedRequest::Remote { url, body, api_key, timeout, .. } => (url, body, api_key, timeout),
        };
        body["stream"] = Value::Bool(true);

        let client = self.client.clone();
        let semaphore = self.semaphore.clone();
        let line_timeout = Duration::from_secs(self.config.stream_line_timeout_secs);
        let outer_timeout = Duration::from_secs(self.config.stream_outer_timeout_secs);

        tokio::spawn(async move {
            let _ = tx.send(StreamEvent::Status { state: "connecting".into() });
            let _permit = semaphore.acquire().await;

            let send = client.post(&url).bearer_auth(&api_key).json(&body).timeout(timeout + Duration::from_secs(10)).send();
            let response = match tokio::time::timeout(outer_timeout, send).await {
                Ok(Ok(r)) if r.status().is_success() => r,
                Ok(Ok(r)) => {
                    let _ = tx.send(StreamEvent::Error { message: format!("HTTP {}", r.status()) });
                    return;
                }
                Ok(Err(e)) => {
                    let _ = tx.send(StreamEvent::Error { message: e.to_string() });
                    return;
                }
                Err(_) => {
                    let _ = tx.send(StreamEvent::Error { message: "connect timeout".into() });
                    return;
                }
            };

            let _ = tx.send(StreamEvent::Status { state: "connected".into() });
            let mut first_chunk = true;
            let deadline = tokio::time::Instant::now() + outer_timeout;
            let mut stream = response.bytes_stream();
            let mut buf = String::new();

            loop {
                use futures_util::StreamExt;
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    let _ = tx.send(StreamEvent::Error { message: "stream outer timeout".into() });
                    break;
                }
                match tokio::time::timeout(line_timeout.min(remaining), stream.next()).await {
                    Ok(Some(Ok(bytes))) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = buf.find('\n') {
                            let line = buf[..pos].trim_end_matches('\r').to_string();
                            buf.drain(..=pos);
                            if let Some(data) = line.strip_prefix("data: ") {
                                if data.trim() == "[DONE]" {
                                    let _ = tx.send(StreamEvent::Status { state: "completed".into() });
                                    return;
                                }
                                if let Ok(chunk) = serde_json::from_str::<Value>(data) {
                                    if let Some(content) = http::extract_delta_content(&chunk) {
                                        if first_chunk {
                                            let _ = tx.send(StreamEvent::Status { state: "receiving".into() });
                                            first_chunk = false;
                                        }
                                        let _ = tx.send(StreamEvent::Chunk(content));
                                    }
                                }
                            }
                        }
                    }
                    Ok(Some(Err(e))) => {
                        let _ = tx.send(StreamEvent::Error { message: e.to_string() });
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        let _ = tx.send(StreamEvent::Error { message: "read timeout".into() });
                        break;
                    }
                }
            }
            let _ = tx.send(StreamEvent::Status { state: "completed".into() });
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_mode_invoke_echoes_prompt_and_payload() {
        let router = Router::new(RouterConfig::default(), None, None);
        router.register("narrative", ModelConfig::local("heuristic-v1"));
        router.set_prompt("narrative", "Narrate this event.");
        let result = router.invoke("narrative", serde_json::json!({"tick": 5})).await;
        assert!(result.is_local());
        assert_eq!(result.payload["tick"], 5);
    }

    #[tokio::test]
    async fn unknown_capability_returns_error_result() {
        let router = Router::new(RouterConfig::default(), None, None);
        let result = router.invoke("nonexistent", serde_json::json!({})).await;
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn streaming_local_mode_yields_error_event() {
        let router = Router::new(RouterConfig::default(), None, None);
        router.register("narrative", ModelConfig::local("heuristic-v1"));
        let mut rx = router.stream("narrative", serde_json::json!({}));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Error { .. }));
    }

    #[test]
    fn diagnostics_start_at_zero() {
        let router = Router::new(RouterConfig::default(), None, None);
        let diag = router.diagnostics();
        assert_eq!(diag.total_requests, 0);
        assert_eq!(diag.timeout_rate, 0.0);
    }
}
