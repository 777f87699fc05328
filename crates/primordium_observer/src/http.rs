//! HTTP transport for remote providers: request construction, retry with
//! backoff, and the line-based streaming protocol (§4.7).

use crate::capability::{CapabilityOverride, ModelConfig};
use crate::local::parse_content;
use serde_json::{json, Value};
use std::time::Duration;

/// A fully-resolved, ready-to-send request, or the local-mode fallback.
pub enum PreparedRequest {
    Local { provider: String, model: String, prompt: Option<String>, payload: Value },
    Remote { url: String, body: Value, api_key: String, timeout: Duration, provider: String, model: String, prompt: Option<String>, payload: Value },
}

/// Resolves overrides against the router's global defaults and decides
/// local-vs-remote mode (local unless both a base url and an api key are
/// available from either the override or the global config).
#[allow(clippy::too_many_arguments)]
pub fn prepare_request(
    capability: &str,
    config: &ModelConfig,
    prompt_template: Option<&str>,
    payload: Value,
    global_base_url: Option<&str>,
    global_api_key: Option<&str>,
    global_timeout: Duration,
    over: Option<&CapabilityOverride>,
) -> PreparedRequest {
    let base_url = over.and_then(|o| o.base_url.clone()).or_else(|| global_base_url.map(str::to_string));
    let api_key = over.and_then(|o| o.api_key.clone()).or_else(|| global_api_key.map(str::to_string));
    let timeout = over
        .and_then(|o| o.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(global_timeout);
    let model = over.and_then(|o| o.model.clone()).unwrap_or_else(|| config.model.clone());
    let extra_body = over.and_then(|o| o.extra_body.clone()).or_else(|| config.extra_body.clone());

    let has_credentials = base_url.is_some() && api_key.is_some();
    let formatted_prompt = prompt_template.map(str::to_string);

    if !has_credentials {
        return PreparedRequest::Local { provider: config.provider.clone(), model, prompt: formatted_prompt, payload };
    }

    let endpoint = config.endpoint.as_deref().unwrap_or("/chat/completions");
    let base = base_url.unwrap().trim_end_matches('/').to_string();
    let url = format!("{base}{endpoint}");

    let mut body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": formatted_prompt.clone().unwrap_or_else(|| "You are an AI assistant.".to_string())},
            {"role": "user", "content": payload.to_string()},
        ],
    });
    if let Some(extra) = extra_body {
        if let (Value::Object(base_map), Value::Object(extra_map)) = (&mut body, extra) {
            base_map.extend(extra_map);
        }
    }

    PreparedRequest::Remote {
        url,
        body,
        api_key: api_key.unwrap(),
        timeout,
        provider: config.provider.clone(),
        model,
        prompt: formatted_prompt,
        payload,
    }
}

/// Extracts `choices[0].message.content` from an OpenAI-shaped chat
/// completion response body.
pub fn extract_message_content(data: &Value) -> String {
    data["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string()
}

/// Extracts `choices[0].delta.content` from one SSE chunk of a streamed
/// chat completion.
pub fn extract_delta_content(chunk: &Value) -> Option<String> {
    chunk["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}

/// Sends one POST attempt and returns the parsed response content, or the
/// error text on failure. Does not retry; the caller's retry loop owns
/// backoff policy.
pub async fn post_once(client: &reqwest::Client, url: &str, body: &Value, api_key: &str, timeout: Duration) -> Result<Value, String> {
    let result = tokio::time::timeout(
        timeout,
        client.post(url).bearer_auth(api_key).json(body).send(),
    )
    .await;

    let response = match result {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(_) => return Err(format!("timeout after {}s", timeout.as_secs())),
    };

    if !response.status().is_success() {
        let status = response.status();
        return Err(format!("HTTP {status}"));
    }

    let data: Value = response.json().await.map_err(|e| e.to_string())?;
    let content = extract_message_content(&data);
    Ok(json!({"content": parse_content(&content), "raw": data}))
}
