//! Local-mode fallback and response content post-processing (§4.7).

use serde_json::Value;

/// Result of one capability invocation, successful or not. Errors never
/// cross the boundary as a raised exception; they're returned here.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub provider: String,
    pub model: String,
    pub prompt: Option<String>,
    pub payload: Value,
    pub content: Option<Value>,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn local(provider: impl Into<String>, model: impl Into<String>, prompt: Option<String>, payload: Value) -> Self {
        Self { provider: provider.into(), model: model.into(), prompt, payload, content: None, error: None }
    }

    pub fn is_local(&self) -> bool {
        self.error.is_none() && self.content.is_none()
    }
}

/// Parses a provider's raw text content, stripping a markdown JSON code
/// fence if present and attempting to parse the remainder as JSON.
/// Falls back to returning the original text untouched when no JSON can
/// be extracted.
pub fn parse_content(content: &str) -> Value {
    let trimmed = content.trim();
    let mut cleaned = trimmed;
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return value;
    }

    if let Some(extracted) = extract_json_object(content) {
        if let Ok(value) = serde_json::from_str::<Value>(&extracted) {
            return value;
        }
    }

    Value::String(content.to_string())
}

/// Scans for the first balanced `{...}` span, tolerating surrounding
/// prose (narrative responses that wrap a JSON block in commentary).
fn extract_json_object(content: &str) -> Option<String> {
    let start = content.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(content[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let v = parse_content(r#"{"a": 1}"#);
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn parses_markdown_fenced_json() {
        let v = parse_content("```json\n{\"a\": 2}\n```");
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let v = parse_content("Here you go:\n{\"a\": 3}\nHope that helps.");
        assert_eq!(v["a"], 3);
    }

    #[test]
    fn falls_back_to_plain_text() {
        let v = parse_content("# Just a heading, no JSON here");
        assert_eq!(v, Value::String("# Just a heading, no JSON here".to_string()));
    }
}
