//! OpenAI-compatible chat-completions provider.
use super::{excerpt, parse_json_response, ChatMessage, LmProvider, StructuredCall};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Instruction sent as the user turn of structured calls that only carry a
/// system prompt.
pub const DEFAULT_USER_TURN: &str = "Respond now.";

pub struct HttpProvider {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            endpoint: completions_endpoint(base_url),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn complete(&self, body: &Value) -> Result<String> {
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(body)
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = response.status();
        let text = response
            .body_mut()
            .read_to_string()
            .context("read LM response body")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = status.as_u16(),
            response_bytes = text.len(),
            "lm http call complete"
        );
        if !status.is_success() {
            return Err(anyhow!(
                "LM endpoint returned {}: {}",
                status,
                excerpt(text.trim(), 500)
            ));
        }
        completion_content(&text)
    }
}

impl LmProvider for HttpProvider {
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value> {
        let body = structured_body(&self.model, call);
        let content = self.complete(&body)?;
        parse_json_response(&content)
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = chat_body(&self.model, messages);
        self.complete(&body)
    }
}

fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

fn structured_body(model: &str, call: &StructuredCall<'_>) -> Value {
    let user = if call.user.trim().is_empty() {
        DEFAULT_USER_TURN
    } else {
        call.user
    };
    json!({
        "model": model,
        "temperature": 0,
        "messages": [
            { "role": "system", "content": call.system },
            { "role": "user", "content": user },
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": call.schema.name,
                "strict": true,
                "schema": call.schema.schema,
            }
        }
    })
}

fn chat_body(model: &str, messages: &[ChatMessage]) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();
    json!({ "model": model, "messages": messages })
}

fn completion_content(text: &str) -> Result<String> {
    let completion: Completion =
        serde_json::from_str(text).context("parse chat completion response")?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("chat completion has no choices"))?;
    if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(anyhow!("LM refused the request: {refusal}"));
    }
    message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("chat completion has empty content"))
}
