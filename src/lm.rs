//! LM provider abstraction and response decoding.
//!
//! The audit, fix, consistency, chat, and import steps all talk to the LM
//! through [`LmProvider`]. A provider is either an OpenAI-compatible HTTP
//! endpoint ([`http::HttpProvider`]) or a user-configured command that reads
//! the prompt on stdin ([`command::CommandProvider`]); both can be wrapped by
//! [`log::LoggedProvider`] to record every call.
//!
//! Structured calls carry a JSON schema. Providers return the decoded JSON
//! value and [`invoke_structured`] turns it into the caller's type, so a
//! response that does not fit the schema surfaces as an ordinary error.
//! There are no retries: one user action is one LM call.
use crate::schema::ResponseSchema;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod command;
pub mod http;
pub mod log;
#[cfg(test)]
pub(crate) mod testing;

/// What a call is for; recorded in the LM log and exported to commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmCallKind {
    Audit,
    Fix,
    Consistency,
    Ingest,
    Chat,
}

impl LmCallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Fix => "fix",
            Self::Consistency => "consistency",
            Self::Ingest => "ingest",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for LmCallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A schema-constrained request: instructions, a short user turn, and the
/// shape the answer must take.
#[derive(Debug, Clone)]
pub struct StructuredCall<'a> {
    pub kind: LmCallKind,
    pub system: &'a str,
    pub user: &'a str,
    pub schema: &'a ResponseSchema,
}

impl StructuredCall<'_> {
    pub fn prompt_bytes(&self) -> usize {
        self.system.len() + self.user.len()
    }
}

pub trait LmProvider {
    /// Run a structured call and return the JSON object the LM produced.
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value>;

    /// Run a free-text conversation and return the assistant reply.
    fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

impl<P: LmProvider + ?Sized> LmProvider for Box<P> {
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value> {
        (**self).structured(call)
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).chat(messages)
    }
}

/// Run a structured call and decode the response into `T`.
pub fn invoke_structured<T: DeserializeOwned>(
    lm: &dyn LmProvider,
    call: &StructuredCall<'_>,
) -> Result<T> {
    let value = lm.structured(call)?;
    serde_json::from_value(value)
        .with_context(|| format!("decode {} response for {}", call.schema.name, call.kind))
}

/// Parse the JSON object out of raw LM text.
///
/// Tolerates markdown code fences and prose before the object.
pub fn parse_json_response(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("LM response is empty"));
    }
    // A bare object may carry fenced blocks inside its strings, so it is
    // parsed whole before any fence stripping.
    let err = match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() => return Ok(value),
        Ok(_) => return Err(anyhow!("LM response is not a JSON object")),
        Err(err) => err,
    };
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        if value.is_object() {
            return Ok(value);
        }
    }
    first_json_object(cleaned)
        .or_else(|| first_json_object(text))
        .ok_or_else(|| {
            anyhow!(
                "parse LM response as JSON: {err}; first 200 chars: {}",
                excerpt(text, 200)
            )
        })
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip a language tag such as `json`.
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }
    text
}

fn first_json_object(text: &str) -> Option<Value> {
    for (idx, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&text[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// Truncate to at most `max_chars` characters for error messages.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
