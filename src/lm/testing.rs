//! Scripted provider for unit tests.
use super::{ChatMessage, LmCallKind, LmProvider, StructuredCall};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub kind: LmCallKind,
    pub prompt: String,
}

/// Replays queued replies in order and records every call it receives.
#[derive(Default)]
pub(crate) struct ScriptedLm {
    structured: RefCell<VecDeque<Result<Value, String>>>,
    chat: RefCell<VecDeque<Result<String, String>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedLm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, value: Value) -> Self {
        self.structured.borrow_mut().push_back(Ok(value));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.structured.borrow_mut().push_back(Err(message.to_string()));
        self
    }

    pub fn chat_reply(self, text: &str) -> Self {
        self.chat.borrow_mut().push_back(Ok(text.to_string()));
        self
    }

    pub fn chat_fail(self, message: &str) -> Self {
        self.chat.borrow_mut().push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl LmProvider for ScriptedLm {
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value> {
        self.calls.borrow_mut().push(RecordedCall {
            kind: call.kind,
            prompt: call.system.to_string(),
        });
        match self.structured.borrow_mut().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted reply for {}", call.kind)),
        }
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.borrow_mut().push(RecordedCall {
            kind: LmCallKind::Chat,
            prompt,
        });
        match self.chat.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted chat reply")),
        }
    }
}
