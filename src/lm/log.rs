//! LM invocation log.
//!
//! Every call made through [`LoggedProvider`] appends one line to
//! `.charter/lm_log.jsonl`:
//!
//! ```jsonl
//! {"ts":1707900000,"kind":"audit","duration_ms":4200,"prompt_bytes":2311,"response_bytes":388,"outcome":"success"}
//! {"ts":1707900060,"kind":"fix","duration_ms":3100,"prompt_bytes":1900,"response_bytes":0,"outcome":"error","error":"..."}
//! ```
//!
//! Logging never changes the result of the wrapped call.
use super::{ChatMessage, LmCallKind, LmProvider, StructuredCall};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub ts: u64,
    pub kind: LmCallKind,
    pub duration_ms: u64,
    pub prompt_bytes: usize,
    pub response_bytes: usize,
    pub outcome: LmOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LoggedProvider<P> {
    inner: P,
    path: PathBuf,
}

impl<P: LmProvider> LoggedProvider<P> {
    pub fn new(inner: P, path: PathBuf) -> Self {
        Self { inner, path }
    }

    fn record<T>(
        &self,
        kind: LmCallKind,
        prompt_bytes: usize,
        start: Instant,
        result: &Result<T>,
        response_bytes: impl FnOnce(&T) -> usize,
    ) {
        let (outcome, response_bytes, error) = match result {
            Ok(value) => (LmOutcome::Success, response_bytes(value), None),
            Err(err) => (LmOutcome::Error, 0, Some(format!("{err:#}"))),
        };
        let entry = LmLogEntry {
            ts: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            kind,
            duration_ms: start.elapsed().as_millis() as u64,
            prompt_bytes,
            response_bytes,
            outcome,
            error,
        };
        if let Err(err) = append_entry(&self.path, &entry) {
            tracing::warn!(path = %self.path.display(), "lm log write failed: {err:#}");
        }
    }
}

impl<P: LmProvider> LmProvider for LoggedProvider<P> {
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value> {
        let start = Instant::now();
        let result = self.inner.structured(call);
        self.record(call.kind, call.prompt_bytes(), start, &result, |value| {
            value.to_string().len()
        });
        result
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let start = Instant::now();
        let prompt_bytes = messages.iter().map(|m| m.content.len()).sum();
        let result = self.inner.chat(messages);
        self.record(LmCallKind::Chat, prompt_bytes, start, &result, String::len);
        result
    }
}

fn append_entry(path: &Path, entry: &LmLogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize lm log entry")?;
    writeln!(file, "{line}").with_context(|| format!("append {}", path.display()))?;
    Ok(())
}

/// Read all log entries, skipping lines that fail to parse.
pub fn read_entries(path: &Path) -> Result<Vec<LmLogEntry>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Aggregate view of the LM log for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LmUsage {
    pub calls: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub fn summarize(entries: &[LmLogEntry]) -> LmUsage {
    let mut usage = LmUsage::default();
    for entry in entries {
        usage.calls += 1;
        usage.total_duration_ms += entry.duration_ms;
        if entry.outcome == LmOutcome::Error {
            usage.errors += 1;
            usage.last_error = entry.error.clone();
        }
    }
    usage
}
