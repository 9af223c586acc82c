//! Import an existing charter from markdown or plain text.
//!
//! One structured LM call splits the text into sections and derives guidance
//! and a required format for each. Unlike the audit workflow, import fails
//! loudly: there is nothing sensible to fall back to.
use crate::lm::{invoke_structured, LmCallKind, LmProvider, StructuredCall};
use crate::prompts;
use crate::schema::ingest_schema;
use crate::workspace::SectionDraft;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Characters of source text sent to the LM.
pub const MAX_INGEST_CHARS: usize = 50_000;
const WORDS_PER_MINUTE: f64 = 200.0;

const INGEST_USER_TURN: &str = "Split the text into sections now.";

#[derive(Debug, Clone, Deserialize)]
struct IngestedSection {
    title: String,
    guidance: String,
    required_format: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CharterStructure {
    sections: Vec<IngestedSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IngestStats {
    pub word_count: usize,
    pub section_count: usize,
    pub reading_time_mins: f64,
}

impl IngestStats {
    pub fn compute(raw_text: &str, section_count: usize) -> Self {
        let word_count = raw_text.split_whitespace().count();
        let reading_time_mins = (word_count as f64 / WORDS_PER_MINUTE * 10.0).round() / 10.0;
        Self {
            word_count,
            section_count,
            reading_time_mins,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub drafts: Vec<SectionDraft>,
    pub stats: IngestStats,
    /// Whether the source was cut to [`MAX_INGEST_CHARS`] before the call.
    pub truncated: bool,
}

fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Structure raw charter text into section drafts.
pub fn ingest_text(lm: Option<&dyn LmProvider>, raw_text: &str) -> Result<IngestOutcome> {
    let lm = lm.ok_or_else(|| {
        anyhow!("import needs an LM: configure --lm-command or an API key (see `charter status`)")
    })?;
    if raw_text.trim().is_empty() {
        return Err(anyhow!("nothing to import: the file is empty"));
    }
    let (text, truncated) = truncate_chars(raw_text, MAX_INGEST_CHARS);
    if truncated {
        tracing::warn!(max_chars = MAX_INGEST_CHARS, "import text truncated");
    }

    let system = prompts::fill(prompts::INGEST_MD, &[("text", text)]);
    let schema = ingest_schema();
    let call = StructuredCall {
        kind: LmCallKind::Ingest,
        system: &system,
        user: INGEST_USER_TURN,
        schema: &schema,
    };
    let structure: CharterStructure = invoke_structured(lm, &call)?;
    if structure.sections.is_empty() {
        return Err(anyhow!("import found no sections in the document"));
    }

    let drafts: Vec<SectionDraft> = structure
        .sections
        .into_iter()
        .map(|s| SectionDraft {
            title: s.title,
            criteria: s.guidance,
            template_structure: s.required_format,
            content: s.content,
        })
        .collect();
    let stats = IngestStats::compute(raw_text, drafts.len());
    tracing::info!(
        sections = stats.section_count,
        words = stats.word_count,
        "import structured"
    );
    Ok(IngestOutcome {
        drafts,
        stats,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::ScriptedLm;
    use serde_json::json;

    #[test]
    fn stats_round_reading_time_to_one_decimal() {
        let text = "word ".repeat(250);
        let stats = IngestStats::compute(&text, 3);
        assert_eq!(stats.word_count, 250);
        assert_eq!(stats.section_count, 3);
        assert_eq!(stats.reading_time_mins, 1.3);
        assert_eq!(IngestStats::compute("", 0).reading_time_mins, 0.0);
    }

    #[test]
    fn maps_sections_to_drafts() {
        let lm = ScriptedLm::new().reply(json!({
            "sections": [{
                "title": "Problem Statement",
                "guidance": "Describe the pain point.",
                "required_format": "<Problem> affects <Who>",
                "content": "Manual invoicing affects finance."
            }]
        }));
        let outcome = ingest_text(Some(&lm), "# Problem Statement\nManual invoicing affects finance.").unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.drafts.len(), 1);
        let draft = &outcome.drafts[0];
        assert_eq!(draft.title, "Problem Statement");
        assert_eq!(draft.criteria, "Describe the pain point.");
        assert_eq!(draft.template_structure, "<Problem> affects <Who>");
        assert_eq!(outcome.stats.word_count, 7);
        assert_eq!(lm.calls()[0].kind, LmCallKind::Ingest);
    }

    #[test]
    fn long_text_is_truncated_before_the_call() {
        let lm = ScriptedLm::new().reply(json!({
            "sections": [{"title": "A", "guidance": "g", "required_format": "f", "content": "c"}]
        }));
        let text = "é".repeat(MAX_INGEST_CHARS + 10);
        let outcome = ingest_text(Some(&lm), &text).unwrap();
        assert!(outcome.truncated);
        let prompt = &lm.calls()[0].prompt;
        assert_eq!(prompt.matches('é').count(), MAX_INGEST_CHARS);
    }

    #[test]
    fn failures_are_errors() {
        assert!(ingest_text(None, "text").is_err());
        let lm = ScriptedLm::new();
        assert!(ingest_text(Some(&lm), "  \n").is_err());
        assert_eq!(lm.call_count(), 0);

        let lm = ScriptedLm::new().reply(json!({"sections": []}));
        let err = ingest_text(Some(&lm), "text").unwrap_err();
        assert!(err.to_string().contains("no sections"));

        let lm = ScriptedLm::new().fail("bad gateway");
        assert!(ingest_text(Some(&lm), "text").is_err());
    }
}
