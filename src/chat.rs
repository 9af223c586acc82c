//! Conversational assistant grounded in the current draft.
use crate::lm::{ChatMessage, ChatRole, LmProvider};
use crate::model::Section;
use crate::prompts;
use crate::workflow::EMPTY_SECTION_MARKER;

pub const EMPTY_DOCUMENT_CONTEXT: &str = "[The document is currently empty.]";
pub const DRAFT_HEADER: &str = "CURRENT PROJECT DRAFT:";
pub const NOT_CONFIGURED_REPLY: &str = "I can't help you yet: no LM is configured. Set an LM command \
(--lm-command or CHARTER_LM_COMMAND) or an API key (--api-key or OPENAI_API_KEY) and ask again.";

/// Render the draft the assistant answers from.
pub fn build_project_context(sections: &[Section]) -> String {
    if sections.is_empty() {
        return EMPTY_DOCUMENT_CONTEXT.to_string();
    }
    let mut context = format!("{DRAFT_HEADER}\n\n");
    for section in sections {
        let content = section.user_data.content.trim();
        let content = if content.is_empty() {
            EMPTY_SECTION_MARKER
        } else {
            content
        };
        context.push_str(&format!("## SECTION: {}\n{}\n\n", section.meta.title, content));
    }
    context
}

/// Answer the latest user turn in `history`.
///
/// Always returns text to show: configuration and provider failures are
/// reported as the reply itself.
pub fn chat_response(lm: Option<&dyn LmProvider>, history: &[ChatMessage], sections: &[Section]) -> String {
    let Some(lm) = lm else {
        return NOT_CONFIGURED_REPLY.to_string();
    };
    let context = build_project_context(sections);
    let system = prompts::fill(prompts::CHAT_MD, &[("context", context.as_str())]);

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .cloned(),
    );

    match lm.chat(&messages) {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!("chat call failed: {err:#}");
            format!("Error connecting to LLM: {err:#}")
        }
    }
}
