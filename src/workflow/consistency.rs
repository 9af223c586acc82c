use crate::lm::{invoke_structured, LmCallKind, LmProvider, StructuredCall};
use crate::model::{ConsistencyResult, Section};
use crate::prompts;
use crate::schema::consistency_schema;

pub const SECTION_HEADING: &str = "## SECTION: ";
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";
pub const EMPTY_SECTION_MARKER: &str = "[No content written for this section yet]";

const CONSISTENCY_USER_TURN: &str = "Check the document for contradictions now.";

/// Append one section block to a document rendering.
pub(crate) fn push_section(document: &mut String, section: &Section) {
    if !document.is_empty() {
        document.push_str(SECTION_SEPARATOR);
    }
    document.push_str(SECTION_HEADING);
    document.push_str(&section.meta.title);
    document.push('\n');
    let content = section.user_data.content.trim();
    document.push_str(if content.is_empty() {
        EMPTY_SECTION_MARKER
    } else {
        content
    });
}

/// Render sections as the plain-text document the consistency check reads.
pub fn render_document(sections: &[Section]) -> String {
    let mut document = String::new();
    for section in sections {
        push_section(&mut document, section);
    }
    document
}

/// Check the whole document for cross-section contradictions.
///
/// Missing credentials or any provider failure yield
/// [`ConsistencyResult::unavailable`].
pub fn check_consistency(lm: Option<&dyn LmProvider>, document: &str) -> ConsistencyResult {
    let Some(lm) = lm else {
        tracing::debug!("consistency check skipped: LM not configured");
        return ConsistencyResult::unavailable();
    };
    let system = prompts::fill(prompts::CONSISTENCY_MD, &[("document", document)]);
    let schema = consistency_schema();
    let call = StructuredCall {
        kind: LmCallKind::Consistency,
        system: &system,
        user: CONSISTENCY_USER_TURN,
        schema: &schema,
    };
    match invoke_structured::<ConsistencyResult>(lm, &call) {
        Ok(mut result) => {
            for (idx, issue) in result.global_issues.iter_mut().enumerate() {
                if issue.id.trim().is_empty() {
                    issue.id = format!("G{}", idx + 1);
                }
            }
            result
        }
        Err(err) => {
            tracing::warn!("consistency check failed: {err:#}");
            ConsistencyResult::unavailable()
        }
    }
}
