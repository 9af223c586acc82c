use crate::lm::{invoke_structured, LmCallKind, LmProvider, StructuredCall};
use crate::model::{AgentRequest, FixResponse, Issue};
use crate::prompts;
use crate::schema::fix_schema;

pub const NOT_CONFIGURED_MESSAGE: &str =
    "AI is not configured: set an LM command or API key to apply fixes";

const FIX_USER_TURN: &str = "Apply the fix now.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixStatus {
    /// Content was replaced with the rewritten text.
    Applied,
    /// No usable target issue; nothing to do.
    NoTarget,
    /// No provider configured; carries the message to show the author.
    NotConfigured(String),
    /// The provider failed or returned nothing usable.
    Failed,
}

/// Result of the fix step. `request.target_issue` is always `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub request: AgentRequest,
    pub status: FixStatus,
}

impl FixOutcome {
    pub fn content(&self) -> &str {
        &self.request.user_content
    }

    pub fn applied(&self) -> bool {
        self.status == FixStatus::Applied
    }
}

fn is_empty_issue(issue: &Issue) -> bool {
    issue.issue_description.trim().is_empty() && issue.recommendation.trim().is_empty()
}

/// Rewrite the content to resolve the request's target issue.
///
/// The content is either replaced in full or left untouched.
pub fn fix_section(lm: Option<&dyn LmProvider>, mut request: AgentRequest) -> FixOutcome {
    let target = request.target_issue.take().filter(|issue| !is_empty_issue(issue));
    let Some(issue) = target else {
        return FixOutcome {
            request,
            status: FixStatus::NoTarget,
        };
    };
    let Some(lm) = lm else {
        return FixOutcome {
            request,
            status: FixStatus::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()),
        };
    };

    let system = prompts::fill(
        prompts::FIX_MD,
        &[
            ("template_structure", request.template_structure.as_str()),
            ("user_content", request.user_content.as_str()),
            ("issue_description", issue.issue_description.as_str()),
            ("recommendation", issue.recommendation.as_str()),
        ],
    );
    let schema = fix_schema();
    let call = StructuredCall {
        kind: LmCallKind::Fix,
        system: &system,
        user: FIX_USER_TURN,
        schema: &schema,
    };
    let status = match invoke_structured::<FixResponse>(lm, &call) {
        Ok(response) if !response.fixed_content.trim().is_empty() => {
            request.user_content = response.fixed_content;
            FixStatus::Applied
        }
        Ok(_) => {
            tracing::warn!(section = %request.section_title, issue = %issue.id, "fix returned blank content");
            FixStatus::Failed
        }
        Err(err) => {
            tracing::warn!(section = %request.section_title, issue = %issue.id, "fix call failed: {err:#}");
            FixStatus::Failed
        }
    };
    FixOutcome { request, status }
}
