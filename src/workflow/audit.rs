use crate::lm::{invoke_structured, LmCallKind, LmProvider, StructuredCall};
use crate::model::{AgentRequest, AuditResult, Issue, Section};
use crate::prompts;
use crate::schema::audit_schema;

/// Content shorter than this (after trimming) is not worth an LM call.
pub const MIN_CONTENT_CHARS: usize = 2;

pub const EMPTY_CONTENT_DESCRIPTION: &str = "content is empty";
pub const EMPTY_CONTENT_RECOMMENDATION: &str = "fill in using the template";
pub const CREDENTIALS_MISSING_DESCRIPTION: &str =
    "credentials missing: no LM command or API key is configured";
pub const CHECK_CONFIGURATION: &str = "check configuration";

const AUDIT_USER_TURN: &str = "Audit the draft now.";

/// The four fields an audit reads. The target issue never reaches this step.
#[derive(Debug, Clone, Copy)]
pub struct AuditInput<'a> {
    pub section_title: &'a str,
    pub criteria: &'a str,
    pub template_structure: &'a str,
    pub user_content: &'a str,
}

impl<'a> AuditInput<'a> {
    pub fn from_request(request: &'a AgentRequest) -> Self {
        Self {
            section_title: &request.section_title,
            criteria: &request.criteria,
            template_structure: &request.template_structure,
            user_content: &request.user_content,
        }
    }

    pub fn from_section(section: &'a Section) -> Self {
        Self {
            section_title: &section.meta.title,
            criteria: &section.meta.criteria,
            template_structure: &section.meta.template_structure,
            user_content: &section.user_data.content,
        }
    }
}

/// Audit one section. Every failure becomes a blocking issue in the result.
pub fn audit_section(lm: Option<&dyn LmProvider>, input: &AuditInput<'_>) -> AuditResult {
    if input.user_content.trim().chars().count() < MIN_CONTENT_CHARS {
        tracing::debug!(section = %input.section_title, "skipping audit of empty content");
        return AuditResult::blocked(Issue::blocking(
            "0",
            EMPTY_CONTENT_DESCRIPTION,
            EMPTY_CONTENT_RECOMMENDATION,
        ));
    }
    let Some(lm) = lm else {
        return AuditResult::blocked(Issue::blocking(
            "0",
            CREDENTIALS_MISSING_DESCRIPTION,
            CHECK_CONFIGURATION,
        ));
    };

    let system = prompts::fill(
        prompts::AUDIT_MD,
        &[
            ("section_title", input.section_title),
            ("criteria", input.criteria),
            ("template_structure", input.template_structure),
            ("user_content", input.user_content),
        ],
    );
    let schema = audit_schema();
    let call = StructuredCall {
        kind: LmCallKind::Audit,
        system: &system,
        user: AUDIT_USER_TURN,
        schema: &schema,
    };
    match invoke_structured::<AuditResult>(lm, &call) {
        Ok(result) => result.normalized(),
        Err(err) => {
            tracing::warn!(section = %input.section_title, "audit call failed: {err:#}");
            AuditResult::blocked(Issue::blocking(
                "0",
                format!("audit failed: {err:#}"),
                CHECK_CONFIGURATION,
            ))
        }
    }
}
