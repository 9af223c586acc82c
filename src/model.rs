//! Document and audit data model.
//!
//! These types double as the persisted workspace format and as the decoding
//! targets for structured LM responses, so field names are part of the
//! contract with both the state file and the response schemas.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue severity, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown severity `{other}` (expected High, Medium, or Low)")),
        }
    }
}

/// A single audit finding for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub severity: Severity,
    pub issue_description: String,
    pub recommendation: String,
    /// `false` means the gap is missing information only the author can
    /// supply; such issues are never offered for automatic fixing.
    pub fixable: bool,
}

impl Issue {
    /// Build a High-severity issue that requires human input.
    pub fn blocking(id: &str, description: impl Into<String>, recommendation: &str) -> Self {
        Self {
            id: id.to_string(),
            severity: Severity::High,
            issue_description: description.into(),
            recommendation: recommendation.to_string(),
            fixable: false,
        }
    }
}

/// Compliance verdict for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub is_compliant: bool,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl AuditResult {
    /// A non-compliant verdict carrying exactly one blocking issue.
    pub fn blocked(issue: Issue) -> Self {
        Self {
            is_compliant: false,
            issues: vec![issue],
        }
    }

    /// Enforce `is_compliant => issues.is_empty()` and fill blank issue ids
    /// with their 1-based position.
    pub fn normalized(mut self) -> Self {
        for (idx, issue) in self.issues.iter_mut().enumerate() {
            if issue.id.trim().is_empty() {
                issue.id = (idx + 1).to_string();
            }
        }
        if self.is_compliant && !self.issues.is_empty() {
            tracing::debug!(
                issues = self.issues.len(),
                "compliant verdict listed issues; marking non-compliant"
            );
            self.is_compliant = false;
        }
        self
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|issue| issue.id == id)
    }
}

/// Lifecycle of a section relative to its most recent audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    #[default]
    Draft,
    Compliant,
    Flagged,
}

impl SectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Compliant => "compliant",
            Self::Flagged => "flagged",
        }
    }
}

/// Read-only guidance attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMeta {
    pub title: String,
    /// Guidance text the content is audited against.
    pub criteria: String,
    /// Required format the content should follow.
    pub template_structure: String,
}

/// Author-owned, mutable part of a section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionData {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub last_audit: Option<AuditResult>,
    #[serde(default)]
    pub status: SectionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub meta: SectionMeta,
    pub user_data: SectionData,
}

/// A contradiction spanning several sections, linked back by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalIssue {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub related_sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub is_consistent: bool,
    #[serde(default)]
    pub global_issues: Vec<GlobalIssue>,
}

impl ConsistencyResult {
    /// Safe default when the check could not run.
    pub fn unavailable() -> Self {
        Self {
            is_consistent: false,
            global_issues: Vec::new(),
        }
    }
}

/// Structured response of the fix call.
#[derive(Debug, Clone, Deserialize)]
pub struct FixResponse {
    pub fixed_content: String,
}

/// Unit of work handed to the audit/fix router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub section_title: String,
    pub criteria: String,
    pub template_structure: String,
    pub user_content: String,
    /// Presence selects the fix branch; the fix branch always consumes it.
    #[serde(default)]
    pub target_issue: Option<Issue>,
}

impl AgentRequest {
    pub fn for_section(section: &Section) -> Self {
        Self {
            section_title: section.meta.title.clone(),
            criteria: section.meta.criteria.clone(),
            template_structure: section.meta.template_structure.clone(),
            user_content: section.user_data.content.clone(),
            target_issue: None,
        }
    }

    pub fn with_target(mut self, issue: Issue) -> Self {
        self.target_issue = Some(issue);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, severity: Severity) -> Issue {
        Issue {
            id: id.to_string(),
            severity,
            issue_description: "desc".to_string(),
            recommendation: "rec".to_string(),
            fixable: true,
        }
    }

    #[test]
    fn severity_accepts_lowercase_aliases() {
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
        assert!(serde_json::from_str::<Severity>("\"Critical\"").is_err());
    }

    #[test]
    fn severity_orders_high_first() {
        let mut all = [Severity::Low, Severity::High, Severity::Medium];
        all.sort();
        assert_eq!(all, Severity::ALL);
    }

    #[test]
    fn severity_parses_from_cli_text() {
        assert_eq!(" HIGH ".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn normalized_downgrades_compliant_with_issues() {
        let result = AuditResult {
            is_compliant: true,
            issues: vec![issue("1", Severity::Low)],
        }
        .normalized();
        assert!(!result.is_compliant);
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn normalized_keeps_noncompliant_without_issues() {
        let result = AuditResult {
            is_compliant: false,
            issues: Vec::new(),
        }
        .normalized();
        assert!(!result.is_compliant);
    }

    #[test]
    fn normalized_fills_blank_issue_ids() {
        let result = AuditResult {
            is_compliant: false,
            issues: vec![issue("", Severity::High), issue("x", Severity::Low), issue(" ", Severity::Low)],
        }
        .normalized();
        let ids: Vec<_> = result.issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "x", "3"]);
    }

    #[test]
    fn audit_result_decodes_without_issues_field() {
        let result: AuditResult = serde_json::from_str(r#"{"is_compliant": true}"#).unwrap();
        assert!(result.is_compliant);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn section_status_serializes_snake_case() {
        let text = serde_json::to_string(&SectionStatus::Flagged).unwrap();
        assert_eq!(text, "\"flagged\"");
    }

    #[test]
    fn request_for_section_has_no_target() {
        let section = Section {
            id: "sec-1".to_string(),
            meta: SectionMeta {
                title: "1. Reviewers".to_string(),
                criteria: "List reviewers".to_string(),
                template_structure: "Reviewers: <Name>".to_string(),
            },
            user_data: SectionData {
                content: "Reviewers: Ana".to_string(),
                ..SectionData::default()
            },
        };
        let request = AgentRequest::for_section(&section);
        assert_eq!(request.section_title, "1. Reviewers");
        assert_eq!(request.user_content, "Reviewers: Ana");
        assert!(request.target_issue.is_none());
        let targeted = request.with_target(issue("1", Severity::Low));
        assert!(targeted.target_issue.is_some());
    }
}
