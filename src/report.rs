//! Review report and document health.
//!
//! The report merges stored section audits with the stored consistency
//! result into one list of findings. Consistency findings name sections by
//! title only, so each title is resolved against the workspace and the
//! outcome (linked, unmapped, or ambiguous) is kept on the finding instead
//! of guessing.
use crate::model::{SectionStatus, Severity};
use crate::workspace::Workspace;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Severity given to consistency findings, which carry none of their own.
pub const GLOBAL_FINDING_SEVERITY: Severity = Severity::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Section,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SectionLink {
    Linked { section_id: String },
    Unmapped,
    Ambiguous { section_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedSection {
    pub title: String,
    pub link: SectionLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Section title for section findings, issue title for global ones.
    pub title: String,
    pub description: String,
    pub issue_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_sections: Vec<RelatedSection>,
}

impl Finding {
    /// Whether the finding can be tied to at least one concrete section.
    pub fn is_linked(&self) -> bool {
        self.section_id.is_some()
            || self
                .related_sections
                .iter()
                .any(|r| matches!(r.link, SectionLink::Linked { .. }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub total_issues: usize,
    pub high_severity: usize,
    pub logic_issues: usize,
    pub sections_affected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Empty keeps every severity.
    pub severities: Vec<Severity>,
    pub query: Option<String>,
    pub only_linked: bool,
}

impl ReportFilter {
    fn keeps(&self, finding: &Finding) -> bool {
        if !self.severities.is_empty() && !self.severities.contains(&finding.severity) {
            return false;
        }
        if self.only_linked && !finding.is_linked() {
            return false;
        }
        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => format!("{} {}", finding.title, finding.description)
                .to_lowercase()
                .contains(&query.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    /// Counts over every stored finding, before filtering.
    pub counts: ReportCounts,
    /// `None` until a consistency check has been stored.
    pub is_consistent: Option<bool>,
    pub findings: Vec<Finding>,
}

impl ReviewReport {
    pub fn has_results(&self) -> bool {
        self.is_consistent.is_some() || self.counts.total_issues > 0
    }
}

/// Map a section title from a consistency finding back to section ids.
pub fn resolve_title(workspace: &Workspace, title: &str) -> SectionLink {
    let mut ids: Vec<String> = workspace
        .sections_titled(title.trim())
        .map(|s| s.id.clone())
        .collect();
    match ids.len() {
        0 => SectionLink::Unmapped,
        1 => SectionLink::Linked {
            section_id: ids.remove(0),
        },
        _ => SectionLink::Ambiguous { section_ids: ids },
    }
}

fn collect_findings(workspace: &Workspace) -> Vec<Finding> {
    let mut findings = Vec::new();
    for section in workspace.sections() {
        let Some(audit) = &section.user_data.last_audit else {
            continue;
        };
        if audit.is_compliant {
            continue;
        }
        for issue in &audit.issues {
            findings.push(Finding {
                kind: FindingKind::Section,
                severity: issue.severity,
                title: section.meta.title.clone(),
                description: issue.issue_description.clone(),
                issue_id: issue.id.clone(),
                recommendation: Some(issue.recommendation.clone()),
                fixable: Some(issue.fixable),
                section_id: Some(section.id.clone()),
                related_sections: Vec::new(),
            });
        }
    }
    if let Some(global) = workspace.global_result() {
        for issue in &global.global_issues {
            findings.push(Finding {
                kind: FindingKind::Global,
                severity: GLOBAL_FINDING_SEVERITY,
                title: issue.title.clone(),
                description: issue.description.clone(),
                issue_id: issue.id.clone(),
                recommendation: None,
                fixable: None,
                section_id: None,
                related_sections: issue
                    .related_sections
                    .iter()
                    .map(|title| RelatedSection {
                        title: title.clone(),
                        link: resolve_title(workspace, title),
                    })
                    .collect(),
            });
        }
    }
    findings
}

/// Build the review report from the state stored in the workspace.
pub fn build_report(workspace: &Workspace, filter: &ReportFilter) -> ReviewReport {
    let all = collect_findings(workspace);
    let counts = ReportCounts {
        total_issues: all.len(),
        high_severity: all
            .iter()
            .filter(|f| f.kind == FindingKind::Section && f.severity == Severity::High)
            .count(),
        logic_issues: all.iter().filter(|f| f.kind == FindingKind::Global).count(),
        sections_affected: all
            .iter()
            .filter_map(|f| f.section_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len(),
    };
    let mut findings: Vec<Finding> = all.into_iter().filter(|f| filter.keeps(f)).collect();
    findings.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.description.cmp(&b.description))
    });
    ReviewReport {
        counts,
        is_consistent: workspace.global_result().map(|g| g.is_consistent),
        findings,
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"<[^<>\n]{1,80}>|\[(?i:insert|add|tbd)[^\[\]\n]{0,80}\]")
            .expect("regex for template placeholders")
    })
}

/// Count unresolved template markers such as `<Add Name>` or `[Insert Date]`.
pub fn count_placeholders(text: &str) -> usize {
    placeholder_regex().find_iter(text).count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionHealth {
    pub id: String,
    pub title: String,
    pub status: SectionStatus,
    pub words: usize,
    pub placeholders: usize,
    pub open_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHealth {
    pub template: Option<String>,
    pub total: usize,
    pub compliant: usize,
    pub flagged: usize,
    pub draft: usize,
    /// Share of compliant sections in `0.0..=1.0`.
    pub readiness: f64,
    pub is_consistent: Option<bool>,
    pub last_review_epoch_ms: Option<u128>,
    pub sections: Vec<SectionHealth>,
}

impl DocumentHealth {
    pub fn readiness_percent(&self) -> u32 {
        (self.readiness * 100.0).round() as u32
    }
}

pub fn document_health(workspace: &Workspace) -> DocumentHealth {
    let sections: Vec<SectionHealth> = workspace
        .sections()
        .iter()
        .map(|s| SectionHealth {
            id: s.id.clone(),
            title: s.meta.title.clone(),
            status: s.user_data.status,
            words: s.user_data.content.split_whitespace().count(),
            placeholders: count_placeholders(&s.user_data.content),
            open_issues: s
                .user_data
                .last_audit
                .as_ref()
                .map(|a| a.issues.len())
                .unwrap_or(0),
        })
        .collect();
    let count = |status: SectionStatus| sections.iter().filter(|s| s.status == status).count();
    let total = sections.len();
    let compliant = count(SectionStatus::Compliant);
    let readiness = if total == 0 {
        0.0
    } else {
        compliant as f64 / total as f64
    };
    DocumentHealth {
        template: workspace.active_template.clone(),
        total,
        compliant,
        flagged: count(SectionStatus::Flagged),
        draft: count(SectionStatus::Draft),
        readiness,
        is_consistent: workspace.global_result().map(|g| g.is_consistent),
        last_review_epoch_ms: workspace.last_review_epoch_ms,
        sections,
    }
}
