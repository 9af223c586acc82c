use super::audit::{audit_section, AuditInput};
use super::consistency::{check_consistency, push_section};
use crate::lm::LmProvider;
use crate::model::{AuditResult, ConsistencyResult, Section};
use crate::workspace::Workspace;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Per-section verdicts keyed by section id, plus the document-wide check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAuditResult {
    pub section_results: BTreeMap<String, AuditResult>,
    pub global_result: ConsistencyResult,
}

/// Audit every section in order, then run one consistency check over the
/// accumulated document text.
pub fn run_batch_audit(lm: Option<&dyn LmProvider>, sections: &[Section]) -> BatchAuditResult {
    let start = Instant::now();
    let mut section_results = BTreeMap::new();
    let mut document = String::new();
    for section in sections {
        tracing::info!(section_id = %section.id, title = %section.meta.title, "auditing section");
        let result = audit_section(lm, &AuditInput::from_section(section));
        section_results.insert(section.id.clone(), result);
        push_section(&mut document, section);
    }
    let global_result = check_consistency(lm, &document);
    tracing::info!(
        sections = sections.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "batch audit complete"
    );
    BatchAuditResult {
        section_results,
        global_result,
    }
}

/// Review the whole workspace and deposit the results into it.
pub fn review_workspace(lm: Option<&dyn LmProvider>, workspace: &mut Workspace) -> Result<BatchAuditResult> {
    let review = run_batch_audit(lm, workspace.sections());
    workspace.apply_review(review.clone())?;
    Ok(review)
}
