//! Plain-text rendering for terminal output.
use crate::ingest::IngestStats;
use crate::lm::log::LmUsage;
use crate::model::{AuditResult, Section};
use crate::report::{DocumentHealth, FindingKind, ReviewReport, SectionLink};
use crate::workflow::{FixOutcome, FixStatus};

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}\n"))
        .collect()
}

pub fn audit_text(result: &AuditResult) -> String {
    if result.is_compliant {
        return "audit: compliant\n".to_string();
    }
    let mut out = format!("audit: flagged ({} issue(s))\n", result.issues.len());
    for issue in &result.issues {
        let action = if issue.fixable { "fixable" } else { "input required" };
        out.push_str(&format!(
            "  [{}] {} ({action}): {}\n",
            issue.id, issue.severity, issue.issue_description
        ));
        out.push_str(&format!("      -> {}\n", issue.recommendation));
    }
    out
}

pub fn section_text(section: &Section) -> String {
    let mut out = format!(
        "{} {} [{}]\n",
        section.id,
        section.meta.title,
        section.user_data.status.as_str()
    );
    out.push_str("  guidance:\n");
    out.push_str(&indent(&section.meta.criteria, "    "));
    out.push_str("  format:\n");
    out.push_str(&indent(&section.meta.template_structure, "    "));
    out.push_str("  content:\n");
    if section.user_data.content.trim().is_empty() {
        out.push_str("    (empty)\n");
    } else {
        out.push_str(&indent(&section.user_data.content, "    "));
    }
    if let Some(audit) = &section.user_data.last_audit {
        out.push_str(&indent(&audit_text(audit), "  "));
    }
    out
}

pub fn fix_text(outcome: &FixOutcome) -> String {
    match &outcome.status {
        FixStatus::Applied => format!(
            "fix: applied (section reset to draft; audit again)\n{}",
            indent(outcome.content(), "    ")
        ),
        FixStatus::NoTarget => "fix: nothing to fix\n".to_string(),
        FixStatus::NotConfigured(message) => format!("fix: not applied: {message}\n"),
        FixStatus::Failed => "fix: failed; content unchanged (run with -v for details)\n".to_string(),
    }
}

pub fn report_text(report: &ReviewReport) -> String {
    if !report.has_results() {
        return "no review results yet; run `charter review`\n".to_string();
    }
    let counts = &report.counts;
    let mut out = format!(
        "issues: {} total, {} high severity, {} logic, {} section(s) affected\n",
        counts.total_issues, counts.high_severity, counts.logic_issues, counts.sections_affected
    );
    match report.is_consistent {
        Some(true) => out.push_str("consistency: consistent\n"),
        Some(false) => out.push_str("consistency: issues found or check unavailable\n"),
        None => out.push_str("consistency: not checked\n"),
    }
    if counts.total_issues == 0 && report.is_consistent == Some(true) {
        out.push_str("no issues found; the document looks consistent across sections\n");
        return out;
    }
    if report.findings.is_empty() {
        out.push_str("no findings match the current filters\n");
        return out;
    }
    for finding in &report.findings {
        match finding.kind {
            FindingKind::Section => {
                let section = finding.section_id.as_deref().unwrap_or("?");
                out.push_str(&format!(
                    "- {} {} [{}#{}]: {}\n",
                    finding.severity.as_str().to_uppercase(),
                    finding.title,
                    section,
                    finding.issue_id,
                    finding.description
                ));
                if let Some(recommendation) = &finding.recommendation {
                    out.push_str(&format!("    -> {recommendation}\n"));
                }
            }
            FindingKind::Global => {
                out.push_str(&format!(
                    "- {} logic: {}: {}\n",
                    finding.severity.as_str().to_uppercase(),
                    finding.title,
                    finding.description
                ));
                if finding.related_sections.is_empty() {
                    out.push_str("    affects: (not mapped to a section)\n");
                    continue;
                }
                let affects: Vec<String> = finding
                    .related_sections
                    .iter()
                    .map(|related| match &related.link {
                        SectionLink::Linked { section_id } => {
                            format!("{} ({section_id})", related.title)
                        }
                        SectionLink::Unmapped => format!("{} (unmapped)", related.title),
                        SectionLink::Ambiguous { section_ids } => {
                            format!("{} (ambiguous: {})", related.title, section_ids.join(", "))
                        }
                    })
                    .collect();
                out.push_str(&format!("    affects: {}\n", affects.join(" | ")));
            }
        }
    }
    out
}

pub fn health_text(health: &DocumentHealth, lm: &str, usage: &LmUsage) -> String {
    let mut out = format!(
        "template: {}\n",
        health.template.as_deref().unwrap_or("(none)")
    );
    out.push_str(&format!(
        "readiness: {}% ({}/{} compliant, {} flagged, {} draft)\n",
        health.readiness_percent(),
        health.compliant,
        health.total,
        health.flagged,
        health.draft
    ));
    let consistency = match health.is_consistent {
        Some(true) => "consistent",
        Some(false) => "issues found or unavailable",
        None => "not checked",
    };
    out.push_str(&format!("consistency: {consistency}\n"));
    out.push_str(&format!("lm: {lm}\n"));
    out.push_str(&format!(
        "lm calls: {} ({} failed, {} ms total)\n",
        usage.calls, usage.errors, usage.total_duration_ms
    ));
    if let Some(error) = &usage.last_error {
        out.push_str(&format!("last lm error: {error}\n"));
    }
    if !health.sections.is_empty() {
        out.push_str("sections:\n");
    }
    for section in &health.sections {
        out.push_str(&format!(
            "  - {} {}: {}, {} words, {} placeholder(s), {} open issue(s)\n",
            section.id,
            section.title,
            section.status.as_str(),
            section.words,
            section.placeholders,
            section.open_issues
        ));
    }
    out
}

pub fn import_text(stats: &IngestStats, truncated: bool) -> String {
    let mut out = format!(
        "imported {} section(s): {} words, about {} min read\n",
        stats.section_count, stats.word_count, stats.reading_time_mins
    );
    if truncated {
        out.push_str("note: the file was truncated before structuring\n");
    }
    out
}
