//! Section audit and fix workflow.
//!
//! A request enters through [`run_request`], which routes it to exactly one
//! step: [`audit_section`] when no target issue is set, [`fix_section`]
//! otherwise. Both steps make at most one LM call and return a well-formed
//! result on every path; provider and configuration failures are folded into
//! the result instead of being returned as errors.
//!
//! [`run_batch_audit`] audits every section in order and then runs the
//! whole-document consistency check once.
use crate::lm::LmProvider;
use crate::model::{AgentRequest, AuditResult};
use serde::Serialize;

mod audit;
mod batch;
mod consistency;
mod fix;

pub use audit::{audit_section, AuditInput};
pub use batch::{review_workspace, run_batch_audit, BatchAuditResult};
pub use consistency::{check_consistency, render_document, EMPTY_SECTION_MARKER};
pub use fix::{fix_section, FixOutcome, FixStatus};

/// Step selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Audit,
    Fix,
}

/// Choose the step for a request. Only `target_issue` is consulted.
pub fn route(request: &AgentRequest) -> Route {
    if request.target_issue.is_some() {
        Route::Fix
    } else {
        Route::Audit
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Audited(AuditResult),
    Fixed(FixOutcome),
}

/// Route a request and run the selected step.
pub fn run_request(lm: Option<&dyn LmProvider>, request: AgentRequest) -> AgentOutcome {
    match route(&request) {
        Route::Audit => {
            tracing::info!(section = %request.section_title, "auditing section");
            AgentOutcome::Audited(audit_section(lm, &AuditInput::from_request(&request)))
        }
        Route::Fix => {
            tracing::info!(section = %request.section_title, "fixing section");
            AgentOutcome::Fixed(fix_section(lm, request))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::ScriptedLm;
    use crate::lm::LmCallKind;
    use crate::model::{Issue, Severity};
    use serde_json::json;

    fn request(content: &str) -> AgentRequest {
        AgentRequest {
            section_title: "3. Objectives (SMART)".to_string(),
            criteria: "Include a KPI and a target date.".to_string(),
            template_structure: "Goal: <Goal>\nKPI: <Metric>\nTarget Date: <Date>".to_string(),
            user_content: content.to_string(),
            target_issue: None,
        }
    }

    fn fixable_issue() -> Issue {
        Issue {
            id: "1".to_string(),
            severity: Severity::Low,
            issue_description: "KPI line is not on its own line".to_string(),
            recommendation: "Split the KPI onto a separate line".to_string(),
            fixable: true,
        }
    }

    #[test]
    fn route_depends_only_on_target_issue() {
        assert_eq!(route(&request("")), Route::Audit);
        assert_eq!(route(&request("anything").with_target(fixable_issue())), Route::Fix);
        let blocking = Issue::blocking("0", "missing", "add");
        assert_eq!(route(&request("").with_target(blocking)), Route::Fix);
    }

    #[test]
    fn run_request_without_target_audits() {
        let lm = ScriptedLm::new().reply(json!({"is_compliant": true, "issues": []}));
        let outcome = run_request(Some(&lm), request("Goal: faster invoices. KPI: 12 -> 3 min"));
        match outcome {
            AgentOutcome::Audited(result) => assert!(result.is_compliant),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(lm.calls()[0].kind, LmCallKind::Audit);
    }

    #[test]
    fn run_request_with_target_fixes_and_consumes_trigger() {
        let lm = ScriptedLm::new().reply(json!({"fixed_content": "Goal: x\nKPI: y"}));
        let outcome = run_request(Some(&lm), request("Goal: x KPI: y").with_target(fixable_issue()));
        match outcome {
            AgentOutcome::Fixed(fix) => {
                assert_eq!(fix.status, FixStatus::Applied);
                assert_eq!(fix.request.user_content, "Goal: x\nKPI: y");
                assert!(fix.request.target_issue.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(lm.calls()[0].kind, LmCallKind::Fix);
    }
}
