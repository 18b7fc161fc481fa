use crate::evaluator::Verdict;
use crate::reconcile::SetupPlan;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCheck {
    pub name: String,
    pub detail: String,
}

/// Pass/fail tally for a `verify` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scorecard {
    pub expected_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: Vec<FailedCheck>,
}

impl Scorecard {
    pub fn record(&mut self, name: impl Into<String>, passed: bool, detail: impl Into<String>) {
        self.expected_checks += 1;
        if passed {
            self.passed_checks += 1;
        } else {
            self.failed_checks.push(FailedCheck {
                name: name.into(),
                detail: detail.into(),
            });
        }
    }

    pub fn passed(&self) -> bool {
        self.failed_checks.is_empty()
    }
}

/// Tally one check per plan action and one per named verdict.
///
/// A file check passes when its action is skip: the file is present and nothing
/// would be written.
pub fn report(plan: Option<&SetupPlan>, verdicts: &[(String, Verdict)]) -> Scorecard {
    let mut card = Scorecard::default();
    if let Some(plan) = plan {
        for action in &plan.actions {
            card.record(
                format!("file:{}", action.path),
                !action.action.writes(),
                format!("{}: {}", action.action, action.reason),
            );
        }
    }
    for (name, verdict) in verdicts {
        card.record(format!("policy:{name}"), verdict.passed, verdict.summary());
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Severity, Violation};
    use crate::policy::Category;
    use crate::reconcile::{plan, FileSnapshot, SetupMode};
    use crate::options::SetupOptions;

    const NONE: &[&str] = &[];

    #[test]
    fn fresh_repo_fails_every_file_check() {
        let p = plan(SetupMode::Minimal, NONE, &FileSnapshot::new(), &SetupOptions::default(), false)
            .unwrap();
        let card = report(Some(&p), &[]);
        assert_eq!(card.expected_checks, 3);
        assert_eq!(card.passed_checks, 0);
        assert_eq!(card.failed_checks[0].name, "file:AGENTS.md");
        assert!(card.failed_checks[0].detail.starts_with("create"));
    }

    #[test]
    fn set_up_repo_passes() {
        let opts = SetupOptions::default();
        let mut snap = FileSnapshot::new();
        plan(SetupMode::Full, NONE, &snap, &opts, false)
            .unwrap()
            .apply_to(&mut snap);
        let p = plan(SetupMode::Full, NONE, &snap, &opts, false).unwrap();
        let card = report(Some(&p), &[("default".to_string(), Verdict::pass())]);
        assert_eq!(card.expected_checks, 7);
        assert!(card.passed());
    }

    #[test]
    fn failing_verdict_carries_summary() {
        let verdict = Verdict {
            passed: false,
            violations: vec![Violation {
                category: Category::Files,
                rule: "files.blocked_patterns".to_string(),
                message: "'.env' is blocked".to_string(),
                severity: Severity::Error,
            }],
            ..Default::default()
        };
        let card = report(None, &[("ci".to_string(), verdict)]);
        assert_eq!(card.failed_checks.len(), 1);
        assert_eq!(card.failed_checks[0].name, "policy:ci");
        assert!(card.failed_checks[0].detail.contains("files.blocked_patterns"));
    }

    #[test]
    fn record_adds_ad_hoc_checks() {
        let mut card = Scorecard::default();
        card.record("schema", true, "");
        card.record("other", false, "broken");
        assert_eq!(card.expected_checks, 2);
        assert_eq!(card.passed_checks, 1);
        assert!(!card.passed());
    }
}
