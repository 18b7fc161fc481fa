use crate::bypass::{self, Bypass};
use crate::changeset::{is_manifest, ChangeSet};
use crate::pattern::{decide, PathDecision};
use crate::policy::{self as p, dependency_listed, Category, CommandMode, DependencyMode, PolicyDocument, PolicyWarning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    /// Not a hard block: a human has to sign off.
    RequiresApproval,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::RequiresApproval => "requires_approval",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Violation / Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub category: Category,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub bypassed: BTreeSet<String>,
    #[serde(default)]
    pub full_bypass: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PolicyWarning>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    /// One-line human summary of the first few violations.
    pub fn summary(&self) -> String {
        if self.passed {
            return "passed".to_string();
        }
        let mut parts: Vec<String> = self
            .violations
            .iter()
            .take(3)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect();
        if self.violations.len() > 3 {
            parts.push(format!("and {} more", self.violations.len() - 3));
        }
        parts.join("; ")
    }
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

/// Check a change set against a validated policy.
///
/// Violations are ordered by category (canonical order) and then by input order,
/// so identical inputs always produce identical verdicts.
pub fn evaluate(cs: &ChangeSet, policy: &PolicyDocument) -> Verdict {
    if !policy.enabled {
        tracing::debug!("policy disabled, skipping evaluation");
        return Verdict::pass();
    }

    let bypass = bypass::resolve(&cs.pr.labels, &policy.overrides);
    if bypass.full_bypass {
        return Verdict {
            passed: true,
            violations: Vec::new(),
            bypassed: bypass.bypassed_paths,
            full_bypass: true,
            warnings: bypass.warnings,
        };
    }
    if cs.is_empty() {
        return Verdict {
            bypassed: bypass.bypassed_paths,
            warnings: bypass.warnings,
            ..Verdict::pass()
        };
    }

    let mut c = Collector::new(&bypass);
    for category in Category::all() {
        if bypass.skips_category(*category) {
            continue;
        }
        match category {
            Category::Files => check_files(&mut c, cs, policy),
            Category::Commands => check_commands(&mut c, cs, policy),
            Category::Quality => check_quality(&mut c, cs, policy),
            Category::Dependencies => check_dependencies(&mut c, cs, policy),
            Category::Commits => check_commits(&mut c, cs, policy),
            Category::PullRequests => check_pull_request(&mut c, cs, policy),
        }
    }

    let Collector {
        violations,
        warnings,
        ..
    } = c;
    let mut all_warnings = bypass.warnings.clone();
    all_warnings.extend(warnings);
    tracing::debug!(violations = violations.len(), "policy evaluated");

    Verdict {
        passed: violations.is_empty(),
        violations,
        bypassed: bypass.bypassed_paths.clone(),
        full_bypass: false,
        warnings: all_warnings,
    }
}

struct Collector<'a> {
    bypass: &'a Bypass,
    violations: Vec<Violation>,
    warnings: Vec<PolicyWarning>,
}

impl<'a> Collector<'a> {
    fn new(bypass: &'a Bypass) -> Self {
        Self {
            bypass,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn push(&mut self, category: Category, rule: &str, severity: Severity, message: String) {
        if self.bypass.suppresses(category, rule) {
            return;
        }
        self.violations.push(Violation {
            category,
            rule: rule.to_string(),
            message,
            severity,
        });
    }

    fn error(&mut self, category: Category, rule: &str, message: String) {
        self.push(category, rule, Severity::Error, message);
    }
}

// ---------------------------------------------------------------------------
// files
// ---------------------------------------------------------------------------

fn check_files(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.files else {
        return;
    };
    let cat = Category::Files;

    for file in &cs.files {
        match decide(&file.path, &rules.allowed, &rules.blocked) {
            Ok(PathDecision::Allowed) => {}
            Ok(PathDecision::Blocked(pattern)) => c.error(
                cat,
                p::FILES_BLOCKED,
                format!("'{}' matches blocked pattern '{pattern}'", file.path),
            ),
            Ok(PathDecision::NotAllowed) => c.error(
                cat,
                p::FILES_ALLOWED,
                format!("'{}' is not covered by any allowed pattern", file.path),
            ),
            Err(_) => c.error(cat, p::FILES_PATH, "change set contains an empty file path".to_string()),
        }
        if let Some(max) = rules.max_lines_per_file {
            if file.lines_changed > max {
                c.error(
                    cat,
                    p::FILES_MAX_LINES,
                    format!(
                        "'{}' changes {} lines (max {max})",
                        file.path, file.lines_changed
                    ),
                );
            }
        }
    }

    if let Some(max) = rules.max_files_per_pr {
        if cs.files_changed() > max as usize {
            c.error(
                cat,
                p::FILES_MAX_FILES,
                format!("{} files changed (max {max})", cs.files_changed()),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// commands
// ---------------------------------------------------------------------------

fn check_commands(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.commands else {
        return;
    };
    let cat = Category::Commands;

    for command in &cs.commands {
        if let Some(hit) = rules.blocked.iter().find(|b| b.pattern.is_match(command)) {
            let reason = if hit.note.is_empty() {
                "blocked by policy"
            } else {
                hit.note.as_str()
            };
            c.error(cat, p::COMMANDS_BLOCKED, format!("'{command}' is blocked: {reason}"));
            continue;
        }
        let allowed = rules.allowed.iter().find(|a| a.pattern.is_match(command));
        match (allowed, rules.mode) {
            (Some(a), _) => tracing::debug!(command = %command, note = %a.note, "command allowed"),
            (None, CommandMode::Whitelist) => c.error(
                cat,
                p::COMMANDS_ALLOWED,
                format!("'{command}' does not match any allowed command"),
            ),
            (None, CommandMode::Blacklist) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// quality
// ---------------------------------------------------------------------------

fn check_quality(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.quality else {
        return;
    };
    let cat = Category::Quality;

    if cs.checks.is_empty() {
        c.warnings.push(PolicyWarning::new(
            "quality",
            "no check results supplied; quality rules were not evaluated",
        ));
        return;
    }

    for name in &rules.must_pass {
        match cs.check(name) {
            None => c.error(cat, p::QUALITY_MUST_PASS, format!("required check '{name}' was not reported")),
            Some(check) if !check.passed => {
                c.error(cat, p::QUALITY_MUST_PASS, format!("required check '{name}' failed"))
            }
            Some(_) => {}
        }
    }

    if let Some(min) = rules.min_coverage {
        match cs.check("coverage").and_then(|check| check.value) {
            None => c.error(cat, p::QUALITY_COVERAGE, "coverage was not reported".to_string()),
            Some(value) if value < f64::from(min) => c.error(
                cat,
                p::QUALITY_COVERAGE,
                format!("coverage {value}% is below the minimum of {min}%"),
            ),
            Some(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// dependencies
// ---------------------------------------------------------------------------

fn check_dependencies(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.dependencies else {
        return;
    };
    let cat = Category::Dependencies;

    match rules.mode {
        DependencyMode::Whitelist => {
            for dep in &cs.dependencies {
                if !dependency_listed(&rules.whitelist, &dep.ecosystem, &dep.name) {
                    c.error(
                        cat,
                        p::DEPENDENCIES_WHITELIST,
                        format!("{} dependency '{}' is not whitelisted", dep.ecosystem, dep.name),
                    );
                }
            }
        }
        DependencyMode::Blacklist => {
            for dep in &cs.dependencies {
                if dependency_listed(&rules.blacklist, &dep.ecosystem, &dep.name) {
                    c.error(
                        cat,
                        p::DEPENDENCIES_BLACKLIST,
                        format!("{} dependency '{}' is blacklisted", dep.ecosystem, dep.name),
                    );
                }
            }
        }
        DependencyMode::ApprovalRequired => {
            let manifests: Vec<&str> = cs
                .files
                .iter()
                .map(|f| f.path.as_str())
                .filter(|path| is_manifest(path))
                .collect();
            if !manifests.is_empty() || !cs.dependencies.is_empty() {
                let what = if manifests.is_empty() {
                    format!("{} dependency addition(s)", cs.dependencies.len())
                } else {
                    format!("dependency manifest change ({})", manifests.join(", "))
                };
                c.push(
                    cat,
                    p::DEPENDENCIES_APPROVAL,
                    Severity::RequiresApproval,
                    format!("{what} requires human approval"),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// commits
// ---------------------------------------------------------------------------

/// The last paragraph of a commit message, where trailers live.
fn message_tail(message: &str) -> &str {
    let trimmed = message.trim_end();
    trimmed
        .rsplit_once("\n\n")
        .map(|(_, tail)| tail)
        .unwrap_or(trimmed)
}

fn check_commits(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.commits else {
        return;
    };
    let cat = Category::Commits;
    let message = cs.commit_message.as_str();

    if !message.trim().is_empty() {
        if let Some(format) = &rules.format {
            let subject = message.lines().next().unwrap_or_default();
            if !format.pattern.is_match(subject) {
                let expected = format
                    .description
                    .clone()
                    .unwrap_or_else(|| format.pattern.as_str().to_string());
                c.error(
                    cat,
                    p::COMMITS_FORMAT,
                    format!("commit subject '{subject}' does not match format {expected}"),
                );
            }
        }
        if let Some(trailer) = &rules.required_trailer {
            if !message_tail(message).lines().any(|l| trailer.is_match(l.trim())) {
                c.error(
                    cat,
                    p::COMMITS_TRAILER,
                    format!("commit message is missing a trailer matching '{}'", trailer.as_str()),
                );
            }
        }
    }

    if let Some(max) = rules.max_size {
        if cs.lines_changed() > u64::from(max) {
            c.error(
                cat,
                p::COMMITS_MAX_SIZE,
                format!("commit changes {} lines (max {max})", cs.lines_changed()),
            );
        }
    }
    if let Some(max) = rules.max_files {
        if cs.files_changed() > max as usize {
            c.error(
                cat,
                p::COMMITS_MAX_FILES,
                format!("commit touches {} files (max {max})", cs.files_changed()),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// pull requests
// ---------------------------------------------------------------------------

fn check_pull_request(c: &mut Collector, cs: &ChangeSet, policy: &PolicyDocument) {
    let Some(rules) = &policy.pull_requests else {
        return;
    };
    let cat = Category::PullRequests;
    let pr = &cs.pr;

    if let Some(re) = &rules.title_pattern {
        if !re.is_match(&pr.title) {
            c.error(
                cat,
                p::PR_TITLE,
                format!("title '{}' does not match '{}'", pr.title, re.as_str()),
            );
        }
    }
    for section in &rules.required_sections {
        if !pr.description.contains(section.as_str()) {
            c.error(
                cat,
                p::PR_REQUIRED_SECTIONS,
                format!("description is missing section '{section}'"),
            );
        }
    }
    for label in &rules.required_labels {
        if !pr.labels.contains(label) {
            c.error(cat, p::PR_REQUIRED_LABELS, format!("missing required label '{label}'"));
        }
    }
    for rule in &rules.auto_add_labels {
        if rule.condition.holds(cs) && !pr.labels.contains(&rule.label) {
            c.push(
                cat,
                p::PR_AUTO_ADD_LABELS,
                Severity::Warning,
                format!("label '{}' should be added ({})", rule.label, rule.condition),
            );
        }
    }
    for rule in &rules.required_reviewers {
        if rule.condition.holds(cs) && !rule.reviewers.iter().any(|r| pr.reviewers.contains(r)) {
            c.error(
                cat,
                p::PR_REQUIRED_REVIEWERS,
                format!(
                    "review required from one of [{}] ({})",
                    rule.reviewers.join(", "),
                    rule.condition
                ),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{CheckResult, DependencyChange, FileChange};
    use crate::schema::validate;

    fn policy(yaml: &str) -> PolicyDocument {
        validate(yaml).unwrap().policy
    }

    fn files(paths: &[&str]) -> ChangeSet {
        ChangeSet {
            files: paths
                .iter()
                .map(|p| FileChange {
                    path: p.to_string(),
                    lines_changed: 10,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn rules(v: &Verdict) -> Vec<&str> {
        v.violations.iter().map(|v| v.rule.as_str()).collect()
    }

    const FILES_POLICY: &str = r#"
version: "1.0"
enabled: true
policies:
  files:
    blocked_patterns: [".github/workflows/**"]
    max_files_per_pr: 2
"#;

    #[test]
    fn blocked_workflow_path_fails() {
        let v = evaluate(
            &files(&[".github/workflows/ci.yml", "src/a.ts"]),
            &policy(FILES_POLICY),
        );
        assert!(!v.passed);
        assert_eq!(rules(&v), vec![p::FILES_BLOCKED]);
    }

    #[test]
    fn third_file_trips_max_files() {
        let v = evaluate(
            &files(&[".github/workflows/ci.yml", "src/a.ts", "src/b.ts"]),
            &policy(FILES_POLICY),
        );
        assert_eq!(rules(&v), vec![p::FILES_BLOCKED, p::FILES_MAX_FILES]);
    }

    #[test]
    fn root_anchored_blocked_pattern_is_enforced() {
        let pol = policy("version: \"1.0\"\nenabled: true\npolicies:\n  files:\n    blocked_patterns: [\"/secrets/**\"]\n");
        let v = evaluate(&files(&["secrets/key.pem"]), &pol);
        assert_eq!(rules(&v), vec![p::FILES_BLOCKED]);
        let v = evaluate(&files(&["app/secrets/key.pem"]), &pol);
        assert!(v.passed);
    }

    #[test]
    fn severity_display_matches_serialized_form() {
        for severity in [Severity::Error, Severity::Warning, Severity::RequiresApproval] {
            let json = serde_json::to_string(&severity).unwrap();
            assert_eq!(json, format!("\"{severity}\""));
        }
        assert_eq!(Severity::RequiresApproval.as_str(), "requires_approval");
    }

    #[test]
    fn blocked_beats_allowed() {
        let pol = policy(
            r#"
version: "1.0"
enabled: true
policies:
  files:
    allowed_patterns: ["src/**"]
    blocked_patterns: ["**/*.sql"]
"#,
        );
        let v = evaluate(&files(&["src/migrations/init.sql", "src/ok.rs", "README.md"]), &pol);
        assert_eq!(rules(&v), vec![p::FILES_BLOCKED, p::FILES_ALLOWED]);
    }

    #[test]
    fn max_lines_per_file() {
        let pol = policy(
            "version: \"1.0\"\nenabled: true\npolicies:\n  files:\n    max_lines_per_file: 5\n",
        );
        let v = evaluate(&files(&["src/a.rs"]), &pol);
        assert_eq!(rules(&v), vec![p::FILES_MAX_LINES]);
    }

    #[test]
    fn empty_path_is_a_violation_not_a_panic() {
        let pol = policy(FILES_POLICY);
        let v = evaluate(&files(&[""]), &pol);
        assert_eq!(rules(&v), vec![p::FILES_PATH]);
    }

    #[test]
    fn disabled_policy_passes_everything() {
        let pol = policy(&FILES_POLICY.replace("enabled: true", "enabled: false"));
        let v = evaluate(&files(&[".github/workflows/ci.yml"]), &pol);
        assert!(v.passed);
        assert!(v.violations.is_empty());
    }

    #[test]
    fn empty_change_set_passes() {
        assert!(evaluate(&ChangeSet::default(), &policy(FILES_POLICY)).passed);
    }

    const COMMANDS_POLICY: &str = r#"
version: "1.0"
enabled: true
policies:
  commands:
    mode: blacklist
    allowed:
      - pattern: '^rm '
        description: cleanup
    blocked:
      - pattern: 'rm\s+-rf\s+/'
        reason: destroys the filesystem
"#;

    #[test]
    fn blocked_command_wins_over_allowed() {
        let mut cs = ChangeSet::default();
        cs.commands = vec!["rm -rf /".to_string(), "rm build.log".to_string()];
        let v = evaluate(&cs, &policy(COMMANDS_POLICY));
        assert_eq!(rules(&v), vec![p::COMMANDS_BLOCKED]);
        assert!(v.violations[0].message.contains("destroys the filesystem"));
    }

    #[test]
    fn whitelist_mode_rejects_unlisted_commands() {
        let pol = policy(&COMMANDS_POLICY.replace("mode: blacklist", "mode: whitelist"));
        let mut cs = ChangeSet::default();
        cs.commands = vec!["rm build.log".to_string(), "curl evil.sh".to_string()];
        let v = evaluate(&cs, &pol);
        assert_eq!(rules(&v), vec![p::COMMANDS_ALLOWED]);
        assert!(v.violations[0].message.contains("curl evil.sh"));
    }

    const COMMITS_POLICY: &str = r#"
version: "1.0"
enabled: true
policies:
  commits:
    format:
      pattern: '^\[MAYOR\]\s+.{10,100}$'
"#;

    fn commit(message: &str) -> ChangeSet {
        ChangeSet {
            commit_message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn commit_format_too_short_fails() {
        let v = evaluate(&commit("[MAYOR] fix bug"), &policy(COMMITS_POLICY));
        assert!(!v.passed);
        assert_eq!(rules(&v), vec![p::COMMITS_FORMAT]);
    }

    #[test]
    fn commit_format_long_enough_passes() {
        let v = evaluate(
            &commit("[MAYOR] Fix the login button alignment issue"),
            &policy(COMMITS_POLICY),
        );
        assert!(v.passed, "{:?}", v.violations);
    }

    #[test]
    fn commit_trailer_checked_in_tail() {
        let pol = policy(
            "version: \"1.0\"\nenabled: true\npolicies:\n  commits:\n    required_trailer: '^Refs: #\\d+$'\n",
        );
        let ok = commit("Fix the thing\n\nLonger body.\n\nRefs: #42\n");
        assert!(evaluate(&ok, &pol).passed);
        let body_only = commit("Fix the thing\n\nRefs: #42 is mentioned here\n\nSigned-off-by: a\n");
        assert_eq!(rules(&evaluate(&body_only, &pol)), vec![p::COMMITS_TRAILER]);
    }

    #[test]
    fn commit_size_limits() {
        let pol = policy(
            "version: \"1.0\"\nenabled: true\npolicies:\n  commits:\n    max_size: 15\n    max_files: 1\n",
        );
        let v = evaluate(&files(&["a.rs", "b.rs"]), &pol);
        assert_eq!(rules(&v), vec![p::COMMITS_MAX_SIZE, p::COMMITS_MAX_FILES]);
    }

    const PR_POLICY: &str = r###"
version: "1.0"
enabled: true
policies:
  pull_requests:
    title_pattern: '^\[MAYOR\]'
    required_sections: ["## Summary"]
    required_labels: [mayor]
    auto_add_labels:
      - label: large-change
        condition: files_changed > 1
    required_reviewers:
      - reviewers: [security-team]
        condition: has_dependency_change
"###;

    #[test]
    fn pull_request_rules() {
        let mut cs = files(&["package.json", "src/a.ts"]);
        cs.pr.title = "Add login".to_string();
        cs.pr.description = "no sections".to_string();
        let v = evaluate(&cs, &policy(PR_POLICY));
        assert_eq!(
            rules(&v),
            vec![
                p::PR_TITLE,
                p::PR_REQUIRED_SECTIONS,
                p::PR_REQUIRED_LABELS,
                p::PR_AUTO_ADD_LABELS,
                p::PR_REQUIRED_REVIEWERS,
            ]
        );
        assert_eq!(v.violations[3].severity, Severity::Warning);
    }

    #[test]
    fn compliant_pull_request_passes() {
        let mut cs = files(&["package.json", "src/a.ts"]);
        cs.pr.title = "[MAYOR] Add login".to_string();
        cs.pr.description = "## Summary\nAdds login.".to_string();
        cs.pr.labels = ["mayor", "large-change"].iter().map(|s| s.to_string()).collect();
        cs.pr.reviewers = ["security-team".to_string()].into_iter().collect();
        let v = evaluate(&cs, &policy(PR_POLICY));
        assert!(v.passed, "{:?}", v.violations);
    }

    #[test]
    fn dependency_modes() {
        let base = "version: \"1.0\"\nenabled: true\npolicies:\n  dependencies:\n";
        let mut cs = files(&["package.json"]);
        cs.dependencies = vec![
            DependencyChange {
                ecosystem: "npm".to_string(),
                name: "@types/node".to_string(),
            },
            DependencyChange {
                ecosystem: "npm".to_string(),
                name: "left-pad".to_string(),
            },
        ];

        let white = policy(&format!("{base}    mode: whitelist\n    whitelist:\n      npm: [\"@types/*\"]\n"));
        let v = evaluate(&cs, &white);
        assert_eq!(rules(&v), vec![p::DEPENDENCIES_WHITELIST]);
        assert!(v.violations[0].message.contains("left-pad"));

        let black = policy(&format!("{base}    mode: blacklist\n    blacklist:\n      npm: [left-pad]\n"));
        assert_eq!(rules(&evaluate(&cs, &black)), vec![p::DEPENDENCIES_BLACKLIST]);

        let approval = policy(&format!("{base}    mode: approval_required\n"));
        let v = evaluate(&cs, &approval);
        assert_eq!(rules(&v), vec![p::DEPENDENCIES_APPROVAL]);
        assert_eq!(v.violations[0].severity, Severity::RequiresApproval);
        assert!(!v.passed);
    }

    const QUALITY_POLICY: &str = r#"
version: "1.0"
enabled: true
policies:
  quality:
    must_pass: [tests, lint]
    min_coverage: 80
overrides:
  partial_bypass:
    - label: skip-coverage
      bypass: [quality.coverage]
"#;

    fn checks(list: &[(&str, bool, Option<f64>)]) -> ChangeSet {
        ChangeSet {
            checks: list
                .iter()
                .map(|(n, ok, v)| CheckResult {
                    name: n.to_string(),
                    passed: *ok,
                    value: *v,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn quality_thresholds() {
        let cs = checks(&[("tests", true, None), ("coverage", true, Some(72.5))]);
        let v = evaluate(&cs, &policy(QUALITY_POLICY));
        assert_eq!(rules(&v), vec![p::QUALITY_MUST_PASS, p::QUALITY_COVERAGE]);
        assert!(v.violations[0].message.contains("lint"));
    }

    #[test]
    fn quality_partial_bypass_drops_only_coverage() {
        let mut cs = checks(&[("tests", true, None), ("coverage", true, Some(10.0))]);
        cs.pr.labels.insert("skip-coverage".to_string());
        let v = evaluate(&cs, &policy(QUALITY_POLICY));
        assert_eq!(rules(&v), vec![p::QUALITY_MUST_PASS]);
        assert!(v.bypassed.contains("quality.coverage"));
    }

    #[test]
    fn quality_without_results_warns() {
        let v = evaluate(&files(&["src/a.rs"]), &policy(QUALITY_POLICY));
        assert!(v.passed);
        assert!(v.warnings.iter().any(|w| w.path == "quality"));
    }

    #[test]
    fn global_bypass_wins_even_when_label_is_partial_too() {
        let pol = policy(
            r#"
version: "1.0"
enabled: true
policies:
  files:
    blocked_patterns: ["**"]
overrides:
  bypass_labels: [emergency]
  partial_bypass:
    - label: emergency
      bypass: [quality.coverage]
"#,
        );
        let mut cs = files(&["src/a.rs"]);
        cs.pr.labels.insert("emergency".to_string());
        let v = evaluate(&cs, &pol);
        assert!(v.passed);
        assert!(v.full_bypass);
        assert_eq!(v.bypassed.len(), 6);
    }

    #[test]
    fn category_bypass_skips_whole_category() {
        let pol = policy(&format!(
            "{FILES_POLICY}overrides:\n  partial_bypass:\n    - label: infra\n      bypass: [files]\n"
        ));
        let mut cs = files(&[".github/workflows/ci.yml", "a", "b"]);
        cs.pr.labels.insert("infra".to_string());
        assert!(evaluate(&cs, &pol).passed);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let pol = policy(PR_POLICY);
        let mut cs = files(&["package.json", "src/a.ts", "src/b.ts"]);
        cs.pr.title = "x".to_string();
        let a = serde_json::to_string(&evaluate(&cs, &pol)).unwrap();
        let b = serde_json::to_string(&evaluate(&cs.clone(), &pol)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn message_tail_is_last_paragraph() {
        assert_eq!(message_tail("subject\n\nbody\n\nRefs: #1\n"), "Refs: #1");
        assert_eq!(message_tail("subject only"), "subject only");
    }
}
