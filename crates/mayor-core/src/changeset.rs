use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// File names recognized as dependency manifests or lockfiles.
pub const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.toml",
    "Cargo.lock",
    "requirements.txt",
    "pyproject.toml",
    "poetry.lock",
    "Pipfile",
    "Pipfile.lock",
    "go.mod",
    "go.sum",
    "Gemfile",
    "Gemfile.lock",
    "pom.xml",
    "build.gradle",
    "composer.json",
];

pub fn is_manifest(path: &str) -> bool {
    let normalized = crate::pattern::normalize_path(path);
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    MANIFEST_FILES.contains(&name)
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub lines_changed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Reviewers (users or teams) already requested on the PR.
    #[serde(default)]
    pub reviewers: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChange {
    pub ecosystem: String,
    pub name: String,
}

/// A pre-computed CI check result. `value` carries numeric results such as coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// The proposed unit of work being checked against a policy.
///
/// Built by the caller from whatever the VCS host reports; nothing here is fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub pr: PullRequest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckResult>,
}

impl ChangeSet {
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Nothing to evaluate. Empty change sets pass trivially.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.commands.is_empty()
            && self.dependencies.is_empty()
            && self.checks.is_empty()
            && self.commit_message.trim().is_empty()
            && self.pr.title.trim().is_empty()
            && self.pr.description.trim().is_empty()
    }

    pub fn files_changed(&self) -> usize {
        self.files.len()
    }

    pub fn lines_changed(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.lines_changed)).sum()
    }

    pub fn has_dependency_change(&self) -> bool {
        self.files.iter().any(|f| is_manifest(&f.path))
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_detection_uses_file_name() {
        assert!(is_manifest("package.json"));
        assert!(is_manifest("web/package.json"));
        assert!(is_manifest("crates\\core\\Cargo.toml"));
        assert!(!is_manifest("docs/package.json.md"));
        assert!(!is_manifest("src/cargo.toml"));
    }

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
files:
  - path: src/a.ts
    lines_changed: 12
  - path: package.json
commit_message: "[MAYOR] Add a thing"
pr:
  title: Add a thing
  labels: [enhancement]
"#;
        let cs = ChangeSet::from_yaml(yaml).unwrap();
        assert_eq!(cs.files_changed(), 2);
        assert_eq!(cs.lines_changed(), 12);
        assert!(cs.has_dependency_change());
        assert!(cs.pr.labels.contains("enhancement"));
        assert!(cs.commands.is_empty());
    }

    #[test]
    fn parses_json_input() {
        let json = r#"{"files":[{"path":"a.rs","lines_changed":3}],"checks":[{"name":"coverage","passed":true,"value":81.5}]}"#;
        let cs = ChangeSet::from_yaml(json).unwrap();
        assert_eq!(cs.check("coverage").and_then(|c| c.value), Some(81.5));
    }

    #[test]
    fn empty_change_set() {
        assert!(ChangeSet::default().is_empty());
    }
}
