use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Path constants
// ---------------------------------------------------------------------------

pub const MAYOR_DIR: &str = ".mayor";
pub const POLICY_FILE: &str = ".mayor/policy.yml";
pub const SETUP_OPTIONS_FILE: &str = ".mayor/setup.yml";

pub const VSCODE_SETTINGS: &str = ".vscode/settings.json";
pub const AGENTS_MD: &str = "AGENTS.md";
pub const AUTO_MERGE_WORKFLOW: &str = ".github/workflows/mayor-auto-merge.yml";
pub const ORCHESTRATOR_WORKFLOW: &str = ".github/workflows/mayor-orchestrator.yml";
pub const ISSUE_TEMPLATE: &str = ".github/ISSUE_TEMPLATE/mayor-task.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn mayor_dir(root: &Path) -> PathBuf {
    root.join(MAYOR_DIR)
}

pub fn policy_path(root: &Path) -> PathBuf {
    root.join(POLICY_FILE)
}

pub fn setup_options_path(root: &Path) -> PathBuf {
    root.join(SETUP_OPTIONS_FILE)
}

/// Resolve a `/`-separated repository-relative path under `root`.
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}
