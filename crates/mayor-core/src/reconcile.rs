use crate::catalog::{self, FileSpec, CATALOG};
use crate::error::{MayorError, Result};
use crate::options::SetupOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// SetupMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupMode {
    #[default]
    Full,
    Minimal,
    Custom,
}

impl SetupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SetupMode::Full => "full",
            SetupMode::Minimal => "minimal",
            SetupMode::Custom => "custom",
        }
    }
}

impl fmt::Display for SetupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SetupMode {
    type Err = MayorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(SetupMode::Full),
            "minimal" => Ok(SetupMode::Minimal),
            "custom" => Ok(SetupMode::Custom),
            _ => Err(MayorError::InvalidMode(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// FileAction / SetupPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Create,
    Overwrite,
    Skip,
}

impl FileAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FileAction::Create => "create",
            FileAction::Overwrite => "overwrite",
            FileAction::Skip => "skip",
        }
    }

    pub fn writes(self) -> bool {
        !matches!(self, FileAction::Skip)
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const REASON_MISSING: &str = "file does not exist";
pub const REASON_EXISTS: &str = "already exists, use --overwrite to replace";
pub const REASON_UP_TO_DATE: &str = "up to date";
pub const REASON_DIFFERS: &str = "content differs, overwriting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub path: String,
    pub action: FileAction,
    pub reason: String,
    #[serde(skip)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupPlan {
    pub mode: SetupMode,
    pub actions: Vec<PlannedAction>,
}

impl SetupPlan {
    /// True when applying the plan would change nothing.
    pub fn is_clean(&self) -> bool {
        self.actions.iter().all(|a| !a.action.writes())
    }

    pub fn writes(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.action.writes())
    }

    pub fn apply_to(&self, snapshot: &mut FileSnapshot) {
        for action in self.writes() {
            snapshot.insert(action.path.clone(), action.content.clone().into_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// File state
// ---------------------------------------------------------------------------

/// Read access to the repository as the reconciler sees it.
pub trait FileState {
    fn contents(&self, path: &str) -> Option<&[u8]>;

    fn exists(&self, path: &str) -> bool {
        self.contents(path).is_some()
    }
}

/// Contents of catalog paths captured once at the filesystem boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    files: BTreeMap<String, Vec<u8>>,
}

impl FileSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileState for FileSnapshot {
    fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Resolve a mode and optional custom selection into catalog entries, in
/// catalog order.
pub fn select<S: AsRef<str>>(mode: SetupMode, selection: &[S]) -> Result<Vec<&'static FileSpec>> {
    match mode {
        SetupMode::Full => Ok(CATALOG.iter().collect()),
        SetupMode::Minimal => Ok(catalog::critical().collect()),
        SetupMode::Custom => {
            if selection.is_empty() {
                return Err(MayorError::EmptySelection);
            }
            let mut unknown = Vec::new();
            let mut chosen = Vec::new();
            for entry in selection {
                match catalog::find(entry.as_ref()) {
                    Some(spec) => chosen.push(spec.id),
                    None => unknown.push(entry.as_ref().to_string()),
                }
            }
            if !unknown.is_empty() {
                return Err(MayorError::UnknownFile(unknown));
            }
            Ok(CATALOG.iter().filter(|s| chosen.contains(&s.id)).collect())
        }
    }
}

/// Compute the actions needed to bring `state` in line with the catalog.
///
/// Pure: nothing is written. Applying the plan and planning again yields only
/// skips, with or without `overwrite`.
pub fn plan<S: AsRef<str>>(
    mode: SetupMode,
    selection: &[S],
    state: &dyn FileState,
    options: &SetupOptions,
    overwrite: bool,
) -> Result<SetupPlan> {
    options.validate()?;
    if mode != SetupMode::Custom && !selection.is_empty() {
        tracing::debug!(mode = %mode, "file selection ignored outside custom mode");
    }
    let specs = select(mode, selection)?;

    let actions = specs
        .into_iter()
        .map(|spec| {
            let content = spec.generate(options);
            let (action, reason) = match state.contents(spec.path) {
                None => (FileAction::Create, REASON_MISSING),
                Some(existing) if existing == content.as_bytes() => {
                    (FileAction::Skip, REASON_UP_TO_DATE)
                }
                Some(_) if overwrite => (FileAction::Overwrite, REASON_DIFFERS),
                Some(_) => (FileAction::Skip, REASON_EXISTS),
            };
            PlannedAction {
                path: spec.path.to_string(),
                action,
                reason: reason.to_string(),
                content,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        mode = %mode,
        actions = actions.len(),
        writes = actions.iter().filter(|a| a.action.writes()).count(),
        "setup plan computed"
    );
    Ok(SetupPlan { mode, actions })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    fn opts() -> SetupOptions {
        SetupOptions::new("demo")
    }

    #[test]
    fn full_mode_on_empty_repo_creates_everything() {
        let p = plan(SetupMode::Full, NONE, &FileSnapshot::new(), &opts(), false).unwrap();
        assert_eq!(p.actions.len(), CATALOG.len());
        assert!(p.actions.iter().all(|a| a.action == FileAction::Create));
    }

    #[test]
    fn minimal_mode_creates_exactly_critical_files() {
        let p = plan(SetupMode::Minimal, NONE, &FileSnapshot::new(), &opts(), false).unwrap();
        let paths: Vec<_> = p.actions.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "AGENTS.md",
                ".github/workflows/mayor-orchestrator.yml",
                ".github/ISSUE_TEMPLATE/mayor-task.md",
            ]
        );
        assert!(p.actions.iter().all(|a| a.action == FileAction::Create));
    }

    #[test]
    fn apply_then_replan_is_clean() {
        let mut snap = FileSnapshot::new();
        let first = plan(SetupMode::Full, NONE, &snap, &opts(), false).unwrap();
        assert!(!first.is_clean());
        first.apply_to(&mut snap);
        assert_eq!(snap.len(), CATALOG.len());

        let second = plan(SetupMode::Full, NONE, &snap, &opts(), false).unwrap();
        assert!(second.is_clean());
        assert!(second.actions.iter().all(|a| a.reason == REASON_UP_TO_DATE));

        let with_overwrite = plan(SetupMode::Full, NONE, &snap, &opts(), true).unwrap();
        assert!(with_overwrite.is_clean());
    }

    #[test]
    fn existing_file_skipped_unless_overwrite() {
        let mut snap = FileSnapshot::new();
        snap.insert("AGENTS.md", "hand written\n");

        let p = plan(SetupMode::Custom, &["agent-instructions"], &snap, &opts(), false).unwrap();
        assert_eq!(p.actions[0].action, FileAction::Skip);
        assert_eq!(p.actions[0].reason, REASON_EXISTS);

        let p = plan(SetupMode::Custom, &["AGENTS.md"], &snap, &opts(), true).unwrap();
        assert_eq!(p.actions[0].action, FileAction::Overwrite);
    }

    #[test]
    fn custom_selection_uses_catalog_order_and_dedups() {
        let p = plan(
            SetupMode::Custom,
            &["policy", "vscode-settings", ".mayor/policy.yml"],
            &FileSnapshot::new(),
            &opts(),
            false,
        )
        .unwrap();
        let paths: Vec<_> = p.actions.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec![".vscode/settings.json", ".mayor/policy.yml"]);
    }

    #[test]
    fn unknown_custom_entries_abort_whole_plan() {
        let err = plan(
            SetupMode::Custom,
            &["policy", "README.md", "nope"],
            &FileSnapshot::new(),
            &opts(),
            false,
        )
        .unwrap_err();
        match err {
            MayorError::UnknownFile(names) => assert_eq!(names, vec!["README.md", "nope"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_custom_selection_rejected() {
        let err = plan(SetupMode::Custom, NONE, &FileSnapshot::new(), &opts(), false).unwrap_err();
        assert!(matches!(err, MayorError::EmptySelection));
    }

    #[test]
    fn changed_options_produce_overwrites() {
        let mut snap = FileSnapshot::new();
        plan(SetupMode::Full, NONE, &snap, &opts(), false)
            .unwrap()
            .apply_to(&mut snap);

        let mut changed = opts();
        changed.max_iterations = 20;
        let p = plan(SetupMode::Full, NONE, &snap, &changed, true).unwrap();
        assert!(p.writes().any(|a| a.path == ".mayor/policy.yml"));
        assert!(p.writes().all(|a| a.action == FileAction::Overwrite));
    }

    #[test]
    fn mode_parse() {
        assert_eq!("minimal".parse::<SetupMode>().unwrap(), SetupMode::Minimal);
        assert!(matches!("partial".parse::<SetupMode>(), Err(MayorError::InvalidMode(_))));
    }
}
