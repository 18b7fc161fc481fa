use crate::options::SetupOptions;
use crate::paths;
use crate::pattern::normalize_path;
use crate::templates;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// FileCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Configuration,
    Agent,
    Workflow,
    Template,
}

impl FileCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Configuration => "configuration",
            FileCategory::Agent => "agent",
            FileCategory::Workflow => "workflow",
            FileCategory::Template => "template",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FileSpec
// ---------------------------------------------------------------------------

/// One file the setup reconciler knows how to generate.
#[derive(Clone, Copy, Serialize)]
pub struct FileSpec {
    pub id: &'static str,
    pub path: &'static str,
    pub category: FileCategory,
    /// Created even in minimal mode.
    pub critical: bool,
    pub description: &'static str,
    #[serde(skip)]
    pub generator: fn(&SetupOptions) -> String,
}

impl FileSpec {
    pub fn generate(&self, opts: &SetupOptions) -> String {
        (self.generator)(opts)
    }
}

impl fmt::Debug for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSpec")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("category", &self.category)
            .field("critical", &self.critical)
            .finish()
    }
}

pub const CATALOG: &[FileSpec] = &[
    FileSpec {
        id: "vscode-settings",
        path: paths::VSCODE_SETTINGS,
        category: FileCategory::Configuration,
        critical: false,
        description: "Editor settings for agent request limits and instruction files",
        generator: templates::vscode_settings,
    },
    FileSpec {
        id: "agent-instructions",
        path: paths::AGENTS_MD,
        category: FileCategory::Agent,
        critical: true,
        description: "Working instructions for the coding agent",
        generator: templates::agent_instructions,
    },
    FileSpec {
        id: "auto-merge",
        path: paths::AUTO_MERGE_WORKFLOW,
        category: FileCategory::Workflow,
        critical: false,
        description: "Enables auto-merge on agent pull requests",
        generator: templates::auto_merge_workflow,
    },
    FileSpec {
        id: "orchestrator",
        path: paths::ORCHESTRATOR_WORKFLOW,
        category: FileCategory::Workflow,
        critical: true,
        description: "Assigns ready issues to the agent on a schedule",
        generator: templates::orchestrator_workflow,
    },
    FileSpec {
        id: "issue-template",
        path: paths::ISSUE_TEMPLATE,
        category: FileCategory::Template,
        critical: true,
        description: "Issue template for agent tasks",
        generator: templates::issue_template,
    },
    FileSpec {
        id: "policy",
        path: paths::POLICY_FILE,
        category: FileCategory::Configuration,
        critical: false,
        description: "Policy checked against every agent change",
        generator: templates::policy_file,
    },
];

/// Look up a catalog entry by id or by path.
pub fn find(id_or_path: &str) -> Option<&'static FileSpec> {
    let needle = normalize_path(id_or_path.trim());
    CATALOG
        .iter()
        .find(|spec| spec.id == needle || spec.path == needle)
}

pub fn critical() -> impl Iterator<Item = &'static FileSpec> {
    CATALOG.iter().filter(|spec| spec.critical)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
