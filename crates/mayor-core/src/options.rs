use crate::error::{MayorError, Result};
use crate::policy::Category;
use crate::schema::ITERATION_BOUNDS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// MergeStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Squash,
    Merge,
    Rebase,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Squash => "squash",
            MergeStrategy::Merge => "merge",
            MergeStrategy::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = MayorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "squash" => Ok(MergeStrategy::Squash),
            "merge" => Ok(MergeStrategy::Merge),
            "rebase" => Ok(MergeStrategy::Rebase),
            _ => Err(MayorError::InvalidMergeStrategy(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SetupOptions
// ---------------------------------------------------------------------------

/// Everything the file generators read. Generators see nothing else, so equal
/// options always produce byte-identical files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupOptions {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default = "default_policy_categories")]
    pub policy_categories: Vec<Category>,
    /// Issue/PR label marking work owned by the coding agent.
    #[serde(default = "default_agent_label")]
    pub agent_label: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Cron expression for the orchestrator workflow.
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

fn default_project_name() -> String {
    "project".to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_policy_categories() -> Vec<Category> {
    Category::all().to_vec()
}

fn default_agent_label() -> String {
    "mayor".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_schedule() -> String {
    "*/30 * * * *".to_string()
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            max_iterations: default_max_iterations(),
            merge_strategy: MergeStrategy::default(),
            policy_categories: default_policy_categories(),
            agent_label: default_agent_label(),
            base_branch: default_base_branch(),
            schedule: default_schedule(),
        }
    }
}

impl SetupOptions {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let opts: SetupOptions = serde_yaml::from_str(data)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = ITERATION_BOUNDS;
        if i64::from(self.max_iterations) < lo || i64::from(self.max_iterations) > hi {
            return Err(MayorError::InvalidOptions(format!(
                "max_iterations must be between {lo} and {hi}, got {}",
                self.max_iterations
            )));
        }
        for (name, value) in [
            ("project_name", &self.project_name),
            ("agent_label", &self.agent_label),
            ("base_branch", &self.base_branch),
            ("schedule", &self.schedule),
        ] {
            if value.trim().is_empty() || value.chars().any(|c| c.is_control()) {
                return Err(MayorError::InvalidOptions(format!(
                    "{name} must be a non-empty single-line string"
                )));
            }
        }
        let unique: BTreeSet<_> = self.policy_categories.iter().collect();
        if unique.len() != self.policy_categories.len() {
            return Err(MayorError::InvalidOptions(
                "policy_categories contains duplicates".to_string(),
            ));
        }
        Ok(())
    }

    /// Categories in canonical order, regardless of the order they were given in.
    pub fn categories(&self) -> Vec<Category> {
        Category::all()
            .iter()
            .copied()
            .filter(|c| self.policy_categories.contains(c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
