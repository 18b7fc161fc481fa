use crate::changeset::ChangeSet;
use crate::error::MayorError;
use crate::pattern::{GlobPattern, PatternSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

/// Schema versions this build understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Files,
    Commands,
    Quality,
    Dependencies,
    Commits,
    PullRequests,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Files,
            Category::Commands,
            Category::Quality,
            Category::Dependencies,
            Category::Commits,
            Category::PullRequests,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Files => "files",
            Category::Commands => "commands",
            Category::Quality => "quality",
            Category::Dependencies => "dependencies",
            Category::Commits => "commits",
            Category::PullRequests => "pull_requests",
        }
    }

    pub fn is_valid(s: &str) -> bool {
        s.parse::<Category>().is_ok()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = MayorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "files" => Ok(Category::Files),
            "commands" => Ok(Category::Commands),
            "quality" => Ok(Category::Quality),
            "dependencies" => Ok(Category::Dependencies),
            "commits" => Ok(Category::Commits),
            "pull_requests" => Ok(Category::PullRequests),
            _ => Err(MayorError::InvalidCategory(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule paths
// ---------------------------------------------------------------------------

pub const FILES_PATH: &str = "files.path";
pub const FILES_BLOCKED: &str = "files.blocked_patterns";
pub const FILES_ALLOWED: &str = "files.allowed_patterns";
pub const FILES_MAX_FILES: &str = "files.max_files_per_pr";
pub const FILES_MAX_LINES: &str = "files.max_lines_per_file";
pub const COMMANDS_BLOCKED: &str = "commands.blocked";
pub const COMMANDS_ALLOWED: &str = "commands.allowed";
pub const QUALITY_MUST_PASS: &str = "quality.must_pass";
pub const QUALITY_COVERAGE: &str = "quality.coverage";
pub const DEPENDENCIES_WHITELIST: &str = "dependencies.whitelist";
pub const DEPENDENCIES_BLACKLIST: &str = "dependencies.blacklist";
pub const DEPENDENCIES_APPROVAL: &str = "dependencies.approval";
pub const COMMITS_FORMAT: &str = "commits.format";
pub const COMMITS_MAX_SIZE: &str = "commits.max_size";
pub const COMMITS_MAX_FILES: &str = "commits.max_files";
pub const COMMITS_TRAILER: &str = "commits.trailer";
pub const PR_TITLE: &str = "pull_requests.title";
pub const PR_REQUIRED_SECTIONS: &str = "pull_requests.required_sections";
pub const PR_REQUIRED_LABELS: &str = "pull_requests.required_labels";
pub const PR_AUTO_ADD_LABELS: &str = "pull_requests.auto_add_labels";
pub const PR_REQUIRED_REVIEWERS: &str = "pull_requests.required_reviewers";

/// Every rule path the evaluator can emit a violation under.
pub const RULE_PATHS: &[&str] = &[
    FILES_PATH,
    FILES_BLOCKED,
    FILES_ALLOWED,
    FILES_MAX_FILES,
    FILES_MAX_LINES,
    COMMANDS_BLOCKED,
    COMMANDS_ALLOWED,
    QUALITY_MUST_PASS,
    QUALITY_COVERAGE,
    DEPENDENCIES_WHITELIST,
    DEPENDENCIES_BLACKLIST,
    DEPENDENCIES_APPROVAL,
    COMMITS_FORMAT,
    COMMITS_MAX_SIZE,
    COMMITS_MAX_FILES,
    COMMITS_TRAILER,
    PR_TITLE,
    PR_REQUIRED_SECTIONS,
    PR_REQUIRED_LABELS,
    PR_AUTO_ADD_LABELS,
    PR_REQUIRED_REVIEWERS,
];

/// A bypass path is either a whole category or one rule path.
pub fn is_recognized_path(path: &str) -> bool {
    Category::is_valid(path) || RULE_PATHS.contains(&path)
}

// ---------------------------------------------------------------------------
// PolicyWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyWarning {
    pub path: String,
    pub message: String,
}

impl PolicyWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            "==" => Some(Comparison::Eq),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "==",
        }
    }

    fn holds(self, lhs: u64, rhs: u64) -> bool {
        match self {
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

/// Predicate over a change set used by `auto_add_labels` and `required_reviewers`.
#[derive(Debug, Clone)]
pub enum Condition {
    Always,
    FilesChanged(Comparison, u64),
    LinesChanged(Comparison, u64),
    HasDependencyChange,
    Touches(GlobPattern),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("always"),
            Condition::FilesChanged(op, n) => write!(f, "files_changed {} {n}", op.symbol()),
            Condition::LinesChanged(op, n) => write!(f, "lines_changed {} {n}", op.symbol()),
            Condition::HasDependencyChange => f.write_str("has_dependency_change"),
            Condition::Touches(glob) => write!(f, "touches {}", glob.as_str()),
        }
    }
}

static COMPARISON_RE: OnceLock<Regex> = OnceLock::new();

fn comparison_re() -> &'static Regex {
    COMPARISON_RE.get_or_init(|| {
        Regex::new(r"^(files_changed|lines_changed)\s*(>=|<=|==|>|<)\s*(\d+)$").unwrap()
    })
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, String> {
        let s = source.trim();
        match s {
            "always" => return Ok(Condition::Always),
            "has_dependency_change" => return Ok(Condition::HasDependencyChange),
            _ => {}
        }
        if let Some(glob) = s.strip_prefix("touches ") {
            return GlobPattern::compile(glob.trim())
                .map(Condition::Touches)
                .map_err(|e| e.to_string());
        }
        let caps = comparison_re()
            .captures(s)
            .ok_or_else(|| format!("unrecognized condition '{s}'"))?;
        let op = Comparison::parse(&caps[2]).ok_or_else(|| format!("bad operator in '{s}'"))?;
        let n: u64 = caps[3]
            .parse()
            .map_err(|_| format!("number out of range in '{s}'"))?;
        Ok(match &caps[1] {
            "files_changed" => Condition::FilesChanged(op, n),
            _ => Condition::LinesChanged(op, n),
        })
    }

    pub fn holds(&self, cs: &ChangeSet) -> bool {
        match self {
            Condition::Always => true,
            Condition::FilesChanged(op, n) => op.holds(cs.files_changed() as u64, *n),
            Condition::LinesChanged(op, n) => op.holds(cs.lines_changed(), *n),
            Condition::HasDependencyChange => cs.has_dependency_change(),
            Condition::Touches(glob) => cs.files.iter().any(|f| glob.matches(&f.path)),
        }
    }
}

// ---------------------------------------------------------------------------
// Category rule sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FileRules {
    pub allowed: PatternSet,
    pub blocked: PatternSet,
    pub max_files_per_pr: Option<u32>,
    pub max_lines_per_file: Option<u32>,
}

/// A compiled command regex with the human note attached to it
/// (`description` for allowed entries, `reason` for blocked ones).
#[derive(Debug, Clone)]
pub struct CommandPattern {
    pub pattern: Regex,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    #[default]
    Blacklist,
    Whitelist,
}

#[derive(Debug, Clone, Default)]
pub struct CommandRules {
    pub mode: CommandMode,
    pub allowed: Vec<CommandPattern>,
    pub blocked: Vec<CommandPattern>,
}

#[derive(Debug, Clone, Default)]
pub struct QualityRules {
    pub must_pass: Vec<String>,
    pub min_coverage: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    Whitelist,
    Blacklist,
    ApprovalRequired,
}

#[derive(Debug, Clone)]
pub struct DependencyRules {
    pub mode: DependencyMode,
    /// ecosystem → names; a trailing `*` is a prefix wildcard.
    pub whitelist: BTreeMap<String, Vec<String>>,
    pub blacklist: BTreeMap<String, Vec<String>>,
}

/// Does `name` match any entry listed for `ecosystem`?
pub fn dependency_listed(list: &BTreeMap<String, Vec<String>>, ecosystem: &str, name: &str) -> bool {
    list.get(ecosystem)
        .map(|entries| {
            entries.iter().any(|entry| match entry.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => entry == name,
            })
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct CommitFormat {
    pub pattern: Regex,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommitRules {
    pub format: Option<CommitFormat>,
    /// Maximum total lines changed.
    pub max_size: Option<u32>,
    pub max_files: Option<u32>,
    pub required_trailer: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct LabelRule {
    pub label: String,
    pub condition: Condition,
}

#[derive(Debug, Clone)]
pub struct ReviewerRule {
    pub reviewers: Vec<String>,
    pub condition: Condition,
}

#[derive(Debug, Clone, Default)]
pub struct PullRequestRules {
    pub title_pattern: Option<Regex>,
    pub required_sections: Vec<String>,
    pub required_labels: Vec<String>,
    pub auto_add_labels: Vec<LabelRule>,
    pub required_reviewers: Vec<ReviewerRule>,
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBypass {
    pub label: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    pub bypass_labels: BTreeSet<String>,
    pub partial_bypass: Vec<PartialBypass>,
}

// ---------------------------------------------------------------------------
// PolicyDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AgentLimits {
    pub max_iterations: Option<u32>,
}

/// A fully validated policy. Produced only by [`crate::schema::validate`] and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PolicyDocument {
    pub version: String,
    pub enabled: bool,
    pub agent: AgentLimits,
    pub files: Option<FileRules>,
    pub commands: Option<CommandRules>,
    pub quality: Option<QualityRules>,
    pub dependencies: Option<DependencyRules>,
    pub commits: Option<CommitRules>,
    pub pull_requests: Option<PullRequestRules>,
    pub overrides: Overrides,
}

impl PolicyDocument {
    /// The fallback a caller may choose when a document fails validation:
    /// evaluation passes with no rules applied.
    pub fn disabled() -> Self {
        Self {
            version: SUPPORTED_VERSIONS[0].to_string(),
            enabled: false,
            agent: AgentLimits::default(),
            files: None,
            commands: None,
            quality: None,
            dependencies: None,
            commits: None,
            pull_requests: None,
            overrides: Overrides::default(),
        }
    }

    /// Categories that carry a rule set in this document, in canonical order.
    pub fn configured_categories(&self) -> Vec<Category> {
        Category::all()
            .iter()
            .copied()
            .filter(|c| match c {
                Category::Files => self.files.is_some(),
                Category::Commands => self.commands.is_some(),
                Category::Quality => self.quality.is_some(),
                Category::Dependencies => self.dependencies.is_some(),
                Category::Commits => self.commits.is_some(),
                Category::PullRequests => self.pull_requests.is_some(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::FileChange;

    fn change_set(paths: &[(&str, u32)]) -> ChangeSet {
        ChangeSet {
            files: paths
                .iter()
                .map(|(p, n)| FileChange {
                    path: p.to_string(),
                    lines_changed: *n,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn category_roundtrip() {
        for c in Category::all() {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), *c);
        }
        assert!("styleguide".parse::<Category>().is_err());
    }

    #[test]
    fn recognized_paths() {
        assert!(is_recognized_path("quality"));
        assert!(is_recognized_path("quality.coverage"));
        assert!(is_recognized_path("files.max_files_per_pr"));
        assert!(!is_recognized_path("quality.coverge"));
        assert!(!is_recognized_path("styleguide"));
    }

    #[test]
    fn condition_parsing() {
        assert!(matches!(
            Condition::parse("files_changed > 10").unwrap(),
            Condition::FilesChanged(Comparison::Gt, 10)
        ));
        assert!(matches!(
            Condition::parse("lines_changed>=500").unwrap(),
            Condition::LinesChanged(Comparison::Ge, 500)
        ));
        assert!(matches!(
            Condition::parse("has_dependency_change").unwrap(),
            Condition::HasDependencyChange
        ));
        assert!(matches!(
            Condition::parse("touches src/auth/**").unwrap(),
            Condition::Touches(_)
        ));
        assert!(Condition::parse("files_changed ~ 3").is_err());
        assert!(Condition::parse("moon_phase == 2").is_err());
    }

    #[test]
    fn condition_evaluation() {
        let cs = change_set(&[("src/auth/login.rs", 40), ("package.json", 2)]);
        assert!(Condition::parse("files_changed == 2").unwrap().holds(&cs));
        assert!(!Condition::parse("files_changed > 2").unwrap().holds(&cs));
        assert!(Condition::parse("lines_changed < 50").unwrap().holds(&cs));
        assert!(Condition::parse("has_dependency_change").unwrap().holds(&cs));
        assert!(Condition::parse("touches src/auth/**").unwrap().holds(&cs));
        assert!(!Condition::parse("touches docs/**").unwrap().holds(&cs));
    }

    #[test]
    fn condition_display_roundtrips() {
        for src in ["always", "files_changed > 10", "lines_changed <= 5", "touches src/**"] {
            assert_eq!(Condition::parse(src).unwrap().to_string(), src);
        }
    }

    #[test]
    fn dependency_wildcards() {
        let mut list = BTreeMap::new();
        list.insert(
            "npm".to_string(),
            vec!["@types/*".to_string(), "lodash".to_string()],
        );
        assert!(dependency_listed(&list, "npm", "@types/node"));
        assert!(dependency_listed(&list, "npm", "lodash"));
        assert!(!dependency_listed(&list, "npm", "lodash-es"));
        assert!(!dependency_listed(&list, "cargo", "lodash"));
    }
}
