use crate::error::{SchemaError, SchemaErrors};
use crate::pattern::{GlobPattern, PatternSet};
use crate::policy::{
    is_recognized_path, AgentLimits, Category, CommandMode, CommandPattern, CommandRules,
    CommitFormat, CommitRules, Condition, DependencyMode, DependencyRules, FileRules, LabelRule,
    Overrides, PartialBypass, PolicyDocument, PolicyWarning, PullRequestRules, QualityRules,
    ReviewerRule, SUPPORTED_VERSIONS,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

pub const MAX_FILES_BOUNDS: (i64, i64) = (1, 1000);
pub const MAX_LINES_BOUNDS: (i64, i64) = (1, 100_000);
pub const COVERAGE_BOUNDS: (i64, i64) = (1, 100);
pub const ITERATION_BOUNDS: (i64, i64) = (1, 50);

// ---------------------------------------------------------------------------
// Known keys
// ---------------------------------------------------------------------------

const TOP_KEYS: &[&str] = &["version", "enabled", "agent", "policies", "overrides"];
const AGENT_KEYS: &[&str] = &["max_iterations"];
const FILES_KEYS: &[&str] = &[
    "allowed_patterns",
    "blocked_patterns",
    "max_files_per_pr",
    "max_lines_per_file",
];
const COMMANDS_KEYS: &[&str] = &["mode", "allowed", "blocked"];
const COMMAND_ENTRY_KEYS: &[&str] = &["pattern", "description", "reason"];
const QUALITY_KEYS: &[&str] = &["must_pass", "min_coverage"];
const DEPENDENCIES_KEYS: &[&str] = &["mode", "whitelist", "blacklist"];
const COMMITS_KEYS: &[&str] = &["format", "max_size", "max_files", "required_trailer"];
const COMMIT_FORMAT_KEYS: &[&str] = &["pattern", "description"];
const PULL_REQUESTS_KEYS: &[&str] = &[
    "title_pattern",
    "required_sections",
    "required_labels",
    "auto_add_labels",
    "required_reviewers",
];
const LABEL_RULE_KEYS: &[&str] = &["label", "condition"];
const REVIEWER_RULE_KEYS: &[&str] = &["reviewers", "condition"];
const OVERRIDES_KEYS: &[&str] = &["bypass_labels", "partial_bypass"];
const PARTIAL_BYPASS_KEYS: &[&str] = &["label", "bypass"];

// ---------------------------------------------------------------------------
// Raw entry shapes
// ---------------------------------------------------------------------------

// Sections are read field by field (see `Validator::field`) so a type error is
// reported at its own path. Only list entries are deserialized whole.

#[derive(Debug, Deserialize)]
struct RawCommandEntry {
    pattern: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommitFormat {
    pattern: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLabelRule {
    label: String,
    condition: String,
}

#[derive(Debug, Deserialize)]
struct RawReviewerRule {
    reviewers: Vec<String>,
    condition: String,
}

#[derive(Debug, Deserialize)]
struct RawPartialBypass {
    label: String,
    #[serde(default)]
    bypass: Vec<String>,
}

// ---------------------------------------------------------------------------
// ValidatedPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidatedPolicy {
    pub policy: PolicyDocument,
    pub warnings: Vec<PolicyWarning>,
}

/// Parse and validate a policy document.
///
/// Either the whole document validates or every error found is returned; a
/// malformed document is never partially applied. An unsupported `version` stops
/// validation immediately, since the rest of the document cannot be interpreted.
pub fn validate(raw: &str) -> Result<ValidatedPolicy, SchemaErrors> {
    let value: Value = serde_yaml::from_str(raw)
        .map_err(|e| SchemaErrors(vec![SchemaError::new("", format!("unparseable document: {e}"))]))?;
    validate_value(&value)
}

pub fn validate_value(value: &Value) -> Result<ValidatedPolicy, SchemaErrors> {
    let mut v = Validator::default();

    let Some(top) = value.as_mapping() else {
        v.error("", "policy document must be a mapping");
        return Err(v.finish_err());
    };

    // required keys and a supported version
    let version = match top.get("version") {
        None => {
            v.error("version", "required key is missing");
            None
        }
        Some(raw) => match version_string(raw) {
            Some(s) if SUPPORTED_VERSIONS.contains(&s.as_str()) => Some(s),
            Some(s) => {
                v.error(
                    "version",
                    format!(
                        "unsupported schema version '{s}' (supported: {})",
                        SUPPORTED_VERSIONS.join(", ")
                    ),
                );
                None
            }
            None => {
                v.error("version", "must be a string such as \"1.0\"");
                None
            }
        },
    };
    let enabled = match top.get("enabled") {
        None => {
            v.error("enabled", "required key is missing");
            None
        }
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            v.error("enabled", "must be a boolean");
            None
        }
    };
    let Some(version) = version else {
        return Err(v.finish_err());
    };

    // unknown keys anywhere in the tree
    v.check_keys(value, "", TOP_KEYS);
    v.check_section(top.get("agent"), "agent", AGENT_KEYS);
    if let Some(policies) = top.get("policies") {
        v.check_policies(policies);
    }
    if let Some(overrides) = top.get("overrides") {
        v.check_keys(overrides, "overrides", OVERRIDES_KEYS);
        v.check_entries(
            overrides.get("partial_bypass"),
            "overrides.partial_bypass",
            PARTIAL_BYPASS_KEYS,
        );
    }

    // compile patterns, check bounds and overrides
    let max_iterations = match v.section(top.get("agent"), "agent") {
        Some(agent) => {
            let n = v.field(agent, "agent", "max_iterations");
            v.bounded("agent.max_iterations", n, ITERATION_BOUNDS)
        }
        None => None,
    };
    let agent = AgentLimits { max_iterations };

    let policies = v.section(top.get("policies"), "policies");
    let category = |name: &'static str| policies.and_then(|p| p.get(name));
    let files = v.section(category("files"), "policies.files").map(|s| v.files(s));
    let commands = v
        .section(category("commands"), "policies.commands")
        .map(|s| v.commands(s));
    let quality = v
        .section(category("quality"), "policies.quality")
        .map(|s| v.quality(s));
    let dependencies = v
        .section(category("dependencies"), "policies.dependencies")
        .and_then(|s| v.dependencies(s));
    let commits = v
        .section(category("commits"), "policies.commits")
        .map(|s| v.commits(s));
    let pull_requests = v
        .section(category("pull_requests"), "policies.pull_requests")
        .map(|s| v.pull_requests(s));
    let overrides = match v.section(top.get("overrides"), "overrides") {
        Some(s) => v.overrides(s),
        None => Overrides::default(),
    };

    if !v.errors.is_empty() {
        return Err(v.finish_err());
    }
    let Some(enabled) = enabled else {
        return Err(v.finish_err());
    };

    let policy = PolicyDocument {
        version,
        enabled,
        agent,
        files,
        commands,
        quality,
        dependencies,
        commits,
        pull_requests,
        overrides,
    };
    tracing::debug!(
        categories = policy.configured_categories().len(),
        warnings = v.warnings.len(),
        "policy validated"
    );
    Ok(ValidatedPolicy {
        policy,
        warnings: v.warnings,
    })
}

fn version_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => match n.as_u64() {
            Some(i) => Some(format!("{i}.0")),
            None => n.as_f64().map(|f| format!("{f:?}")),
        },
        _ => None,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Validator {
    errors: Vec<SchemaError>,
    warnings: Vec<PolicyWarning>,
}

impl Validator {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(SchemaError::new(path, message));
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(PolicyWarning::new(path, message));
    }

    fn finish_err(self) -> SchemaErrors {
        SchemaErrors(self.errors)
    }

    // -- unknown keys --------------------------------------------------------

    fn check_keys(&mut self, value: &Value, path: &str, known: &[&str]) {
        let Some(map) = value.as_mapping() else {
            return;
        };
        for key in map.keys() {
            match key.as_str() {
                Some(k) if known.contains(&k) => {}
                Some(k) => self.error(join(path, k), format!("unknown key '{k}'")),
                None => self.error(path, format!("non-string key {key:?}")),
            }
        }
    }

    fn check_section(&mut self, value: Option<&Value>, path: &str, known: &[&str]) {
        if let Some(value) = value {
            self.check_keys(value, path, known);
        }
    }

    fn check_entries(&mut self, value: Option<&Value>, path: &str, known: &[&str]) {
        let Some(Value::Sequence(entries)) = value else {
            return;
        };
        for (i, entry) in entries.iter().enumerate() {
            self.check_keys(entry, &format!("{path}[{i}]"), known);
        }
    }

    fn check_policies(&mut self, policies: &Value) {
        let Some(map) = policies.as_mapping() else {
            return;
        };
        for (key, section) in map {
            let Some(name) = key.as_str() else {
                self.error("policies", format!("non-string key {key:?}"));
                continue;
            };
            let path = join("policies", name);
            let Ok(category) = name.parse::<Category>() else {
                self.error(path, format!("unknown policy category '{name}'"));
                continue;
            };
            match category {
                Category::Files => self.check_keys(section, &path, FILES_KEYS),
                Category::Commands => {
                    self.check_keys(section, &path, COMMANDS_KEYS);
                    for list in ["allowed", "blocked"] {
                        self.check_entries(
                            section.get(list),
                            &join(&path, list),
                            COMMAND_ENTRY_KEYS,
                        );
                    }
                }
                Category::Quality => self.check_keys(section, &path, QUALITY_KEYS),
                Category::Dependencies => self.check_keys(section, &path, DEPENDENCIES_KEYS),
                Category::Commits => {
                    self.check_keys(section, &path, COMMITS_KEYS);
                    self.check_section(
                        section.get("format"),
                        &join(&path, "format"),
                        COMMIT_FORMAT_KEYS,
                    );
                }
                Category::PullRequests => {
                    self.check_keys(section, &path, PULL_REQUESTS_KEYS);
                    self.check_entries(
                        section.get("auto_add_labels"),
                        &join(&path, "auto_add_labels"),
                        LABEL_RULE_KEYS,
                    );
                    self.check_entries(
                        section.get("required_reviewers"),
                        &join(&path, "required_reviewers"),
                        REVIEWER_RULE_KEYS,
                    );
                }
            }
        }
    }

    // -- located extraction --------------------------------------------------

    /// A present, non-null section. Anything other than a mapping is an error.
    fn section<'v>(&mut self, value: Option<&'v Value>, path: &str) -> Option<&'v Value> {
        match value {
            None | Some(Value::Null) => None,
            Some(section @ Value::Mapping(_)) => Some(section),
            Some(_) => {
                self.error(path, "must be a mapping");
                None
            }
        }
    }

    /// Deserialize one key of a section; a type error is recorded at `path.key`
    /// and the default is returned so validation can continue.
    fn field<T: DeserializeOwned + Default>(&mut self, section: &Value, path: &str, key: &str) -> T {
        match section.get(key) {
            None | Some(Value::Null) => T::default(),
            Some(value) => match serde_yaml::from_value(value.clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.error(join(path, key), e.to_string());
                    T::default()
                }
            },
        }
    }

    /// Deserialize each entry of a list, keeping its index for error paths.
    fn entries<T: DeserializeOwned>(&mut self, section: &Value, path: &str, key: &str) -> Vec<(usize, T)> {
        let path = join(path, key);
        match section.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match serde_yaml::from_value(item.clone()) {
                    Ok(entry) => Some((i, entry)),
                    Err(e) => {
                        self.error(format!("{path}[{i}]"), e.to_string());
                        None
                    }
                })
                .collect(),
            Some(_) => {
                self.error(path, "must be a list");
                Vec::new()
            }
        }
    }

    // -- compilation helpers -------------------------------------------------

    fn regex(&mut self, path: &str, source: &str) -> Option<Regex> {
        match Regex::new(source) {
            Ok(re) => Some(re),
            Err(e) => {
                self.error(path, format!("invalid regex: {e}"));
                None
            }
        }
    }

    fn globs(&mut self, path: &str, sources: &[String]) -> PatternSet {
        sources
            .iter()
            .enumerate()
            .filter_map(|(i, src)| match GlobPattern::compile(src) {
                Ok(glob) => Some(glob),
                Err(e) => {
                    self.error(format!("{path}[{i}]"), e.to_string());
                    None
                }
            })
            .collect()
    }

    fn condition(&mut self, path: &str, source: &str) -> Option<Condition> {
        match Condition::parse(source) {
            Ok(c) => Some(c),
            Err(e) => {
                self.error(path, e);
                None
            }
        }
    }

    fn bounded(&mut self, path: &str, value: Option<i64>, (lo, hi): (i64, i64)) -> Option<u32> {
        let n = value?;
        if n < lo || n > hi {
            self.error(path, format!("must be between {lo} and {hi}, got {n}"));
            return None;
        }
        u32::try_from(n).ok()
    }

    fn non_empty_strings(&mut self, path: &str, values: &[String]) {
        for (i, s) in values.iter().enumerate() {
            if s.trim().is_empty() {
                self.error(format!("{path}[{i}]"), "must be a non-empty string");
            }
        }
    }

    // -- categories ----------------------------------------------------------

    fn files(&mut self, section: &Value) -> FileRules {
        let base = "policies.files";
        let allowed: Vec<String> = self.field(section, base, "allowed_patterns");
        let blocked: Vec<String> = self.field(section, base, "blocked_patterns");
        let max_files = self.field(section, base, "max_files_per_pr");
        let max_lines = self.field(section, base, "max_lines_per_file");
        FileRules {
            allowed: self.globs(&join(base, "allowed_patterns"), &allowed),
            blocked: self.globs(&join(base, "blocked_patterns"), &blocked),
            max_files_per_pr: self.bounded(&join(base, "max_files_per_pr"), max_files, MAX_FILES_BOUNDS),
            max_lines_per_file: self.bounded(&join(base, "max_lines_per_file"), max_lines, MAX_LINES_BOUNDS),
        }
    }

    fn command_list(&mut self, section: &Value, key: &str, blocked: bool) -> Vec<CommandPattern> {
        let path = join("policies.commands", key);
        let entries: Vec<(usize, RawCommandEntry)> = self.entries(section, "policies.commands", key);
        entries
            .into_iter()
            .filter_map(|(i, entry)| {
                let pattern = self.regex(&format!("{path}[{i}].pattern"), &entry.pattern)?;
                let note = if blocked {
                    entry.reason.or(entry.description)
                } else {
                    entry.description.or(entry.reason)
                };
                Some(CommandPattern {
                    pattern,
                    note: note.unwrap_or_default(),
                })
            })
            .collect()
    }

    fn commands(&mut self, section: &Value) -> CommandRules {
        let base = "policies.commands";
        let mode: CommandMode = self.field(section, base, "mode");
        let allowed = self.command_list(section, "allowed", false);
        let blocked = self.command_list(section, "blocked", true);
        if mode == CommandMode::Whitelist && allowed.is_empty() {
            self.warn(
                join(base, "mode"),
                "whitelist mode with no allowed commands rejects every command",
            );
        }
        CommandRules {
            mode,
            allowed,
            blocked,
        }
    }

    fn quality(&mut self, section: &Value) -> QualityRules {
        let base = "policies.quality";
        let must_pass: Vec<String> = self.field(section, base, "must_pass");
        let min_coverage = self.field(section, base, "min_coverage");
        self.non_empty_strings(&join(base, "must_pass"), &must_pass);
        QualityRules {
            must_pass,
            min_coverage: self.bounded(&join(base, "min_coverage"), min_coverage, COVERAGE_BOUNDS),
        }
    }

    fn dependencies(&mut self, section: &Value) -> Option<DependencyRules> {
        let base = "policies.dependencies";
        let mode: Option<DependencyMode> = self.field(section, base, "mode");
        let whitelist: BTreeMap<String, Vec<String>> = self.field(section, base, "whitelist");
        let blacklist: BTreeMap<String, Vec<String>> = self.field(section, base, "blacklist");
        for (list_name, list) in [("whitelist", &whitelist), ("blacklist", &blacklist)] {
            for (ecosystem, names) in list {
                self.non_empty_strings(&format!("{base}.{list_name}.{ecosystem}"), names);
            }
        }
        let Some(mode) = mode else {
            if section.get("mode").map_or(true, Value::is_null) {
                self.error(join(base, "mode"), "required key is missing");
            }
            return None;
        };
        if mode == DependencyMode::Whitelist && whitelist.is_empty() {
            self.warn(
                join(base, "mode"),
                "whitelist mode with an empty whitelist rejects every added dependency",
            );
        }
        Some(DependencyRules {
            mode,
            whitelist,
            blacklist,
        })
    }

    fn commits(&mut self, section: &Value) -> CommitRules {
        let base = "policies.commits";
        let format: Option<RawCommitFormat> = self.field(section, base, "format");
        let format = format.and_then(|f| {
            let pattern = self.regex(&join(base, "format.pattern"), &f.pattern)?;
            Some(CommitFormat {
                pattern,
                description: f.description,
            })
        });
        let required_trailer: Option<String> = self.field(section, base, "required_trailer");
        let required_trailer = required_trailer.and_then(|t| self.regex(&join(base, "required_trailer"), &t));
        let max_size = self.field(section, base, "max_size");
        let max_files = self.field(section, base, "max_files");
        CommitRules {
            format,
            max_size: self.bounded(&join(base, "max_size"), max_size, MAX_LINES_BOUNDS),
            max_files: self.bounded(&join(base, "max_files"), max_files, MAX_FILES_BOUNDS),
            required_trailer,
        }
    }

    fn pull_requests(&mut self, section: &Value) -> PullRequestRules {
        let base = "policies.pull_requests";
        let title_pattern: Option<String> = self.field(section, base, "title_pattern");
        let title_pattern = title_pattern.and_then(|t| self.regex(&join(base, "title_pattern"), &t));
        let required_sections: Vec<String> = self.field(section, base, "required_sections");
        let required_labels: Vec<String> = self.field(section, base, "required_labels");
        self.non_empty_strings(&join(base, "required_sections"), &required_sections);
        self.non_empty_strings(&join(base, "required_labels"), &required_labels);

        let mut auto_add_labels = Vec::new();
        let rules: Vec<(usize, RawLabelRule)> = self.entries(section, base, "auto_add_labels");
        for (i, rule) in rules {
            let path = format!("{base}.auto_add_labels[{i}]");
            if rule.label.trim().is_empty() {
                self.error(join(&path, "label"), "must be a non-empty string");
            }
            if let Some(condition) = self.condition(&join(&path, "condition"), &rule.condition) {
                auto_add_labels.push(LabelRule {
                    label: rule.label,
                    condition,
                });
            }
        }

        let mut required_reviewers = Vec::new();
        let rules: Vec<(usize, RawReviewerRule)> = self.entries(section, base, "required_reviewers");
        for (i, rule) in rules {
            let path = format!("{base}.required_reviewers[{i}]");
            if rule.reviewers.is_empty() {
                self.error(join(&path, "reviewers"), "must list at least one reviewer");
            }
            self.non_empty_strings(&join(&path, "reviewers"), &rule.reviewers);
            if let Some(condition) = self.condition(&join(&path, "condition"), &rule.condition) {
                required_reviewers.push(ReviewerRule {
                    reviewers: rule.reviewers,
                    condition,
                });
            }
        }

        PullRequestRules {
            title_pattern,
            required_sections,
            required_labels,
            auto_add_labels,
            required_reviewers,
        }
    }

    fn overrides(&mut self, section: &Value) -> Overrides {
        let labels: Vec<String> = self.field(section, "overrides", "bypass_labels");
        let mut bypass_labels = BTreeSet::new();
        for (i, label) in labels.iter().enumerate() {
            let path = format!("overrides.bypass_labels[{i}]");
            if label.trim().is_empty() {
                self.error(path, "label must be a non-empty string");
            } else if !bypass_labels.insert(label.clone()) {
                self.warn(path, format!("duplicate bypass label '{label}'"));
            }
        }

        let mut seen_partial = BTreeSet::new();
        let mut partial_bypass = Vec::new();
        let entries: Vec<(usize, RawPartialBypass)> = self.entries(section, "overrides", "partial_bypass");
        for (i, entry) in entries {
            let path = format!("overrides.partial_bypass[{i}]");
            if entry.label.trim().is_empty() {
                self.error(join(&path, "label"), "label must be a non-empty string");
                continue;
            }
            if bypass_labels.contains(&entry.label) {
                self.warn(
                    join(&path, "label"),
                    format!(
                        "label '{}' is also a global bypass label; global bypass wins",
                        entry.label
                    ),
                );
            }
            if !seen_partial.insert(entry.label.clone()) {
                self.warn(
                    join(&path, "label"),
                    format!("duplicate partial bypass label '{}'", entry.label),
                );
            }
            if entry.bypass.is_empty() {
                self.warn(join(&path, "bypass"), "entry bypasses nothing");
            }
            for (j, target) in entry.bypass.iter().enumerate() {
                if !is_recognized_path(target) {
                    self.warn(
                        format!("{path}.bypass[{j}]"),
                        format!("unrecognized bypass path '{target}'; it will not bypass anything"),
                    );
                }
            }
            partial_bypass.push(PartialBypass {
                label: entry.label,
                paths: entry.bypass,
            });
        }

        Overrides {
            bypass_labels,
            partial_bypass,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
