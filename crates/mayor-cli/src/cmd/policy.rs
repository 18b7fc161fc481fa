use crate::output::{print_json, print_verdict, print_warnings};
use anyhow::Context;
use clap::Subcommand;
use mayor_core::{
    changeset::{ChangeSet, FileChange, PullRequest},
    evaluator::{self, Verdict},
    paths,
    schema::{self, ValidatedPolicy},
};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PolicySubcommand {
    /// Check the policy file against the schema
    Validate {
        /// Policy file (default: .mayor/policy.yml)
        #[arg(long, value_name = "FILE")]
        policy: Option<PathBuf>,
    },

    /// Evaluate a change set file; exits non-zero on any violation
    Test {
        /// Change set (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        changes: PathBuf,

        /// Policy file (default: .mayor/policy.yml)
        #[arg(long, value_name = "FILE")]
        policy: Option<PathBuf>,
    },

    /// Evaluate a change set described on the command line; never fails on violations
    DryRun {
        /// Changed file path (repeatable)
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<String>,

        /// Command the agent ran (repeatable)
        #[arg(long = "command", value_name = "CMD")]
        commands: Vec<String>,

        #[arg(long)]
        commit_message: Option<String>,

        /// Pull request title
        #[arg(long)]
        title: Option<String>,

        /// Pull request description
        #[arg(long)]
        description: Option<String>,

        /// Pull request label (repeatable)
        #[arg(long = "label", value_name = "LABEL")]
        labels: Vec<String>,

        /// Policy file (default: .mayor/policy.yml)
        #[arg(long, value_name = "FILE")]
        policy: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: PolicySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PolicySubcommand::Validate { policy } => validate(root, policy.as_deref(), json),
        PolicySubcommand::Test { changes, policy } => test(root, &changes, policy.as_deref(), json),
        PolicySubcommand::DryRun {
            paths,
            commands,
            commit_message,
            title,
            description,
            labels,
            policy,
        } => {
            let cs = ChangeSet {
                files: paths
                    .into_iter()
                    .map(|path| FileChange {
                        path,
                        lines_changed: 0,
                    })
                    .collect(),
                commands,
                commit_message: commit_message.unwrap_or_default(),
                pr: PullRequest {
                    title: title.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    labels: labels.into_iter().collect(),
                    ..Default::default()
                },
                ..Default::default()
            };
            dry_run(root, &cs, policy.as_deref(), json)
        }
    }
}

fn policy_file(root: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::policy_path(root))
}

fn load(root: &Path, explicit: Option<&Path>) -> anyhow::Result<ValidatedPolicy> {
    let path = policy_file(root, explicit);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read policy {}", path.display()))?;
    let validated = schema::validate(&raw)
        .with_context(|| format!("policy {} is invalid", path.display()))?;
    Ok(validated)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path = policy_file(root, explicit);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read policy {}", path.display()))?;
    let result = schema::validate(&raw);

    if json {
        let value = match &result {
            Ok(v) => serde_json::json!({
                "valid": true,
                "categories": v.policy.configured_categories(),
                "errors": [],
                "warnings": v.warnings,
            }),
            Err(errors) => serde_json::json!({
                "valid": false,
                "categories": [],
                "errors": errors.0,
                "warnings": [],
            }),
        };
        print_json(&value)?;
    } else {
        match &result {
            Ok(v) => {
                let categories: Vec<&str> = v
                    .policy
                    .configured_categories()
                    .iter()
                    .map(|c| c.as_str())
                    .collect();
                println!("Policy is valid.");
                if !v.policy.enabled {
                    println!("Policy is disabled; every change set passes.");
                }
                if categories.is_empty() {
                    println!("Categories: (none)");
                } else {
                    println!("Categories: {}", categories.join(", "));
                }
                print_warnings(&v.warnings);
            }
            Err(errors) => {
                for e in errors.iter() {
                    println!("[error] {e}");
                }
            }
        }
    }

    if let Err(errors) = result {
        anyhow::bail!("policy validation found {} error(s)", errors.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// test / dry-run
// ---------------------------------------------------------------------------

fn test(root: &Path, changes: &Path, explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let validated = load(root, explicit)?;
    let data = std::fs::read_to_string(changes)
        .with_context(|| format!("failed to read change set {}", changes.display()))?;
    let cs = ChangeSet::from_yaml(&data)
        .with_context(|| format!("invalid change set {}", changes.display()))?;

    let verdict = evaluator::evaluate(&cs, &validated.policy);
    show(&verdict, json)?;
    if !verdict.passed {
        anyhow::bail!("{} policy violation(s)", verdict.violations.len());
    }
    Ok(())
}

fn dry_run(root: &Path, cs: &ChangeSet, explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let validated = load(root, explicit)?;
    let verdict = evaluator::evaluate(cs, &validated.policy);
    tracing::debug!(passed = verdict.passed, "dry run evaluated");
    show(&verdict, json)
}

fn show(verdict: &Verdict, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(verdict)
    } else {
        print_verdict(verdict);
        Ok(())
    }
}
