use crate::output::{print_json, print_table};
use anyhow::Context;
use mayor_core::{
    changeset::ChangeSet,
    evaluator, io, paths,
    reconcile::{self, SetupMode},
    report::{self, Scorecard},
    schema::{self, ValidatedPolicy},
};
use std::path::Path;

pub fn run(
    root: &Path,
    mode: &str,
    files: &[String],
    changes: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let mode: SetupMode = mode.parse()?;
    let opts = io::load_setup_options(root).context("failed to load setup options")?;
    let snapshot = io::snapshot(root).context("failed to read repository files")?;
    let plan = reconcile::plan(mode, files, &snapshot, &opts, false)?;

    let policy_path = paths::policy_path(root);
    let policy = if policy_path.exists() {
        let raw = std::fs::read_to_string(&policy_path)
            .with_context(|| format!("failed to read {}", policy_path.display()))?;
        Some(schema::validate(&raw))
    } else {
        None
    };

    let mut verdicts = Vec::new();
    if let Some(changes_path) = changes {
        let Some(Ok(validated)) = &policy else {
            anyhow::bail!(
                "cannot evaluate {}: {} is missing or invalid",
                changes_path.display(),
                paths::POLICY_FILE
            );
        };
        verdicts.push(evaluate_file(changes_path, validated)?);
    }

    let mut card = report::report(Some(&plan), &verdicts);
    if let Some(result) = &policy {
        let detail = match result {
            Ok(_) => String::new(),
            Err(errors) => errors.to_string(),
        };
        card.record(format!("schema:{}", paths::POLICY_FILE), result.is_ok(), detail);
    }

    if json {
        print_json(&card)?;
    } else {
        print_scorecard(&card);
    }

    if !card.passed() {
        anyhow::bail!(
            "verification failed: {} of {} checks failed",
            card.failed_checks.len(),
            card.expected_checks
        );
    }
    Ok(())
}

fn evaluate_file(
    path: &Path,
    validated: &ValidatedPolicy,
) -> anyhow::Result<(String, evaluator::Verdict)> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read change set {}", path.display()))?;
    let cs = ChangeSet::from_yaml(&data)
        .with_context(|| format!("invalid change set {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "changes".to_string());
    Ok((name, evaluator::evaluate(&cs, &validated.policy)))
}

fn print_scorecard(card: &Scorecard) {
    println!(
        "Score: {}/{} checks passed",
        card.passed_checks, card.expected_checks
    );
    if card.failed_checks.is_empty() {
        return;
    }
    println!();
    let rows = card
        .failed_checks
        .iter()
        .map(|f| vec![f.name.clone(), f.detail.replace('\n', " ")])
        .collect();
    print_table(&["CHECK", "DETAIL"], rows);
}
