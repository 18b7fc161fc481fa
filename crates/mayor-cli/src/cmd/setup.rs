use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use mayor_core::{
    io,
    options::{MergeStrategy, SetupOptions},
    policy::Category,
    reconcile::{self, SetupMode},
};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct SetupArgs {
    /// Which files to generate: full, minimal, or custom
    #[arg(long, default_value = "full")]
    pub mode: String,

    /// Catalog entry to generate in custom mode (id or path, repeatable)
    #[arg(long = "file", value_name = "ID|PATH")]
    pub files: Vec<String>,

    /// Replace existing files whose content differs
    #[arg(long)]
    pub overwrite: bool,

    /// Print the plan without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Setup options file (default: .mayor/setup.yml when present)
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// Iteration limit passed to the agent
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Merge strategy for auto-merge: squash, merge, or rebase
    #[arg(long)]
    pub merge_strategy: Option<String>,

    /// Policy categories to include in the generated policy (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,
}

/// Options from `--options` or `.mayor/setup.yml`, with flag overrides applied.
pub fn resolve_options(root: &Path, args: &SetupArgs) -> anyhow::Result<SetupOptions> {
    let mut opts = match &args.options {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read options file {}", path.display()))?;
            SetupOptions::from_yaml(&data)
                .with_context(|| format!("invalid options file {}", path.display()))?
        }
        None => io::load_setup_options(root).context("failed to load setup options")?,
    };
    if let Some(n) = args.max_iterations {
        opts.max_iterations = n;
    }
    if let Some(s) = &args.merge_strategy {
        opts.merge_strategy = s.parse::<MergeStrategy>()?;
    }
    if let Some(list) = &args.categories {
        opts.policy_categories = list
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.parse::<Category>())
            .collect::<Result<_, _>>()?;
    }
    Ok(opts)
}

pub fn run(root: &Path, args: SetupArgs, json: bool) -> anyhow::Result<()> {
    let mode: SetupMode = args.mode.parse()?;
    if mode != SetupMode::Custom && !args.files.is_empty() {
        anyhow::bail!("--file requires --mode custom");
    }
    let opts = resolve_options(root, &args)?;

    let snapshot = io::snapshot(root).context("failed to read repository files")?;
    let plan = reconcile::plan(mode, args.files.as_slice(), &snapshot, &opts, args.overwrite)?;

    let written = if args.dry_run {
        Vec::new()
    } else {
        io::apply_plan(root, &plan).context("failed to write setup files")?
    };

    if json {
        let value = serde_json::json!({
            "mode": plan.mode,
            "dry_run": args.dry_run,
            "actions": plan.actions,
            "written": written.len(),
        });
        return print_json(&value);
    }

    let rows = plan
        .actions
        .iter()
        .map(|a| vec![a.action.to_string(), a.path.clone(), a.reason.clone()])
        .collect();
    print_table(&["ACTION", "PATH", "REASON"], rows);
    let pending = plan.writes().count();
    if args.dry_run {
        println!("\nDry run: {pending} file(s) would be written.");
    } else if plan.is_clean() {
        println!("\nNothing to do.");
    } else {
        println!("\nWrote {} file(s).", written.len());
    }
    Ok(())
}
