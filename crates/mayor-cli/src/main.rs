mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{policy::PolicySubcommand, setup::SetupArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mayor",
    about = "Set up a repository for autonomous coding agents and check their changes against policy",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .mayor/ or .git/)
    #[arg(long, global = true, env = "MAYOR_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate agent workflows, instructions, and policy files
    Setup(SetupArgs),

    /// Score the repository: catalog files, policy schema, and optionally a change set
    Verify {
        /// Which catalog entries are expected: full, minimal, or custom
        #[arg(long, default_value = "full")]
        mode: String,

        /// Catalog entries expected in custom mode (id or path, repeatable)
        #[arg(long = "file", value_name = "ID|PATH")]
        files: Vec<String>,

        /// Change set (YAML or JSON) to evaluate against the policy
        #[arg(long, value_name = "FILE")]
        changes: Option<PathBuf>,
    },

    /// Show which catalog files exist
    Status,

    /// Validate and exercise the policy
    Policy {
        #[command(subcommand)]
        subcommand: PolicySubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Setup(args) => cmd::setup::run(&root, args, cli.json),
        Commands::Verify {
            mode,
            files,
            changes,
        } => cmd::verify::run(&root, &mode, &files, changes.as_deref(), cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Policy { subcommand } => cmd::policy::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
