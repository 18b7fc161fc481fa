use crate::options::SetupOptions;
use crate::policy::Category;

/// Substitute `{{key}}` placeholders. Keys not listed are left untouched, so
/// GitHub expressions such as `${{ github.token }}` pass through.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

fn vars(opts: &SetupOptions) -> Vec<(&'static str, String)> {
    vec![
        ("project_name", opts.project_name.clone()),
        ("max_iterations", opts.max_iterations.to_string()),
        ("merge_strategy", opts.merge_strategy.as_str().to_string()),
        ("agent_label", opts.agent_label.clone()),
        ("base_branch", opts.base_branch.clone()),
        ("schedule", opts.schedule.clone()),
        ("policy_file", crate::paths::POLICY_FILE.to_string()),
    ]
}

fn render_with(template: &str, opts: &SetupOptions) -> String {
    let owned = vars(opts);
    let borrowed: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
    render(template, &borrowed)
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

pub fn vscode_settings(opts: &SetupOptions) -> String {
    let value = serde_json::json!({
        "chat.agent.maxRequests": opts.max_iterations,
        "files.associations": {
            ".mayor/*.yml": "yaml",
        },
        "git.branchProtection": [opts.base_branch],
        "github.copilot.chat.codeGeneration.useInstructionFiles": true,
    });
    // serde_json's default map is sorted, so output is stable.
    let mut out = serde_json::to_string_pretty(&value).unwrap_or_default();
    out.push('\n');
    out
}

pub fn agent_instructions(opts: &SetupOptions) -> String {
    render_with(AGENTS_MD_TEMPLATE, opts)
}

pub fn auto_merge_workflow(opts: &SetupOptions) -> String {
    render_with(AUTO_MERGE_TEMPLATE, opts)
}

pub fn orchestrator_workflow(opts: &SetupOptions) -> String {
    render_with(ORCHESTRATOR_TEMPLATE, opts)
}

pub fn issue_template(opts: &SetupOptions) -> String {
    render_with(ISSUE_TEMPLATE, opts)
}

/// The starter policy, containing a section for each selected category.
pub fn policy_file(opts: &SetupOptions) -> String {
    let mut out = render_with(POLICY_HEADER, opts);
    let categories = opts.categories();
    if categories.is_empty() {
        out.push_str("policies: {}\n");
    } else {
        out.push_str("policies:\n");
        for category in categories {
            let section = match category {
                Category::Files => POLICY_FILES,
                Category::Commands => POLICY_COMMANDS,
                Category::Quality => POLICY_QUALITY,
                Category::Dependencies => POLICY_DEPENDENCIES,
                Category::Commits => POLICY_COMMITS,
                Category::PullRequests => POLICY_PULL_REQUESTS,
            };
            out.push_str(&render_with(section, opts));
        }
    }
    out.push_str(POLICY_OVERRIDES);
    out
}

// ---------------------------------------------------------------------------
// Static file content
// ---------------------------------------------------------------------------

const AGENTS_MD_TEMPLATE: &str = r#"# Agent instructions: {{project_name}}

This repository is worked on by an autonomous coding agent. Tasks arrive as
issues labeled `{{agent_label}}`; the orchestrator workflow assigns them one at a
time.

## Working a task

1. Read the issue completely, including acceptance criteria.
2. Create a branch from `{{base_branch}}`.
3. Make the smallest change that satisfies the acceptance criteria.
4. Run the project's tests and linters before opening a pull request.
5. Stop after {{max_iterations}} attempts at the same failure and comment on the
   issue explaining what is blocking you.

## Commits and pull requests

- Commit subjects follow `[MAYOR] <summary>` with a 10 to 100 character summary.
- Pull request titles start with `[MAYOR]`.
- Pull request descriptions contain `## Summary` and `## Testing` sections.
- Label pull requests `{{agent_label}}`.

## Policy

Changes are checked against `{{policy_file}}`. Do not edit workflow files,
secrets, or the policy itself. Run `mayor policy test --changes <file>` to check a
change locally.
"#;

const AUTO_MERGE_TEMPLATE: &str = r#"name: mayor auto-merge

on:
  pull_request:
    types: [labeled, synchronize, ready_for_review]
  check_suite:
    types: [completed]

permissions:
  contents: write
  pull-requests: write

jobs:
  auto-merge:
    if: contains(github.event.pull_request.labels.*.name, '{{agent_label}}')
    runs-on: ubuntu-latest
    steps:
      - name: Enable auto-merge
        env:
          GH_TOKEN: ${{ github.token }}
          PR_URL: ${{ github.event.pull_request.html_url }}
        run: gh pr merge --auto --{{merge_strategy}} "$PR_URL"
"#;

const ORCHESTRATOR_TEMPLATE: &str = r#"name: mayor orchestrator

on:
  schedule:
    - cron: "{{schedule}}"
  workflow_dispatch:
  issues:
    types: [labeled]

permissions:
  contents: read
  issues: write
  pull-requests: read

concurrency:
  group: mayor-orchestrator
  cancel-in-progress: false

env:
  MAYOR_LABEL: "{{agent_label}}"
  MAYOR_MAX_ITERATIONS: "{{max_iterations}}"
  MAYOR_BASE_BRANCH: "{{base_branch}}"

jobs:
  assign:
    runs-on: ubuntu-latest
    steps:
      - name: Skip when agent work is already open
        id: busy
        env:
          GH_TOKEN: ${{ github.token }}
        run: |
          open=$(gh pr list --repo "$GITHUB_REPOSITORY" --label "$MAYOR_LABEL" --state open --json number --jq length)
          echo "open=$open" >> "$GITHUB_OUTPUT"
      - name: Assign the oldest ready issue
        if: steps.busy.outputs.open == '0'
        env:
          GH_TOKEN: ${{ github.token }}
        run: |
          issue=$(gh issue list --repo "$GITHUB_REPOSITORY" --label "$MAYOR_LABEL" --state open \
            --search "no:assignee sort:created-asc" --limit 1 --json number --jq '.[0].number')
          if [ -z "$issue" ]; then
            echo "No ready issues."
            exit 0
          fi
          gh issue edit "$issue" --repo "$GITHUB_REPOSITORY" --add-assignee "@copilot"
          gh issue comment "$issue" --repo "$GITHUB_REPOSITORY" \
            --body "Assigned by mayor. Iteration limit: $MAYOR_MAX_ITERATIONS. Base branch: $MAYOR_BASE_BRANCH."
"#;

const ISSUE_TEMPLATE: &str = r#"---
name: Agent task
about: A task for the autonomous coding agent
title: "[MAYOR] "
labels: ["{{agent_label}}"]
---

## Goal

<!-- One or two sentences describing the outcome. -->

## Acceptance criteria

- [ ]

## Context

<!-- Files, links, or constraints the agent should know about. -->

## Out of scope

<!-- Anything the agent must not change. -->
"#;

const POLICY_HEADER: &str = r#"# mayor policy for {{project_name}}
# Validate with: mayor policy validate
version: "1.0"
enabled: true

agent:
  max_iterations: {{max_iterations}}

"#;

const POLICY_FILES: &str = r#"  files:
    allowed_patterns: []
    blocked_patterns:
      - ".github/workflows/**"
      - "{{policy_file}}"
      - "**/*.pem"
      - "**/.env"
    max_files_per_pr: 20
    max_lines_per_file: 500
"#;

const POLICY_COMMANDS: &str = r#"  commands:
    mode: blacklist
    allowed: []
    blocked:
      - pattern: 'rm\s+-rf\s+/'
        reason: deletes the filesystem root
      - pattern: 'git\s+push\s+.*--force'
        reason: rewrites shared history
      - pattern: 'curl[^|]*\|\s*(ba|z)?sh'
        reason: pipes remote code into a shell
"#;

const POLICY_QUALITY: &str = r#"  quality:
    must_pass: [tests, lint]
    min_coverage: 80
"#;

const POLICY_DEPENDENCIES: &str = r#"  dependencies:
    mode: approval_required
"#;

const POLICY_COMMITS: &str = r#"  commits:
    format:
      pattern: '^\[MAYOR\]\s+.{10,100}$'
      description: "[MAYOR] <summary of 10-100 characters>"
    max_size: 1000
    max_files: 20
"#;

const POLICY_PULL_REQUESTS: &str = r###"  pull_requests:
    title_pattern: '^\[MAYOR\]'
    required_sections: ["## Summary", "## Testing"]
    required_labels: ["{{agent_label}}"]
    auto_add_labels:
      - label: large-change
        condition: files_changed > 10
    required_reviewers: []
"###;

const POLICY_OVERRIDES: &str = r#"
overrides:
  bypass_labels: [emergency]
  partial_bypass:
    - label: skip-coverage
      bypass: [quality.coverage]
    - label: large-refactor
      bypass: [files.max_files_per_pr, commits.max_files, commits.max_size]
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
