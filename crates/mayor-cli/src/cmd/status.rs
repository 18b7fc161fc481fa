use crate::output::{print_json, print_table};
use anyhow::Context;
use mayor_core::{catalog::CATALOG, io, reconcile::FileState};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = io::snapshot(root).context("failed to read repository files")?;

    if json {
        let entries: Vec<_> = CATALOG
            .iter()
            .map(|spec| {
                serde_json::json!({
                    "id": spec.id,
                    "path": spec.path,
                    "category": spec.category,
                    "critical": spec.critical,
                    "exists": snapshot.exists(spec.path),
                })
            })
            .collect();
        return print_json(&entries);
    }

    let rows = CATALOG
        .iter()
        .map(|spec| {
            vec![
                spec.id.to_string(),
                spec.path.to_string(),
                spec.category.to_string(),
                if spec.critical { "yes" } else { "no" }.to_string(),
                if snapshot.exists(spec.path) { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "PATH", "CATEGORY", "CRITICAL", "EXISTS"], rows);
    Ok(())
}
