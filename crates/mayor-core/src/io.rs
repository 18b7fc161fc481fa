use crate::catalog::CATALOG;
use crate::error::Result;
use crate::options::SetupOptions;
use crate::paths;
use crate::reconcile::{FileSnapshot, SetupPlan};
use crate::schema::{self, ValidatedPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read every catalog path that exists under `root`.
pub fn snapshot(root: &Path) -> Result<FileSnapshot> {
    let mut snap = FileSnapshot::new();
    for spec in CATALOG {
        let path = paths::resolve(root, spec.path);
        match std::fs::read(&path) {
            Ok(bytes) => snap.insert(spec.path, bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(snap)
}

/// Write every create/overwrite action. Each file is atomic; the plan as a
/// whole is not.
pub fn apply_plan(root: &Path, plan: &SetupPlan) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for action in plan.writes() {
        let path = paths::resolve(root, &action.path);
        atomic_write(&path, action.content.as_bytes())?;
        tracing::info!(path = %action.path, action = %action.action, "wrote file");
        written.push(path);
    }
    Ok(written)
}

/// Load and validate a policy file.
pub fn load_policy(path: &Path) -> Result<ValidatedPolicy> {
    let raw = std::fs::read_to_string(path)?;
    Ok(schema::validate(&raw)?)
}

/// Setup options from `.mayor/setup.yml`, or defaults when absent.
pub fn load_setup_options(root: &Path) -> Result<SetupOptions> {
    let path = paths::setup_options_path(root);
    if !path.exists() {
        return Ok(SetupOptions::default());
    }
    let data = std::fs::read_to_string(&path)?;
    SetupOptions::from_yaml(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{plan, SetupMode};
    use tempfile::TempDir;

    const NONE: &[&str] = &[];

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        atomic_write(&path, b"hi").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn apply_then_snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let opts = SetupOptions::new("demo");

        let first = plan(SetupMode::Full, NONE, &snapshot(dir.path()).unwrap(), &opts, false).unwrap();
        let written = apply_plan(dir.path(), &first).unwrap();
        assert_eq!(written.len(), CATALOG.len());
        assert!(dir.path().join(".github/workflows/mayor-orchestrator.yml").exists());

        let snap = snapshot(dir.path()).unwrap();
        assert_eq!(snap.len(), CATALOG.len());
        let second = plan(SetupMode::Full, NONE, &snap, &opts, false).unwrap();
        assert!(second.is_clean());
    }

    #[test]
    fn written_policy_loads() {
        let dir = TempDir::new().unwrap();
        let p = plan(
            SetupMode::Custom,
            &["policy"],
            &FileSnapshot::new(),
            &SetupOptions::default(),
            false,
        )
        .unwrap();
        apply_plan(dir.path(), &p).unwrap();
        let v = load_policy(&paths::policy_path(dir.path())).unwrap();
        assert!(v.policy.enabled);
    }

    #[test]
    fn setup_options_default_when_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_setup_options(dir.path()).unwrap(), SetupOptions::default());

        atomic_write(&paths::setup_options_path(dir.path()), b"project_name: shop\n").unwrap();
        assert_eq!(load_setup_options(dir.path()).unwrap().project_name, "shop");
    }
}
