//! Run-scoped storage for intermediate artifacts.
//!
//! Every run owns one directory `<temp_root>/run-<id>/`. Stages allocate
//! their intermediate files through the store, and the orchestrator calls
//! [`ArtifactStore::release_all`] once the run terminates. Dropping an
//! unreleased store releases it as well, so an unwinding worker still
//! leaves the temp root clean.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{DubError, Result};

const RUN_DIR_PREFIX: &str = "run-";

/// A transient file produced by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedRemoval {
    pub path: PathBuf,
    pub reason: String,
}

/// What a release pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub removed: usize,
    pub already_gone: usize,
    pub blocked: Vec<BlockedRemoval>,
}

impl ReleaseReport {
    /// True when nothing was left behind.
    pub fn is_clean(&self) -> bool {
        self.blocked.is_empty()
    }
}

pub struct ArtifactStore {
    run_dir: PathBuf,
    artifacts: Vec<Artifact>,
    sequence: u32,
    released: bool,
}

impl ArtifactStore {
    /// Create an empty run directory for `run_id` under `temp_root`.
    pub fn open(temp_root: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = temp_root.join(format!("{}{}", RUN_DIR_PREFIX, run_id.simple()));

        if run_dir.exists() {
            std::fs::remove_dir_all(&run_dir).map_err(|e| {
                DubError::Storage(format!("Failed to clear {}: {}", run_dir.display(), e))
            })?;
        }
        ensure_writable_dir(&run_dir)?;

        debug!("Opened artifact store at {}", run_dir.display());
        Ok(Self {
            run_dir,
            artifacts: Vec::new(),
            sequence: 0,
            released: false,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Allocate a fresh path for an artifact produced by `stage`.
    ///
    /// Allocating the same logical name twice yields two distinct paths; the
    /// allocation sequence number is part of the file name.
    pub fn allocate(&mut self, stage: &str, logical_name: &str, extension: &str) -> Result<PathBuf> {
        if self.released {
            return Err(DubError::Storage(
                "Artifact store has already been released".to_string(),
            ));
        }
        ensure_writable_dir(&self.run_dir)?;

        self.sequence += 1;
        let name = sanitize(logical_name);
        let extension = extension.trim_start_matches('.');
        let file_name = if extension.is_empty() {
            format!("{:03}-{}", self.sequence, name)
        } else {
            format!("{:03}-{}.{}", self.sequence, name, extension)
        };
        let path = self.run_dir.join(file_name);

        debug!("Allocated artifact '{}' for {}: {}", name, stage, path.display());
        self.artifacts.push(Artifact {
            name,
            path: path.clone(),
            stage: stage.to_string(),
        });
        Ok(path)
    }

    /// Remove every allocated artifact and the run directory.
    ///
    /// Files that are already gone count as released. Removals that fail for
    /// any other reason are logged and reported, and the pass continues.
    /// Calling this again after a release is a no-op.
    pub fn release_all(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        for artifact in self.artifacts.drain(..) {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.already_gone += 1,
                Err(e) => {
                    warn!(
                        "Failed to remove artifact {} ({}): {}",
                        artifact.path.display(),
                        artifact.stage,
                        e
                    );
                    report.blocked.push(BlockedRemoval {
                        path: artifact.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match std::fs::remove_dir_all(&self.run_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove run directory {}: {}", self.run_dir.display(), e);
                report.blocked.push(BlockedRemoval {
                    path: self.run_dir.clone(),
                    reason: e.to_string(),
                });
            }
        }

        debug!(
            "Released artifacts: {} removed, {} already gone, {} blocked",
            report.removed,
            report.already_gone,
            report.blocked.len()
        );
        report
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        if !self.released {
            warn!("Artifact store for {} dropped without release", self.run_dir.display());
            self.release_all();
        }
    }
}

/// Remove run directories left behind under `temp_root` by crashed processes.
///
/// Returns the number of files removed. Must not be called while a run is
/// active against the same root.
pub fn sweep_stale(temp_root: &Path) -> Result<usize> {
    if !temp_root.exists() {
        return Ok(0);
    }

    let entries = std::fs::read_dir(temp_root)
        .map_err(|e| DubError::Storage(format!("Failed to read {}: {}", temp_root.display(), e)))?;

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_run_dir = path.is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(RUN_DIR_PREFIX));
        if !is_run_dir {
            continue;
        }

        let files = WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();

        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed += files,
            Err(e) => warn!("Failed to remove stale run directory {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("Removed {} stale artifacts from {}", removed, temp_root.display());
    }
    Ok(removed)
}

/// Create and drop a scratch file in `dir`. Permission bits alone do not
/// tell whether the current user may write there.
pub(crate) fn probe_writable(dir: &Path) -> io::Result<()> {
    tempfile::Builder::new()
        .prefix(".lipdub-probe")
        .tempfile_in(dir)
        .map(drop)
}

fn ensure_writable_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| DubError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

    probe_writable(dir)
        .map_err(|e| DubError::Storage(format!("{} is not writable: {}", dir.display(), e)))
}

fn sanitize(logical_name: &str) -> String {
    let name: String = logical_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() { "artifact".to_string() } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_duplicate_names_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();

        let first = store.allocate("extract-audio", "audio", "wav").unwrap();
        let second = store.allocate("extract-audio", "audio", ".wav").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(store.run_dir()));
        assert_eq!(second.extension().unwrap(), "wav");
        assert_eq!(store.artifacts().len(), 2);
        store.release_all();
    }

    #[test]
    fn test_allocate_recreates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        std::fs::remove_dir_all(store.run_dir()).unwrap();

        let path = store.allocate("clone-voice", "dubbed", "wav").unwrap();
        assert!(path.parent().unwrap().is_dir());
        store.release_all();
    }

    #[test]
    fn test_release_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();

        let audio = store.allocate("extract-audio", "audio", "wav").unwrap();
        std::fs::write(&audio, b"RIFF").unwrap();
        // allocated but never written
        store.allocate("clone-voice", "dubbed", "wav").unwrap();

        let report = store.release_all();
        assert_eq!(report.removed, 1);
        assert_eq!(report.already_gone, 1);
        assert!(report.is_clean());
        assert!(!audio.exists());
        assert!(dir_is_empty(root.path()));
    }

    #[test]
    fn test_release_twice_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        let path = store.allocate("translate", "text", "txt").unwrap();
        std::fs::write(&path, "hola").unwrap();

        store.release_all();
        let second = store.release_all();
        assert_eq!(second, ReleaseReport::default());
    }

    #[test]
    fn test_allocate_after_release_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        store.release_all();

        assert!(matches!(
            store.allocate("transcribe", "audio", "wav"),
            Err(DubError::Storage(_))
        ));
    }

    #[test]
    fn test_drop_releases() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
            let path = store.allocate("extract-audio", "audio", "wav").unwrap();
            std::fs::write(&path, b"RIFF").unwrap();
            path
        };
        assert!(!path.exists());
        assert!(dir_is_empty(root.path()));
    }

    #[test]
    fn test_logical_name_is_sanitized() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        let path = store.allocate("translate", "../escape", "txt").unwrap();
        assert_eq!(path.parent().unwrap(), store.run_dir());
        store.release_all();
    }

    #[cfg(unix)]
    #[test]
    fn test_blocked_removal_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        let first = store.allocate("extract-audio", "audio", "wav").unwrap();
        let second = store.allocate("clone-voice", "dubbed", "wav").unwrap();
        std::fs::write(&first, b"RIFF").unwrap();
        std::fs::write(&second, b"RIFF").unwrap();

        let run_dir = store.run_dir().to_path_buf();
        std::fs::set_permissions(&run_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        // root ignores directory permissions
        let enforced = probe_writable(&run_dir).is_err();

        let report = store.release_all();
        if enforced {
            std::fs::set_permissions(&run_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
            assert!(!report.is_clean());
            assert_eq!(report.removed, 0);
            // both files and the directory, none skipped after the first failure
            assert_eq!(report.blocked.len(), 3);
            assert!(report.blocked.iter().any(|b| b.path == second));
            assert!(first.exists());
        } else {
            assert!(report.is_clean());
        }
        assert_eq!(store.release_all(), ReleaseReport::default());
    }

    #[test]
    fn test_probe_writable() {
        let root = tempfile::tempdir().unwrap();
        probe_writable(root.path()).unwrap();
        assert!(dir_is_empty(root.path()));

        let file = root.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(probe_writable(&file).is_err());
        assert!(probe_writable(&root.path().join("absent")).is_err());
    }

    #[test]
    fn test_open_on_file_is_storage_error() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("temp");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            ArtifactStore::open(&file, Uuid::new_v4()),
            Err(DubError::Storage(_))
        ));
    }

    #[test]
    fn test_sweep_stale_only_touches_run_dirs() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("run-deadbeef");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("001-audio.wav"), b"RIFF").unwrap();
        std::fs::write(stale.join("002-dubbed.wav"), b"RIFF").unwrap();
        std::fs::write(root.path().join("keep.txt"), "x").unwrap();

        assert_eq!(sweep_stale(root.path()).unwrap(), 2);
        assert!(!stale.exists());
        assert!(root.path().join("keep.txt").exists());
    }

    #[test]
    fn test_sweep_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(sweep_stale(&root.path().join("absent")).unwrap(), 0);
    }
}
