//! Artifact store: the filesystem contract between stages.
//!
//! A stage that reports success has only done half its job; the store
//! decides whether the declared outputs actually exist and are usable.
//! Present-but-empty is treated identically to absent, so no partial
//! state propagates to later stages.

use std::path::{Path, PathBuf};

use glob::Pattern;
use thiserror::Error;
use tracing::warn;

use crate::domain::{ArtifactKind, ArtifactSpec, NewsMetadata};

/// Validates and resolves artifacts under the run working directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact
    pub fn path_of(&self, spec: &ArtifactSpec) -> PathBuf {
        self.root.join(&spec.path)
    }

    /// Remove a stale artifact before its producing stage runs.
    ///
    /// Artifact paths are fixed well-known names overwritten each run; a
    /// leftover from a previous run must not satisfy this run's contract.
    pub fn clear(&self, spec: &ArtifactSpec) {
        let path = self.path_of(spec);
        let result = match spec.kind {
            ArtifactKind::Directory { .. } => std::fs::remove_dir_all(&path),
            _ => std::fs::remove_file(&path),
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(artifact = %spec.name, error = %e, "could not clear stale artifact");
            }
        }
    }

    /// Check one declared output after its stage reported success
    pub fn validate(&self, spec: &ArtifactSpec) -> Result<(), ArtifactError> {
        let path = self.path_of(spec);

        match &spec.kind {
            ArtifactKind::File => self.validate_file(spec, &path),
            ArtifactKind::Directory { matching } => self.validate_directory(spec, &path, matching),
            ArtifactKind::Metadata => self.validate_metadata(spec, &path),
        }
    }

    fn validate_file(&self, spec: &ArtifactSpec, path: &Path) -> Result<(), ArtifactError> {
        let meta = std::fs::metadata(path).map_err(|_| ArtifactError::Missing {
            name: spec.name.clone(),
            path: path.to_path_buf(),
        })?;

        if meta.len() == 0 {
            return Err(ArtifactError::Empty {
                name: spec.name.clone(),
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn validate_directory(
        &self,
        spec: &ArtifactSpec,
        path: &Path,
        matching: &str,
    ) -> Result<(), ArtifactError> {
        let entries = std::fs::read_dir(path).map_err(|_| ArtifactError::Missing {
            name: spec.name.clone(),
            path: path.to_path_buf(),
        })?;

        let pattern = Pattern::new(matching).map_err(|e| ArtifactError::Malformed {
            name: spec.name.clone(),
            reason: format!("bad content pattern '{matching}': {e}"),
        })?;

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let matches = pattern.matches(&file_name.to_string_lossy());
            let non_empty = entry.metadata().map(|m| m.len() > 0).unwrap_or(false);
            if matches && non_empty {
                return Ok(());
            }
        }

        Err(ArtifactError::Empty {
            name: spec.name.clone(),
            path: path.to_path_buf(),
        })
    }

    fn validate_metadata(&self, spec: &ArtifactSpec, path: &Path) -> Result<(), ArtifactError> {
        // Existence and non-emptiness first, then shape
        self.validate_file(spec, path)?;

        let content = std::fs::read_to_string(path).map_err(|e| ArtifactError::Malformed {
            name: spec.name.clone(),
            reason: format!("not readable as UTF-8: {e}"),
        })?;

        let meta: NewsMetadata =
            serde_json::from_str(&content).map_err(|e| ArtifactError::Malformed {
                name: spec.name.clone(),
                reason: format!("invalid metadata JSON: {e}"),
            })?;

        if let Some(field) = meta.missing_field() {
            return Err(ArtifactError::Malformed {
                name: spec.name.clone(),
                reason: format!("required field '{field}' is missing or empty"),
            });
        }

        Ok(())
    }

    /// Remove stage-scoped temporary files. Called on the stage's exit
    /// path regardless of success or failure; failed-run artifacts stay on
    /// disk for postmortem, scratch never does.
    pub fn clean_scratch(&self, scratch: &[PathBuf]) {
        for rel in scratch {
            let path = self.root.join(rel);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "could not remove scratch file");
                }
            }
        }
    }
}

/// Artifact contract violations. Always fatal for the run and never
/// retried: a stage that "succeeds" without producing its output would in
/// the common case reproduce the same empty output deterministically.
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("artifact '{name}' missing at {path}")]
    Missing { name: String, path: PathBuf },

    #[error("artifact '{name}' at {path} is empty")]
    Empty { name: String, path: PathBuf },

    #[error("artifact '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_missing_file_rejected() {
        let (_dir, store) = store();
        let spec = ArtifactSpec::file("video", "out.mp4");

        assert!(matches!(
            store.validate(&spec),
            Err(ArtifactError::Missing { .. })
        ));
    }

    #[test]
    fn test_empty_file_treated_as_absent() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("out.mp4"), b"").unwrap();
        let spec = ArtifactSpec::file("video", "out.mp4");

        assert!(matches!(
            store.validate(&spec),
            Err(ArtifactError::Empty { .. })
        ));
    }

    #[test]
    fn test_nonempty_file_accepted() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("out.mp4"), b"frames").unwrap();
        let spec = ArtifactSpec::file("video", "out.mp4");

        assert!(store.validate(&spec).is_ok());
    }

    #[test]
    fn test_empty_directory_rejected() {
        let (dir, store) = store();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        let spec = ArtifactSpec::directory("images", "images", "*.png");

        assert!(matches!(
            store.validate(&spec),
            Err(ArtifactError::Empty { .. })
        ));
    }

    #[test]
    fn test_directory_needs_a_matching_file() {
        let (dir, store) = store();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("notes.txt"), b"not an image").unwrap();
        let spec = ArtifactSpec::directory("images", "images", "*.png");

        // A non-matching file does not satisfy the contract
        assert!(store.validate(&spec).is_err());

        std::fs::write(images.join("img-0.png"), b"png bytes").unwrap();
        assert!(store.validate(&spec).is_ok());
    }

    #[test]
    fn test_metadata_requires_all_fields() {
        let (dir, store) = store();
        let spec = ArtifactSpec::metadata("news_json", "news.json");

        std::fs::write(
            dir.path().join("news.json"),
            r##"{"title": "Storm", "description": "", "tags": ["#news"]}"##,
        )
        .unwrap();
        assert!(matches!(
            store.validate(&spec),
            Err(ArtifactError::Malformed { .. })
        ));

        std::fs::write(
            dir.path().join("news.json"),
            r##"{"title": "Storm", "description": "Landfall at dawn.", "tags": ["#news"]}"##,
        )
        .unwrap();
        assert!(store.validate(&spec).is_ok());
    }

    #[test]
    fn test_metadata_missing_tags_key_rejected() {
        let (dir, store) = store();
        let spec = ArtifactSpec::metadata("news_json", "news.json");

        std::fs::write(
            dir.path().join("news.json"),
            r#"{"title": "Storm", "description": "Landfall at dawn."}"#,
        )
        .unwrap();
        assert!(matches!(
            store.validate(&spec),
            Err(ArtifactError::Malformed { .. })
        ));
    }

    #[test]
    fn test_clear_removes_stale_artifacts() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("out.mp4"), b"old run").unwrap();
        let spec = ArtifactSpec::file("video", "out.mp4");

        store.clear(&spec);
        assert!(!dir.path().join("out.mp4").exists());
        // Clearing an absent artifact is not an error
        store.clear(&spec);
    }

    #[test]
    fn test_scratch_cleanup() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("temp_speech.mp3"), b"pcm").unwrap();

        store.clean_scratch(&[PathBuf::from("temp_speech.mp3"), PathBuf::from("absent.srt")]);
        assert!(!dir.path().join("temp_speech.mp3").exists());
    }
}
