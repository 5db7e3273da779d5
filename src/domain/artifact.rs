//! Artifact contracts between pipeline stages.
//!
//! An artifact is a named handle to on-disk pipeline state. It is either
//! absent (not yet produced) or present and non-empty; a present-but-empty
//! artifact is treated identically to an absent one.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Declared output of a stage: what must exist on disk after it succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Artifact name, also the template placeholder that resolves to its path
    pub name: String,

    /// Path relative to the run working directory
    pub path: PathBuf,

    /// What kind of on-disk state this artifact is
    pub kind: ArtifactKind,
}

impl ArtifactSpec {
    /// A single file that must exist and be non-empty
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ArtifactKind::File,
        }
    }

    /// A directory that must contain at least one entry matching `pattern`
    pub fn directory(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ArtifactKind::Directory {
                matching: pattern.into(),
            },
        }
    }

    /// A JSON metadata record with the required news fields
    pub fn metadata(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ArtifactKind::Metadata,
        }
    }
}

/// Kinds of artifacts a stage can declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A file that must exist and be non-empty
    File,

    /// A directory that must contain at least one file matching a glob
    Directory { matching: String },

    /// A UTF-8 JSON object with non-empty `title`, `description` and `tags`
    Metadata,
}

/// The structured record produced by the news stage and consumed by the
/// imagery, narration and publish stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsMetadata {
    /// Video title
    pub title: String,

    /// Video description, also the narration script
    pub description: String,

    /// Ordered hashtag list
    pub tags: Vec<String>,
}

impl NewsMetadata {
    /// Check that all required fields are present and non-empty.
    ///
    /// Returns the name of the first offending field.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            return Some("title");
        }
        if self.description.trim().is_empty() {
            return Some("description");
        }
        if self.tags.is_empty() || self.tags.iter().all(|t| t.trim().is_empty()) {
            return Some("tags");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewsMetadata {
        NewsMetadata {
            title: "Storm Hits Coast".to_string(),
            description: "A severe storm made landfall this morning.".to_string(),
            tags: vec!["#news".to_string(), "#weather".to_string()],
        }
    }

    #[test]
    fn test_complete_metadata_passes() {
        assert_eq!(sample().missing_field(), None);
    }

    #[test]
    fn test_blank_title_is_missing() {
        let mut meta = sample();
        meta.title = "   ".to_string();
        assert_eq!(meta.missing_field(), Some("title"));
    }

    #[test]
    fn test_empty_tags_are_missing() {
        let mut meta = sample();
        meta.tags.clear();
        assert_eq!(meta.missing_field(), Some("tags"));

        let mut meta = sample();
        meta.tags = vec!["".to_string()];
        assert_eq!(meta.missing_field(), Some("tags"));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let json = serde_json::to_string(&sample()).unwrap();
        let parsed: NewsMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, "Storm Hits Coast");
        assert_eq!(parsed.tags.len(), 2);
    }
}
