use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// Version of the `labels.json` layout this crate reads and writes.
pub const LABELS_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LabelEncoderArtifact {
    format_version: u32,
    classes: Vec<String>,
}

/// Immutable mapping between dense class indices and language names.
///
/// Index `i` is the name at position `i` of the encoder's `classes` list, which is the
/// order the pipeline emits class indices in.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMapping {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl LabelMapping {
    /// Builds a mapping from names in class-index order.
    ///
    /// Names must be non-empty and unique, and there must be at least one.
    pub fn new<S: Into<String>>(names: Vec<S>) -> Result<Self, ClassifierError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ClassifierError::artifact("labels", "label mapping has no classes"));
        }

        let mut indices = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ClassifierError::artifact(
                    "labels",
                    format!("class {} has an empty name", i),
                ));
            }
            if indices.insert(name.clone(), i).is_some() {
                return Err(ClassifierError::artifact(
                    "labels",
                    format!("duplicate class name '{}'", name),
                ));
            }
        }

        Ok(Self { names, indices })
    }

    /// Parses a `labels.json` document.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let artifact: LabelEncoderArtifact = serde_json::from_str(json)
            .map_err(|e| ClassifierError::artifact("labels", format!("invalid JSON: {}", e)))?;
        if artifact.format_version != LABELS_FORMAT_VERSION {
            return Err(ClassifierError::artifact(
                "labels",
                format!(
                    "unsupported format_version {} (expected {})",
                    artifact.format_version, LABELS_FORMAT_VERSION
                ),
            ));
        }
        Self::new(artifact.classes)
    }

    /// Reads and parses a `labels.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ClassifierError::artifact("labels", format!("cannot read {}: {}", path.display(), e))
        })?;
        let mapping = Self::from_json(&json)?;
        info!("Loaded {} labels from {:?}", mapping.len(), path);
        Ok(mapping)
    }

    /// Serializes the mapping back into the `labels.json` layout.
    pub fn to_json(&self) -> String {
        let artifact = LabelEncoderArtifact {
            format_version: LABELS_FORMAT_VERSION,
            classes: self.names.clone(),
        };
        // A struct of a u32 and strings always serializes.
        serde_json::to_string_pretty(&artifact).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Language name for a class index.
    pub fn name(&self, index: usize) -> Result<&str, ClassifierError> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(ClassifierError::UnknownClassIndex {
                index,
                num_classes: self.names.len(),
            })
    }

    /// Class index for a language name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// All names in class-index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_lookup() -> Result<(), ClassifierError> {
        let labels = LabelMapping::new(vec!["English", "French", "German"])?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(1)?, "French");
        assert_eq!(labels.index_of("German"), Some(2));
        assert_eq!(labels.index_of("Klingon"), None);
        Ok(())
    }

    #[test]
    fn test_unknown_index() {
        let labels = LabelMapping::new(vec!["English"]).unwrap();
        assert!(matches!(
            labels.name(1),
            Err(ClassifierError::UnknownClassIndex { index: 1, num_classes: 1 })
        ));
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(LabelMapping::new(Vec::<String>::new()).is_err());
        assert!(LabelMapping::new(vec!["English", ""]).is_err());
        assert!(LabelMapping::new(vec!["English", "English"]).is_err());
    }

    #[test]
    fn test_json_version_check() {
        let json = r#"{"format_version": 2, "classes": ["English"]}"#;
        assert!(matches!(
            LabelMapping::from_json(json),
            Err(ClassifierError::ArtifactLoad { .. })
        ));
        assert!(LabelMapping::from_json("not json").is_err());
    }

    #[test]
    fn test_json_round_trip() -> Result<(), ClassifierError> {
        let labels = LabelMapping::new(vec!["Arabic", "English"])?;
        assert_eq!(LabelMapping::from_json(&labels.to_json())?, labels);
        Ok(())
    }
}
