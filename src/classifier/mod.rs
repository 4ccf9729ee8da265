mod detector;
mod error;
mod labels;
mod loader;
mod pipeline;
pub(crate) mod utils;

pub use detector::{Confidence, Detection, LanguageDetector};
pub use error::ClassifierError;
pub use labels::{LabelMapping, LABELS_FORMAT_VERSION};
pub use loader::{ArtifactPaths, ArtifactSource, LoadedModel, ModelLoader};
pub use pipeline::{Pipeline, ProbabilisticClassifier, TextClassifier};

/// Information about a detector's loaded model and settings
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassifierInfo {
    pub num_classes: usize,
    pub class_labels: Vec<String>,
    pub supports_scoring: bool,
    pub top_k: usize,
    pub max_input_bytes: Option<usize>,
}
