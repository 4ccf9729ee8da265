//! Pretrained pipeline artifacts: a fitted TF-IDF character n-gram vectorizer followed
//! by a fitted estimator, stored as `pipeline.json`.

mod estimator;
mod onnx;
mod vectorizer;

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::classifier::{ClassifierError, Pipeline, ProbabilisticClassifier, TextClassifier};
use crate::runtime::RuntimeConfig;

pub use estimator::{Estimator, LinearModel, MultiClass, VotingKind};
pub use onnx::OnnxEstimator;
pub use vectorizer::{Analyzer, Norm, SparseVector, StripAccentsMode, TfidfVectorizer};

use estimator::EstimatorArtifact;
use vectorizer::VectorizerArtifact;

/// Version of the `pipeline.json` layout this crate reads.
pub const PIPELINE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct PipelineArtifact {
    format_version: u32,
    vectorizer: VectorizerArtifact,
    estimator: EstimatorArtifact,
}

/// A vectorizer + estimator pipeline loaded from `pipeline.json`.
#[derive(Debug)]
pub struct SklearnPipeline {
    source: PathBuf,
    vectorizer: TfidfVectorizer,
    estimator: Estimator,
}

impl SklearnPipeline {
    /// Parses a pipeline document. Relative estimator paths resolve against `base_dir`.
    pub fn from_json(
        json: &str,
        base_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let artifact: PipelineArtifact = serde_json::from_str(json)
            .map_err(|e| ClassifierError::artifact("pipeline", format!("invalid JSON: {}", e)))?;
        if artifact.format_version != PIPELINE_FORMAT_VERSION {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!(
                    "unsupported format_version {} (expected {})",
                    artifact.format_version, PIPELINE_FORMAT_VERSION
                ),
            ));
        }

        let vectorizer = TfidfVectorizer::from_artifact(artifact.vectorizer)?;
        let estimator = Estimator::from_artifact(
            artifact.estimator,
            vectorizer.n_features(),
            base_dir,
            runtime,
        )?;

        Ok(Self {
            source: base_dir.to_path_buf(),
            vectorizer,
            estimator,
        })
    }

    /// Reads and parses a `pipeline.json` file.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ClassifierError::artifact("pipeline", format!("cannot read {}: {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut pipeline = Self::from_json(&json, base_dir, runtime)?;
        pipeline.source = path.to_path_buf();

        info!(
            "Loaded pipeline from {:?}: {} features, {} classes, probabilities: {}",
            path,
            pipeline.vectorizer.n_features(),
            pipeline.estimator.num_classes(),
            pipeline.estimator.supports_probabilities()
        );
        Ok(pipeline)
    }

    /// File (or base directory, for `from_json`) the pipeline was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Wraps the pipeline in the variant matching what its estimator can do.
    pub fn into_pipeline(self) -> Pipeline {
        if self.estimator.supports_probabilities() {
            Pipeline::scoring(self)
        } else {
            Pipeline::label_only(self)
        }
    }
}

impl TextClassifier for SklearnPipeline {
    fn num_classes(&self) -> usize {
        self.estimator.num_classes()
    }

    fn classify(&self, text: &str) -> Result<usize, ClassifierError> {
        let features = self.vectorizer.transform(text)?;
        self.estimator.predict(&features)
    }
}

impl ProbabilisticClassifier for SklearnPipeline {
    fn score(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let features = self.vectorizer.transform(text)?;
        self.estimator.predict_proba(&features)
    }
}
