use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use once_cell::sync::OnceCell;

use super::error::ClassifierError;
use super::labels::LabelMapping;
use super::pipeline::Pipeline;
use crate::artifact::SklearnPipeline;
use crate::model_manager::{ModelManager, DEFAULT_MODEL_NAME, LABELS_FILE, PIPELINE_FILE};
use crate::runtime::RuntimeConfig;

/// Somewhere a pipeline and its label mapping can be deserialized from.
pub trait ArtifactSource: Send + Sync {
    fn load_artifacts(&self) -> Result<(Pipeline, LabelMapping), ClassifierError>;
}

/// The `pipeline.json` + `labels.json` pair on disk.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub pipeline_path: PathBuf,
    pub labels_path: PathBuf,
    pub runtime_config: RuntimeConfig,
}

impl ArtifactPaths {
    pub fn new<P: Into<PathBuf>, L: Into<PathBuf>>(pipeline_path: P, labels_path: L) -> Self {
        Self {
            pipeline_path: pipeline_path.into(),
            labels_path: labels_path.into(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Artifacts stored under their standard names in `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(PIPELINE_FILE), dir.join(LABELS_FILE))
    }

    /// The default model inside the default models directory.
    pub fn from_default_dir() -> Self {
        Self::from_dir(ModelManager::get_default_models_dir().join(DEFAULT_MODEL_NAME))
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }
}

impl ArtifactSource for ArtifactPaths {
    fn load_artifacts(&self) -> Result<(Pipeline, LabelMapping), ClassifierError> {
        info!("Loading pipeline from {:?}", self.pipeline_path);
        let pipeline = SklearnPipeline::from_file(&self.pipeline_path, &self.runtime_config)?;
        info!("Loading label mapping from {:?}", self.labels_path);
        let labels = LabelMapping::from_file(&self.labels_path)?;
        Ok((pipeline.into_pipeline(), labels))
    }
}

/// A pipeline and the label mapping aligned with it.
#[derive(Debug)]
pub struct LoadedModel {
    pipeline: Pipeline,
    labels: LabelMapping,
}

impl LoadedModel {
    /// Pairs a pipeline with its labels, checking they describe the same classes.
    pub fn new(pipeline: Pipeline, labels: LabelMapping) -> Result<Self, ClassifierError> {
        if pipeline.num_classes() != labels.len() {
            return Err(ClassifierError::artifact(
                "labels",
                format!(
                    "label mapping has {} classes but the pipeline emits {}",
                    labels.len(),
                    pipeline.num_classes()
                ),
            ));
        }
        Ok(Self { pipeline, labels })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }
}

/// Loads a model at most once per loader and hands out the shared instance.
///
/// Concurrent first calls block on a single load; every caller then receives the same
/// `Arc`. A failed load leaves the loader empty, so the error surfaces to each caller
/// until a load succeeds.
pub struct ModelLoader<S: ArtifactSource = ArtifactPaths> {
    source: S,
    model: OnceCell<Arc<LoadedModel>>,
}

impl<S: ArtifactSource> ModelLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            model: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the loaded model, deserializing the artifacts on first use.
    pub fn load(&self) -> Result<Arc<LoadedModel>, ClassifierError> {
        self.model
            .get_or_try_init(|| {
                let (pipeline, labels) = self.source.load_artifacts().map_err(|e| {
                    error!("Failed to load model artifacts: {}", e);
                    e
                })?;
                let model = LoadedModel::new(pipeline, labels)?;
                info!(
                    "Model ready: {} classes, scoring: {}",
                    model.labels.len(),
                    model.pipeline.supports_scoring()
                );
                Ok(Arc::new(model))
            })
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }
}

impl ModelLoader<ArtifactPaths> {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(ArtifactPaths::from_dir(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TextClassifier;

    #[derive(Debug)]
    struct Fixed(usize);

    impl TextClassifier for Fixed {
        fn num_classes(&self) -> usize {
            self.0
        }

        fn classify(&self, _text: &str) -> Result<usize, ClassifierError> {
            Ok(0)
        }
    }

    #[test]
    fn test_alignment_check() {
        let labels = LabelMapping::new(vec!["English", "French"]).unwrap();
        assert!(LoadedModel::new(Pipeline::label_only(Fixed(2)), labels.clone()).is_ok());
        let err = LoadedModel::new(Pipeline::label_only(Fixed(3)), labels).unwrap_err();
        assert!(matches!(err, ClassifierError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_artifact_paths_from_dir() {
        let paths = ArtifactPaths::from_dir("/models/lang");
        assert!(paths.pipeline_path.ends_with("lang/pipeline.json"));
        assert!(paths.labels_path.ends_with("lang/labels.json"));
    }

    #[test]
    fn test_missing_artifacts() {
        let loader = ModelLoader::from_dir("/nonexistent/langsniff-model");
        let err = loader.load().unwrap_err();
        assert!(matches!(err, ClassifierError::ArtifactLoad { .. }));
        assert!(!loader.is_loaded());
    }
}
