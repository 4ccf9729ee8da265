use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use super::error::ClassifierError;
use super::loader::{ArtifactSource, LoadedModel, ModelLoader};
use super::utils::{rank_top_k, validate_probabilities};
use super::ClassifierInfo;
use crate::config::DetectorConfig;

/// One ranked entry of a detection: a language and the probability the model gives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confidence {
    pub label: String,
    pub probability: f32,
}

/// The outcome of a single detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// The predicted language
    pub predicted_label: String,
    /// The most probable languages, best first; empty when the model cannot score
    pub ranked_confidences: Vec<Confidence>,
}

impl Detection {
    /// The probability of the predicted language, if the model reports one.
    pub fn confidence(&self) -> Option<f32> {
        self.ranked_confidences.first().map(|c| c.probability)
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.confidence() {
            Some(p) => write!(f, "{} ({:.1}%)", self.predicted_label, p * 100.0),
            None => write!(f, "{}", self.predicted_label),
        }
    }
}

/// A thread-safe language detector over a loaded model.
///
/// The model is shared read-only, so a detector can be cloned or wrapped in an `Arc`
/// and used from many threads at once:
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use langsniff::{LanguageDetector, ModelLoader};
/// use std::sync::Arc;
/// use std::thread;
///
/// let loader = ModelLoader::from_dir("models/language-detection");
/// let detector = Arc::new(LanguageDetector::new(loader.load()?));
///
/// let handles: Vec<_> = ["Hello there", "Bonjour à tous"]
///     .into_iter()
///     .map(|text| {
///         let detector = Arc::clone(&detector);
///         thread::spawn(move || detector.detect(text))
///     })
///     .collect();
///
/// for handle in handles {
///     println!("{}", handle.join().unwrap()?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    model: Arc<LoadedModel>,
    config: DetectorConfig,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<LanguageDetector>();
    }
};

impl LanguageDetector {
    pub fn new(model: Arc<LoadedModel>) -> Self {
        Self {
            model,
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(
        model: Arc<LoadedModel>,
        config: DetectorConfig,
    ) -> Result<Self, ClassifierError> {
        config.validate()?;
        Ok(Self { model, config })
    }

    /// Loads (or reuses) the loader's model.
    pub fn from_loader<S: ArtifactSource>(
        loader: &ModelLoader<S>,
    ) -> Result<Self, ClassifierError> {
        Ok(Self::new(loader.load()?))
    }

    pub fn model(&self) -> &Arc<LoadedModel> {
        &self.model
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Returns information about the loaded model
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            num_classes: self.model.labels().len(),
            class_labels: self.model.labels().names().to_vec(),
            supports_scoring: self.model.pipeline().supports_scoring(),
            top_k: self.config.top_k,
            max_input_bytes: self.config.max_input_bytes,
        }
    }

    /// Detects the language of `text`.
    ///
    /// Empty text is passed to the pipeline like any other input. The ranked list holds
    /// the `top_k` most probable languages as the model reports them, never
    /// renormalized; ties rank the predicted language first, then lower class indices.
    ///
    /// # Errors
    /// - `InputTooLarge` if `text` exceeds the configured byte cap
    /// - `UnknownClassIndex` if the pipeline predicts a class with no label
    /// - `InconsistentOutput` if the probabilities are not a distribution over the
    ///   labels or do not rank the predicted language first
    /// - `PredictionError` if the pipeline fails internally
    pub fn detect(&self, text: &str) -> Result<Detection, ClassifierError> {
        if let Some(max) = self.config.max_input_bytes {
            if text.len() > max {
                return Err(ClassifierError::InputTooLarge { len: text.len(), max });
            }
        }

        let pipeline = self.model.pipeline();
        let labels = self.model.labels();

        let predicted = pipeline.classify(text)?;
        let predicted_label = labels.name(predicted)?.to_string();
        debug!(
            "Predicted class {} ({}) for {} bytes of text",
            predicted,
            predicted_label,
            text.len()
        );

        let ranked_confidences = match pipeline.score(text) {
            None => Vec::new(),
            Some(probabilities) => self.rank(&probabilities?, predicted)?,
        };

        Ok(Detection {
            predicted_label,
            ranked_confidences,
        })
    }

    fn rank(
        &self,
        probabilities: &[f32],
        predicted: usize,
    ) -> Result<Vec<Confidence>, ClassifierError> {
        let labels = self.model.labels();
        validate_probabilities(probabilities, labels.len())
            .map_err(ClassifierError::InconsistentOutput)?;

        let top = rank_top_k(probabilities, self.config.top_k, Some(predicted));
        if top.first() != Some(&predicted) {
            return Err(ClassifierError::InconsistentOutput(format!(
                "predicted class {} has probability {} but class {} scores {}",
                predicted, probabilities[predicted], top[0], probabilities[top[0]]
            )));
        }

        top.into_iter()
            .map(|index| {
                Ok(Confidence {
                    label: labels.name(index)?.to_string(),
                    probability: probabilities[index],
                })
            })
            .collect()
    }
}
