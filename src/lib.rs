//! A thread-safe language detector over pretrained character n-gram classifiers.
//!
//! A model is two artifacts: `pipeline.json` (a fitted TF-IDF vectorizer plus estimator)
//! and `labels.json` (the class index to language name table). They are loaded once and
//! shared read-only by every detection.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use langsniff::{LanguageDetector, ModelLoader};
//!
//! let loader = ModelLoader::from_dir("models/language-detection");
//! let detector = LanguageDetector::new(loader.load()?);
//!
//! let detection = detector.detect("The quick brown fox jumps over the lazy dog")?;
//! println!("Predicted language: {}", detection.predicted_label);
//! for confidence in &detection.ranked_confidences {
//!     println!("  {}: {:.1}%", confidence.label, confidence.probability * 100.0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Process-wide model
//!
//! [`detect`] uses a model loaded lazily from the default models directory
//! (see [`ModelManager::get_default_models_dir`]):
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detection = langsniff::detect("Der schnelle braune Fuchs springt über den faulen Hund")?;
//! println!("{}", detection);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod model_manager;
mod runtime;

use once_cell::sync::Lazy;

pub use artifact::SklearnPipeline;
pub use classifier::{
    ArtifactPaths, ArtifactSource, ClassifierError, ClassifierInfo, Confidence, Detection,
    LabelMapping, LanguageDetector, LoadedModel, ModelLoader, Pipeline, ProbabilisticClassifier,
    TextClassifier,
};
pub use config::DetectorConfig;
pub use model_manager::{ArtifactFile, ModelError, ModelInfo, ModelManager};
pub use runtime::{create_session_builder, RuntimeConfig};

static DEFAULT_LOADER: Lazy<ModelLoader> =
    Lazy::new(|| ModelLoader::new(ArtifactPaths::from_default_dir()));

/// The process-wide loader behind [`detect`].
pub fn default_loader() -> &'static ModelLoader {
    &DEFAULT_LOADER
}

/// Detects the language of `text` with the process-wide default model.
///
/// The model is loaded on first use; settings come from [`DetectorConfig::from_env`].
pub fn detect(text: &str) -> Result<Detection, ClassifierError> {
    let detector =
        LanguageDetector::with_config(DEFAULT_LOADER.load()?, DetectorConfig::from_env()?)?;
    detector.detect(text)
}

pub fn init_logger() {
    env_logger::init();
}
