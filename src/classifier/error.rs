use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while loading artifacts
/// or detecting the language of a text.
#[derive(Debug)]
pub enum ClassifierError {
    /// An artifact was missing, corrupt, or written by an incompatible version
    ArtifactLoad { artifact: String, reason: String },
    /// The pipeline emitted a class index the label mapping does not know about
    UnknownClassIndex { index: usize, num_classes: usize },
    /// The input exceeds the configured size cap
    InputTooLarge { len: usize, max: usize },
    /// The pipeline produced output that breaks its own contract
    InconsistentOutput(String),
    /// Error occurred while running the pipeline
    PredictionError(String),
    /// Error occurred due to invalid configuration values
    ConfigError(String),
}

impl ClassifierError {
    pub(crate) fn artifact(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactLoad {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that mean the loaded artifacts cannot be trusted.
    ///
    /// Fatal errors should stop the process; the rest are reported to the caller of a
    /// single request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ArtifactLoad { .. } | Self::UnknownClassIndex { .. } | Self::InconsistentOutput(_)
        )
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArtifactLoad { artifact, reason } => {
                write!(f, "Failed to load {} artifact: {}", artifact, reason)
            }
            Self::UnknownClassIndex { index, num_classes } => write!(
                f,
                "Unknown class index {} (label mapping has {} classes)",
                index, num_classes
            ),
            Self::InputTooLarge { len, max } => {
                write!(f, "Input too large: {} bytes (max: {})", len, max)
            }
            Self::InconsistentOutput(msg) => write!(f, "Inconsistent model output: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::artifact("estimator", err.to_string())
    }
}
