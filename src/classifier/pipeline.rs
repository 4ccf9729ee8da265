use std::fmt;
use std::sync::Arc;

use super::error::ClassifierError;

/// A fitted pipeline that maps raw text to a single class index.
///
/// Implementations must be pure: the same text always yields the same index, and
/// classifying never mutates shared state. Class indices are dense in
/// `0..num_classes()`.
pub trait TextClassifier: Send + Sync + fmt::Debug {
    /// Number of classes this pipeline can emit.
    fn num_classes(&self) -> usize;

    /// Predicts the class index of `text`.
    fn classify(&self, text: &str) -> Result<usize, ClassifierError>;
}

/// A pipeline that can also report a probability for every class.
///
/// `score` returns one probability per class, in class-index order, summing to one.
/// `classify` must agree with `score`: the predicted class has the highest probability.
pub trait ProbabilisticClassifier: TextClassifier {
    fn score(&self, text: &str) -> Result<Vec<f32>, ClassifierError>;
}

/// A loaded pipeline together with its capability, decided once at load time.
#[derive(Debug, Clone)]
pub enum Pipeline {
    /// Only predicts a label
    LabelOnly(Arc<dyn TextClassifier>),
    /// Predicts a label and a probability distribution over all classes
    Scoring(Arc<dyn ProbabilisticClassifier>),
}

impl Pipeline {
    pub fn label_only<C: TextClassifier + 'static>(classifier: C) -> Self {
        Self::LabelOnly(Arc::new(classifier))
    }

    pub fn scoring<C: ProbabilisticClassifier + 'static>(classifier: C) -> Self {
        Self::Scoring(Arc::new(classifier))
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Self::LabelOnly(inner) => inner.num_classes(),
            Self::Scoring(inner) => inner.num_classes(),
        }
    }

    pub fn supports_scoring(&self) -> bool {
        matches!(self, Self::Scoring(_))
    }

    pub fn classify(&self, text: &str) -> Result<usize, ClassifierError> {
        match self {
            Self::LabelOnly(inner) => inner.classify(text),
            Self::Scoring(inner) => inner.classify(text),
        }
    }

    /// Probabilities for `text`, or `None` for a label-only pipeline.
    pub fn score(&self, text: &str) -> Option<Result<Vec<f32>, ClassifierError>> {
        match self {
            Self::LabelOnly(_) => None,
            Self::Scoring(inner) => Some(inner.score(text)),
        }
    }
}
