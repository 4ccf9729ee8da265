use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{error, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;

use super::vectorizer::SparseVector;
use crate::classifier::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// An estimator exported to ONNX, run on the dense TF-IDF vector.
///
/// The model is expected to:
/// - Take one float input of shape [batch_size, n_features]
/// - Emit the predicted class index (int64, shape [batch_size]) as its first output
/// - Optionally emit class probabilities (float, shape [batch_size, n_classes]) as its
///   second output, i.e. an export without a ZipMap node
#[derive(Debug)]
pub struct OnnxEstimator {
    path: PathBuf,
    session: Session,
    input_name: String,
    n_features: usize,
    num_classes: usize,
    has_probabilities: bool,
}

impl OnnxEstimator {
    pub fn load(
        path: &Path,
        n_features: usize,
        num_classes: usize,
        config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::artifact(
                "estimator",
                format!("ONNX file not found: {}", path.display()),
            ));
        }
        if num_classes == 0 {
            return Err(ClassifierError::artifact("estimator", "num_classes must be positive"));
        }

        let session = create_session_builder(config)?.commit_from_file(path).map_err(|e| {
            error!("Failed to load ONNX estimator {:?}: {}", path, e);
            ClassifierError::from(e)
        })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ClassifierError::artifact("estimator", "ONNX model has no inputs"))?;
        if session.outputs.is_empty() {
            return Err(ClassifierError::artifact("estimator", "ONNX model has no outputs"));
        }
        let has_probabilities = session.outputs.len() >= 2;

        info!(
            "Loaded ONNX estimator {:?} (input '{}', probabilities: {})",
            path, input_name, has_probabilities
        );

        Ok(Self {
            path: path.to_path_buf(),
            session,
            input_name,
            n_features,
            num_classes,
            has_probabilities,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn has_probabilities(&self) -> bool {
        self.has_probabilities
    }

    fn input_tensor(&self, features: &SparseVector) -> Result<Tensor<f32>, ClassifierError> {
        let mut dense = Array2::<f32>::zeros((1, self.n_features));
        for &(j, value) in features.entries() {
            dense[[0, j]] = value;
        }
        Tensor::from_array(dense)
            .map_err(|e| {
                ClassifierError::PredictionError(format!("Failed to create input tensor: {}", e))
            })
    }

    pub fn predict(&self, features: &SparseVector) -> Result<usize, ClassifierError> {
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), self.input_tensor(features)?);

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to run model: {}", e)))?;
        let labels = outputs[0]
            .try_extract_tensor::<i64>()
            .map_err(|e| {
                ClassifierError::PredictionError(format!("Failed to extract label tensor: {}", e))
            })?;

        let label = labels
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ClassifierError::PredictionError("Label tensor is empty".into()))?;
        let index = usize::try_from(label).map_err(|_| {
            ClassifierError::InconsistentOutput(format!("negative class index {}", label))
        })?;
        if index >= self.num_classes {
            return Err(ClassifierError::UnknownClassIndex {
                index,
                num_classes: self.num_classes,
            });
        }
        Ok(index)
    }

    pub fn predict_proba(&self, features: &SparseVector) -> Result<Vec<f32>, ClassifierError> {
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), self.input_tensor(features)?);

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to run model: {}", e)))?;
        let probabilities = outputs[1].try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::PredictionError(format!("Failed to extract probability tensor: {}", e))
        })?;
        if probabilities.shape() != [1, self.num_classes] {
            return Err(ClassifierError::InconsistentOutput(format!(
                "probability tensor has shape {:?}, expected [1, {}]",
                probabilities.shape(),
                self.num_classes
            )));
        }

        Ok(probabilities.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MatMul + Add over 2 features and 3 classes, then ArgMax and Softmax:
    // logits = [2 * x0, 2 * x1, 0.5]
    const MODEL: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/onnx/estimator.onnx");

    fn features(entries: Vec<(usize, f32)>) -> SparseVector {
        SparseVector::from_entries(2, entries)
    }

    #[test]
    fn test_missing_model_file() {
        let missing = Path::new("/nonexistent/estimator.onnx");
        let err = OnnxEstimator::load(missing, 6, 4, &RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::ArtifactLoad { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_label_and_probabilities() -> Result<(), ClassifierError> {
        let estimator = OnnxEstimator::load(Path::new(MODEL), 2, 3, &RuntimeConfig::default())?;
        assert!(estimator.has_probabilities());

        let x = features(vec![(0, 2.0)]);
        assert_eq!(estimator.predict(&x)?, 0);
        let probs = estimator.predict_proba(&x)?;
        let expected = [0.95373, 0.01747, 0.0288];
        for (p, e) in probs.iter().zip(expected) {
            assert!((p - e).abs() < 1e-4, "{:?}", probs);
        }

        // Only the bias is left
        let empty = features(vec![]);
        assert_eq!(estimator.predict(&empty)?, 2);
        assert!((estimator.predict_proba(&empty)?[2] - 0.45186).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_outputs_beyond_declared_classes() -> Result<(), ClassifierError> {
        let estimator = OnnxEstimator::load(Path::new(MODEL), 2, 2, &RuntimeConfig::default())?;
        let empty = features(vec![]);

        assert!(matches!(
            estimator.predict(&empty),
            Err(ClassifierError::UnknownClassIndex { index: 2, num_classes: 2 })
        ));
        assert!(matches!(
            estimator.predict_proba(&empty),
            Err(ClassifierError::InconsistentOutput(_))
        ));
        Ok(())
    }
}
