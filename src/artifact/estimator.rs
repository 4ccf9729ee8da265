use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::Deserialize;

use super::onnx::OnnxEstimator;
use super::vectorizer::SparseVector;
use crate::classifier::utils::{argmax, sigmoid, softmax};
use crate::classifier::ClassifierError;
use crate::runtime::RuntimeConfig;

/// How a multiclass logistic regression turns decision values into probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiClass {
    /// Softmax over all decision values
    #[default]
    Multinomial,
    /// One-vs-rest: a sigmoid per class, normalized to sum to one
    Ovr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingKind {
    Soft,
    Hard,
}

/// Serialized form of a fitted estimator, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum EstimatorArtifact {
    LogisticRegression {
        coef: Vec<Vec<f32>>,
        intercept: Vec<f32>,
        #[serde(default)]
        multi_class: MultiClass,
    },
    MultinomialNb {
        feature_log_prob: Vec<Vec<f32>>,
        class_log_prior: Vec<f32>,
    },
    LinearSvc {
        coef: Vec<Vec<f32>>,
        intercept: Vec<f32>,
    },
    Voting {
        voting: VotingKind,
        estimators: Vec<EstimatorArtifact>,
        #[serde(default)]
        weights: Option<Vec<f32>>,
    },
    Onnx {
        path: PathBuf,
        num_classes: usize,
    },
}

/// Weights and biases of a linear decision function `W·x + b`.
///
/// A single weight row is the binary form: its one decision value scores class 1
/// against class 0.
#[derive(Debug)]
pub struct LinearModel {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearModel {
    fn new(
        rows: Vec<Vec<f32>>,
        bias: Vec<f32>,
        n_features: usize,
        what: &str,
    ) -> Result<Self, ClassifierError> {
        if rows.is_empty() {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!("{} has no coefficient rows", what),
            ));
        }
        if rows.len() != bias.len() {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!(
                    "{} has {} coefficient rows but {} intercepts",
                    what,
                    rows.len(),
                    bias.len()
                ),
            ));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != n_features) {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!(
                    "{} coefficient row has {} columns, expected {}",
                    what,
                    row.len(),
                    n_features
                ),
            ));
        }

        let n_rows = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((n_rows, n_features), flat)
            .map_err(|e| ClassifierError::artifact("pipeline", format!("{}: {}", what, e)))?;

        Ok(Self {
            weights,
            bias: Array1::from_vec(bias),
        })
    }

    fn is_binary(&self) -> bool {
        self.weights.nrows() == 1
    }

    fn num_classes(&self) -> usize {
        if self.is_binary() {
            2
        } else {
            self.weights.nrows()
        }
    }

    fn decision(&self, features: &SparseVector) -> Array1<f32> {
        let mut scores = self.bias.clone();
        for &(j, value) in features.entries() {
            scores.scaled_add(value, &self.weights.column(j));
        }
        scores
    }

    /// Index of the winning class under the decision function alone.
    fn decide(&self, features: &SparseVector) -> usize {
        let scores = self.decision(features);
        if self.is_binary() {
            usize::from(scores[0] > 0.0)
        } else {
            argmax(scores.as_slice().unwrap_or_default()).unwrap_or(0)
        }
    }
}

/// A fitted estimator operating on TF-IDF feature vectors.
#[derive(Debug)]
pub enum Estimator {
    LogisticRegression {
        model: LinearModel,
        multi_class: MultiClass,
    },
    MultinomialNb(LinearModel),
    LinearSvc(LinearModel),
    Voting {
        kind: VotingKind,
        members: Vec<Estimator>,
        weights: Vec<f32>,
    },
    Onnx(OnnxEstimator),
}

impl Estimator {
    pub(crate) fn from_artifact(
        artifact: EstimatorArtifact,
        n_features: usize,
        base_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let estimator = match artifact {
            EstimatorArtifact::LogisticRegression {
                coef,
                intercept,
                multi_class,
            } => Self::LogisticRegression {
                model: LinearModel::new(coef, intercept, n_features, "logistic_regression")?,
                multi_class,
            },
            EstimatorArtifact::MultinomialNb {
                feature_log_prob,
                class_log_prior,
            } => {
                let model = LinearModel::new(
                    feature_log_prob,
                    class_log_prior,
                    n_features,
                    "multinomial_nb",
                )?;
                if model.is_binary() {
                    return Err(ClassifierError::artifact(
                        "pipeline",
                        "multinomial_nb needs one feature_log_prob row per class",
                    ));
                }
                Self::MultinomialNb(model)
            }
            EstimatorArtifact::LinearSvc { coef, intercept } => {
                Self::LinearSvc(LinearModel::new(coef, intercept, n_features, "linear_svc")?)
            }
            EstimatorArtifact::Voting {
                voting,
                estimators,
                weights,
            } => Self::voting(voting, estimators, weights, n_features, base_dir, runtime)?,
            EstimatorArtifact::Onnx { path, num_classes } => {
                let path = if path.is_absolute() { path } else { base_dir.join(path) };
                Self::Onnx(OnnxEstimator::load(&path, n_features, num_classes, runtime)?)
            }
        };
        Ok(estimator)
    }

    fn voting(
        kind: VotingKind,
        artifacts: Vec<EstimatorArtifact>,
        weights: Option<Vec<f32>>,
        n_features: usize,
        base_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        if artifacts.is_empty() {
            return Err(ClassifierError::artifact("pipeline", "voting ensemble has no estimators"));
        }
        let members = artifacts
            .into_iter()
            .map(|a| Self::from_artifact(a, n_features, base_dir, runtime))
            .collect::<Result<Vec<_>, _>>()?;

        let num_classes = members[0].num_classes();
        if members.iter().any(|m| m.num_classes() != num_classes) {
            return Err(ClassifierError::artifact(
                "pipeline",
                "voting ensemble members disagree on the number of classes",
            ));
        }
        if kind == VotingKind::Soft && !members.iter().all(Estimator::supports_probabilities) {
            return Err(ClassifierError::artifact(
                "pipeline",
                "soft voting needs every member to produce probabilities",
            ));
        }

        let weights = weights.unwrap_or_else(|| vec![1.0; members.len()]);
        if weights.len() != members.len() {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!("voting has {} weights for {} estimators", weights.len(), members.len()),
            ));
        }
        if weights.iter().any(|&w| w < 0.0) || weights.iter().sum::<f32>() <= 0.0 {
            return Err(ClassifierError::artifact(
                "pipeline",
                "voting weights must be non-negative with a positive sum",
            ));
        }

        Ok(Self::Voting { kind, members, weights })
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Self::LogisticRegression { model: m, .. }
            | Self::MultinomialNb(m)
            | Self::LinearSvc(m) => m.num_classes(),
            Self::Voting { members, .. } => members[0].num_classes(),
            Self::Onnx(onnx) => onnx.num_classes(),
        }
    }

    pub fn supports_probabilities(&self) -> bool {
        match self {
            Self::LogisticRegression { .. } | Self::MultinomialNb(_) => true,
            Self::LinearSvc(_) => false,
            Self::Voting { kind, .. } => *kind == VotingKind::Soft,
            Self::Onnx(onnx) => onnx.has_probabilities(),
        }
    }

    /// Predicted class index.
    ///
    /// Scoring estimators take the argmax of their own probabilities so the prediction
    /// always ranks first in `predict_proba`.
    pub fn predict(&self, features: &SparseVector) -> Result<usize, ClassifierError> {
        if self.supports_probabilities() {
            let probabilities = self.predict_proba(features)?;
            return argmax(&probabilities).ok_or_else(|| {
                ClassifierError::PredictionError("estimator produced no probabilities".into())
            });
        }

        match self {
            Self::LinearSvc(m) => Ok(m.decide(features)),
            Self::Voting { members, weights, .. } => {
                let mut votes = vec![0.0f32; self.num_classes()];
                let num_classes = votes.len();
                for (member, &weight) in members.iter().zip(weights) {
                    let index = member.predict(features)?;
                    let slot = votes
                        .get_mut(index)
                        .ok_or(ClassifierError::UnknownClassIndex { index, num_classes })?;
                    *slot += weight;
                }
                argmax(&votes)
                    .ok_or_else(|| ClassifierError::PredictionError("no votes cast".into()))
            }
            Self::Onnx(onnx) => onnx.predict(features),
            Self::LogisticRegression { model: m, .. } | Self::MultinomialNb(m) => {
                Ok(m.decide(features))
            }
        }
    }

    /// Probability of every class, in class-index order.
    pub fn predict_proba(&self, features: &SparseVector) -> Result<Vec<f32>, ClassifierError> {
        match self {
            Self::LogisticRegression { model, multi_class } => {
                let scores = model.decision(features);
                if model.is_binary() {
                    let p = sigmoid(scores[0]);
                    return Ok(vec![1.0 - p, p]);
                }
                match multi_class {
                    MultiClass::Multinomial => Ok(softmax(&scores)),
                    MultiClass::Ovr => {
                        let odds = scores.mapv(sigmoid);
                        let total = odds.sum();
                        Ok((odds / total).to_vec())
                    }
                }
            }
            // The joint log-likelihood normalizes to probabilities the same way.
            Self::MultinomialNb(m) => Ok(softmax(&m.decision(features))),
            Self::Voting {
                kind: VotingKind::Soft,
                members,
                weights,
            } => {
                let total: f32 = weights.iter().sum();
                let mut average = Array1::<f32>::zeros(self.num_classes());
                for (member, &weight) in members.iter().zip(weights) {
                    let probabilities = Array1::from_vec(member.predict_proba(features)?);
                    if probabilities.len() != average.len() {
                        return Err(ClassifierError::InconsistentOutput(format!(
                            "voting member returned {} probabilities, expected {}",
                            probabilities.len(),
                            average.len()
                        )));
                    }
                    average.scaled_add(weight / total, &probabilities);
                }
                Ok(average.to_vec())
            }
            Self::Onnx(onnx) if onnx.has_probabilities() => onnx.predict_proba(features),
            _ => Err(ClassifierError::PredictionError(
                "estimator does not produce probabilities".into(),
            )),
        }
    }
}
