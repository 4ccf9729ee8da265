use std::cmp::Ordering;

use ndarray::Array1;

/// Absolute tolerance for a probability vector summing to one.
pub(crate) const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// Numerically stable softmax.
pub(crate) fn softmax(logits: &Array1<f32>) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Index of the largest value, lowest index on ties. `None` for an empty slice.
pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Checks that `probabilities` is a distribution over `num_classes` classes.
pub(crate) fn validate_probabilities(
    probabilities: &[f32],
    num_classes: usize,
) -> Result<(), String> {
    if probabilities.len() != num_classes {
        return Err(format!(
            "expected {} probabilities, got {}",
            num_classes,
            probabilities.len()
        ));
    }
    if let Some((i, p)) = probabilities
        .iter()
        .enumerate()
        .find(|(_, &p)| !(0.0..=1.0).contains(&p))
    {
        return Err(format!("probability {} for class {} is outside [0, 1]", p, i));
    }
    let sum: f32 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(format!("probabilities sum to {} instead of 1", sum));
    }
    Ok(())
}

/// Returns up to `k` class indices ordered by descending probability.
///
/// Ties go to `preferred` first (the class the pipeline predicted), then to the lower
/// class index. Probabilities are assumed to be validated, so NaN never reaches here.
pub(crate) fn rank_top_k(probabilities: &[f32], k: usize, preferred: Option<usize>) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probabilities.len()).collect();
    indices.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| (Some(b) == preferred).cmp(&(Some(a) == preferred)))
            .then_with(|| a.cmp(&b))
    });
    indices.truncate(k);
    indices
}
