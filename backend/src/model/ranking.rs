use shared::Prediction;

use super::backend::InferenceError;
use super::labels::Labels;

/// Turns raw per-class scores into at most `k` predictions, highest
/// confidence first. Ties keep class order.
pub fn top_k(scores: &[f32], labels: &Labels, k: usize) -> Result<Vec<Prediction>, InferenceError> {
    if scores.len() != labels.len() {
        return Err(InferenceError::OutputSize {
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(InferenceError::NonFinite(index));
    }

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);

    ranked
        .into_iter()
        .map(|(index, score)| {
            let label = labels.get(index).ok_or(InferenceError::OutputSize {
                scores: scores.len(),
                labels: labels.len(),
            })?;
            Ok(Prediction {
                label: label.to_string(),
                confidence: score.clamp(0.0, 1.0),
            })
        })
        .collect()
}
