//! Classifier predictions.

use serde::{Deserialize, Serialize};

/// Probability assigned to a single class by one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class label (e.g. "apple")
    #[serde(rename = "className")]
    pub label: String,

    /// Probability in [0, 1]
    pub probability: f32,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }

    /// Confidence as a percentage (probability * 100)
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}

/// Select the prediction with the highest probability.
///
/// Ties keep the first element in sequence order. Returns `None` for an
/// empty sequence.
pub fn best_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    let mut iter = predictions.iter();
    let mut best = iter.next()?;

    for candidate in iter {
        if candidate.probability > best.probability {
            best = candidate;
        }
    }

    Some(best)
}
