//! Classifier output and the [`Classifier`] seam.

use serde::Serialize;

use lookout_shared::{LookoutError, Result};

use crate::classes::TumorClass;
use crate::preprocess::PreparedImage;

/// A classification with percentages over [`TumorClass::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: TumorClass,
    /// Probability of `class`, in percent.
    pub confidence: f32,
    /// Per-class probabilities in percent, indexed like [`TumorClass::ALL`].
    pub probabilities: [f32; 4],
}

impl Prediction {
    /// Build from a probability vector (fractions, one per class).
    pub fn from_probabilities(probs: &[f32]) -> Result<Self> {
        let probs: [f32; 4] = probs.try_into().map_err(|_| {
            LookoutError::Inference(format!("expected 4 probabilities, got {}", probs.len()))
        })?;
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(LookoutError::Inference(format!(
                "invalid probabilities: {probs:?}"
            )));
        }

        let (best, _) = probs
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
        let class = TumorClass::from_index(best)
            .ok_or_else(|| LookoutError::Inference(format!("class index {best} out of range")))?;

        let probabilities = probs.map(|p| p * 100.0);
        Ok(Self {
            class,
            confidence: probabilities[best],
            probabilities,
        })
    }

    pub fn probability(&self, class: TumorClass) -> f32 {
        self.probabilities[class.index()]
    }

    /// `(class, percent)` pairs in class order.
    pub fn scores(&self) -> impl Iterator<Item = (TumorClass, f32)> + '_ {
        TumorClass::ALL.iter().map(|&c| (c, self.probability(c)))
    }
}

/// Anything that can score a prepared image.
pub trait Classifier: Send + Sync {
    /// Short mode name (`demo`, `cnn`).
    fn name(&self) -> &'static str;
    fn predict(&self, image: &PreparedImage) -> Result<Prediction>;
}
