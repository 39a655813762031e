//! Simulated classifier for demos without model weights.
//!
//! Scores are a Dirichlet(1, 1, 1, 1) draw nudged by image brightness. They
//! carry no diagnostic meaning.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lookout_shared::{LookoutError, Result};

use crate::classes::TumorClass;
use crate::prediction::{Classifier, Prediction};
use crate::preprocess::PreparedImage;

/// Compared against the normalized [0,1] gray mean, not a 0-255 mean, so
/// only genuinely dark or bright scans get a bias.
const DARK_THRESHOLD: f32 = 0.3;
/// Same [0,1] scale as [`DARK_THRESHOLD`].
const BRIGHT_THRESHOLD: f32 = 0.7;

pub struct SimulatedClassifier {
    rng: Mutex<StdRng>,
}

impl SimulatedClassifier {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible scores for tests and fixed demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw from a flat Dirichlet over four classes (normalized Exp(1) samples).
fn flat_dirichlet(rng: &mut impl Rng) -> [f32; 4] {
    let mut draws = [0.0f64; 4];
    for d in &mut draws {
        // 1 - U lies in (0, 1], so the log is finite
        *d = -(1.0 - rng.r#gen::<f64>()).ln();
    }
    normalize(draws)
}

fn normalize(values: [f64; 4]) -> [f32; 4] {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return [0.25; 4];
    }
    values.map(|v| (v / sum) as f32)
}

/// Apply the brightness nudge and renormalize.
pub fn bias_by_brightness(base: [f32; 4], brightness: f32) -> [f32; 4] {
    let mut probs = base.map(f64::from);
    let glioma = TumorClass::Glioma.index();
    let no_tumor = TumorClass::NoTumor.index();

    if brightness < DARK_THRESHOLD {
        probs[glioma] *= 1.5;
        probs[no_tumor] *= 0.7;
    } else if brightness > BRIGHT_THRESHOLD {
        probs[no_tumor] *= 1.8;
        probs[glioma] *= 0.6;
    }
    normalize(probs)
}

impl Classifier for SimulatedClassifier {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn predict(&self, image: &PreparedImage) -> Result<Prediction> {
        let base = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| LookoutError::Inference("demo RNG lock poisoned".into()))?;
            flat_dirichlet(&mut *rng)
        };
        let probs = bias_by_brightness(base, image.brightness());
        Prediction::from_probabilities(&probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f32) -> PreparedImage {
        PreparedImage {
            size: 4,
            data: vec![value; 4 * 4 * 3],
        }
    }

    #[test]
    fn probabilities_sum_to_one_hundred() {
        let classifier = SimulatedClassifier::seeded(7);
        for value in [0.1, 0.5, 0.9] {
            let p = classifier.predict(&flat(value)).unwrap();
            let total: f32 = p.probabilities.iter().sum();
            assert!((total - 100.0).abs() < 1e-3, "total {total}");
            let top = p
                .scores()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(c, _)| c)
                .unwrap();
            assert_eq!(top, p.class);
            assert_eq!(p.confidence, p.probability(p.class));
        }
    }

    #[test]
    fn seeded_runs_repeat() {
        let a = SimulatedClassifier::seeded(42).predict(&flat(0.5)).unwrap();
        let b = SimulatedClassifier::seeded(42).predict(&flat(0.5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dark_images_favor_glioma() {
        let biased = bias_by_brightness([0.25; 4], 0.1);
        assert!(biased[0] > biased[1]);
        assert!(biased[2] < biased[1]);
        let sum: f32 = biased.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bright_images_favor_no_tumor() {
        let biased = bias_by_brightness([0.25; 4], 0.9);
        assert!(biased[2] > biased[3]);
        assert!(biased[0] < biased[3]);
    }

    #[test]
    fn mid_brightness_is_unchanged() {
        let base = [0.1, 0.2, 0.3, 0.4];
        let out = bias_by_brightness(base, 0.5);
        for (a, b) in base.iter().zip(out) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
