//! Brain MRI classification: preprocessing, classifiers and result rendering.
//!
//! This crate provides:
//! - [`preprocess`]: image decoding and 224x224 normalization
//! - [`demo`]: the simulated classifier
//! - [`cnn`]: the candle convolutional network
//! - [`samples`]: synthetic demo scans
//! - [`render`]: CLI, quiet and export text

pub mod classes;
pub mod cnn;
pub mod demo;
pub mod prediction;
pub mod preprocess;
pub mod render;
pub mod samples;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use lookout_shared::{LookoutError, Result};

pub use classes::{TumorClass, TumorInfo, tumor_info};
pub use cnn::CnnClassifier;
pub use demo::SimulatedClassifier;
pub use prediction::{Classifier, Prediction};
pub use preprocess::{INPUT_SIZE, PreparedImage, load_image_bytes, load_image_path, prepare};
pub use render::{DISCLAIMER, render_cli, render_export, render_quiet};
pub use samples::SampleKind;

/// Which classifier to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Demo,
    Cnn,
}

impl FromStr for Mode {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "demo" => Ok(Self::Demo),
            "cnn" => Ok(Self::Cnn),
            other => Err(LookoutError::validation(format!(
                "unknown mode '{other}' (expected demo or cnn)"
            ))),
        }
    }
}

/// Build the classifier for `mode`. CNN mode without weights falls back to
/// random demo weights.
pub fn build_classifier(mode: Mode, weights: Option<&Path>) -> Result<Arc<dyn Classifier>> {
    Ok(match (mode, weights) {
        (Mode::Demo, _) => Arc::new(SimulatedClassifier::new()),
        (Mode::Cnn, Some(path)) => Arc::new(CnnClassifier::from_weights(path)?),
        (Mode::Cnn, None) => Arc::new(CnnClassifier::random()?),
    })
}

/// Decode, prepare and classify raw image bytes.
pub fn classify_bytes(classifier: &dyn Classifier, bytes: &[u8]) -> Result<Prediction> {
    let image = load_image_bytes(bytes)?;
    classifier.predict(&prepare(&image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse() {
        assert_eq!("cnn".parse::<Mode>().unwrap(), Mode::Cnn);
        assert!("tf".parse::<Mode>().is_err());
    }

    #[test]
    fn demo_mode_classifies_a_sample() {
        let classifier = build_classifier(Mode::Demo, None).unwrap();
        assert_eq!(classifier.name(), "demo");
        let png = samples::to_png(&samples::generate(SampleKind::Normal, Some(5))).unwrap();
        let prediction = classify_bytes(classifier.as_ref(), &png).unwrap();
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 100.0).abs() < 1e-3);
    }
}
