//! Text renderings of a prediction for the terminal and for export.

use crate::classes::tumor_info;
use crate::prediction::Prediction;

/// Shown with every result.
pub const DISCLAIMER: [&str; 3] = [
    "This AI tool is for educational purposes only.",
    "DO NOT use as substitute for professional medical diagnosis.",
    "Always consult qualified healthcare professionals.",
];

const WIDE_RULE: &str = "============================================================";
const RULE: &str = "----------------------------------------";

/// Full terminal report; `detailed` adds the class reference text.
pub fn render_cli(prediction: &Prediction, detailed: bool) -> String {
    let mut out = Vec::new();
    out.push(String::new());
    out.push(WIDE_RULE.to_string());
    out.push("BRAIN TUMOR DETECTION RESULTS".to_string());
    out.push(WIDE_RULE.to_string());

    if prediction.class.is_tumor() {
        out.push(format!("RESULT: {} Detected", prediction.class));
    } else {
        out.push(format!("RESULT: {}", prediction.class));
    }
    out.push(format!("CONFIDENCE: {:.2}%", prediction.confidence));

    out.push(String::new());
    out.push("CLASSIFICATION SCORES:".to_string());
    out.push(RULE.to_string());
    for (class, prob) in prediction.scores() {
        let mark = if class == prediction.class { "✓" } else { " " };
        out.push(format!("{mark} {:<12}: {prob:6.2}%", class.name()));
    }

    if detailed {
        let info = tumor_info(prediction.class);
        out.push(String::new());
        out.push("TUMOR INFORMATION:".to_string());
        out.push(RULE.to_string());
        out.push(format!("Description: {}", info.description));
        out.push(format!("Severity:    {}", info.severity));
        out.push(format!("Treatment:   {}", info.treatment));
        out.push(format!("Prognosis:   {}", info.prognosis));
    }

    out.push(String::new());
    out.push("MEDICAL DISCLAIMER:".to_string());
    out.push(RULE.to_string());
    out.extend(DISCLAIMER.iter().map(|l| l.to_string()));
    out.push(WIDE_RULE.to_string());
    out.join("\n")
}

/// One line: `<class>: <confidence>%`.
pub fn render_quiet(prediction: &Prediction) -> String {
    format!("{}: {:.1}%", prediction.class, prediction.confidence)
}

/// Plain-text results file for `--output` and the web export.
pub fn render_export(prediction: &Prediction, image_label: &str) -> String {
    let mut out = format!(
        "Brain Tumor Detection Results\n\
         Image: {image_label}\n\
         Predicted Class: {}\n\
         Confidence: {:.2}%\n\n\
         All Probabilities:\n",
        prediction.class, prediction.confidence
    );
    for (class, prob) in prediction.scores() {
        out.push_str(&format!("  {class}: {prob:.2}%\n"));
    }
    out
}
