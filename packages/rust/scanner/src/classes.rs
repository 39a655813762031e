//! The four MRI classes and their reference information.

use serde::Serialize;

/// Output classes, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TumorClass {
    Glioma,
    Meningioma,
    NoTumor,
    Pituitary,
}

impl TumorClass {
    /// Every class, indexed like the model's probability vector.
    pub const ALL: [TumorClass; 4] = [
        TumorClass::Glioma,
        TumorClass::Meningioma,
        TumorClass::NoTumor,
        TumorClass::Pituitary,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name, e.g. `No Tumor`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Glioma => "Glioma",
            Self::Meningioma => "Meningioma",
            Self::NoTumor => "No Tumor",
            Self::Pituitary => "Pituitary",
        }
    }

    pub fn is_tumor(self) -> bool {
        self != Self::NoTumor
    }
}

impl std::fmt::Display for TumorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference text shown next to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TumorInfo {
    pub description: &'static str,
    pub severity: &'static str,
    pub treatment: &'static str,
    pub prognosis: &'static str,
}

pub fn tumor_info(class: TumorClass) -> &'static TumorInfo {
    match class {
        TumorClass::Glioma => &TumorInfo {
            description: "Gliomas are tumors that arise from glial cells in the brain. \
                          They are the most common type of primary brain tumor.",
            severity: "High",
            treatment: "Surgery, radiation therapy, chemotherapy",
            prognosis: "Varies by grade and subtype",
        },
        TumorClass::Meningioma => &TumorInfo {
            description: "Meningiomas are tumors that develop from the meninges, \
                          the membranes surrounding the brain and spinal cord.",
            severity: "Low to Moderate",
            treatment: "Surgery, radiation therapy for aggressive types",
            prognosis: "Generally good, most are benign",
        },
        TumorClass::NoTumor => &TumorInfo {
            description: "No tumor detected in the MRI scan.",
            severity: "None",
            treatment: "No treatment required",
            prognosis: "Excellent",
        },
        TumorClass::Pituitary => &TumorInfo {
            description: "Pituitary tumors develop in the pituitary gland, \
                          which controls hormone production.",
            severity: "Low to Moderate",
            treatment: "Medication, surgery, radiation therapy",
            prognosis: "Generally good with appropriate treatment",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matches_index() {
        for (i, class) in TumorClass::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
            assert_eq!(TumorClass::from_index(i), Some(*class));
        }
        assert_eq!(TumorClass::from_index(4), None);
    }

    #[test]
    fn names_and_info() {
        assert_eq!(TumorClass::NoTumor.to_string(), "No Tumor");
        assert!(!TumorClass::NoTumor.is_tumor());
        assert_eq!(tumor_info(TumorClass::Glioma).severity, "High");
        assert!(
            tumor_info(TumorClass::Meningioma)
                .description
                .contains("the membranes surrounding the brain")
        );
    }
}
