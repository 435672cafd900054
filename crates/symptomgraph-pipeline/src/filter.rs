use symptomgraph_core::{Concept, SIGN_OR_SYMPTOM};

/// Terminal predicate: keeps concepts whose first semantic type equals the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomFilter {
    label: String,
}

impl SymptomFilter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn accepts(&self, concept: &Concept) -> bool {
        concept.primary_semantic_type() == Some(self.label.as_str())
    }
}

impl Default for SymptomFilter {
    fn default() -> Self {
        Self::new(SIGN_OR_SYMPTOM)
    }
}
