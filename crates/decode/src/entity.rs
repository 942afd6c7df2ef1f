use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a candidate entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    Model,
    Pattern,
    Heuristic,
}

/// A labeled `[start_index, end_index)` char span of the original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub confidence: f32,
    pub source: EntitySource,
}

impl Entity {
    pub fn new(
        entity_type: impl Into<String>,
        text: impl Into<String>,
        start_index: usize,
        end_index: usize,
        confidence: f32,
        source: EntitySource,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            text: text.into(),
            start_index,
            end_index,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the span is non-empty and fits in a text of `text_len` chars.
    pub fn is_valid_for(&self, text_len: usize) -> bool {
        self.start_index < self.end_index && self.end_index <= text_len
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start_index < other.end_index && other.start_index < self.end_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Model,
    Lexicon,
}

/// One label for a whole input, with the score of every known label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
    pub scores: BTreeMap<String, f32>,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    pub fn score(&self, label: &str) -> Option<f32> {
        self.scores.get(label).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_serializes_type_field() {
        let e = Entity::new("email_address", "a@b.co", 0, 6, 0.85, EntitySource::Pattern);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "email_address");
        assert_eq!(json["startIndex"], 0);
        assert_eq!(json["endIndex"], 6);
        assert_eq!(json["source"], "pattern");
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = Entity::new("x", "", 0, 5, 1.0, EntitySource::Model);
        let b = Entity::new("x", "", 5, 8, 1.0, EntitySource::Model);
        let c = Entity::new("x", "", 4, 6, 1.0, EntitySource::Model);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_confidence_clamped() {
        let e = Entity::new("x", "", 0, 1, 1.7, EntitySource::Model);
        assert_eq!(e.confidence, 1.0);
    }
}
