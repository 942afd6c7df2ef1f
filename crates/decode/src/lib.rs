//! Turns model output into labeled character spans and label distributions,
//! reconciles candidates from several sources, and applies redaction.
//!
//! All offsets are `char` indices into the original text, half-open.

mod entity;
mod merge;
pub mod offset;
mod redact;
mod sequence;
mod token;

pub use entity::{ClassificationResult, ClassificationSource, Entity, EntitySource};
pub use merge::{has_overlaps, resolve_overlaps};
pub use redact::{redact, RedactionStyle};
pub use sequence::{argmax, decode_sequence_classification, softmax};
pub use token::{decode_token_classification, normalize_label, MERGE_GAP_CHARS};

/// Confidence assigned to every span produced by a token-classification model.
pub const ML_CONFIDENCE: f32 = 0.9;

/// Confidence assigned to regex matches.
pub const PATTERN_CONFIDENCE: f32 = 0.85;

/// Confidence assigned to heuristic (model-free) name/organization guesses.
pub const HEURISTIC_CONFIDENCE: f32 = 0.6;
