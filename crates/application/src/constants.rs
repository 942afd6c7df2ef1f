/// Largest batch accepted by `detect_batch` / `analyze_batch`.
pub const MAX_BATCH_SIZE: usize = 100;

/// Default minimum confidence for entity candidates.
pub const DEFAULT_ENTITY_MIN_CONFIDENCE: f32 = 0.5;

/// Default minimum confidence for a sentiment label to be reported.
pub const DEFAULT_SENTIMENT_MIN_CONFIDENCE: f32 = 0.6;

/// Default number of cached sentiment results.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

pub const DEFAULT_REDACTION_CHAR: char = '*';
