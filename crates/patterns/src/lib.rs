//! Deterministic, model-free detectors.
//!
//! - [`PatternEngine`]: regex rules for structured PII (emails, phones, ...)
//! - [`LexiconScorer`]: word-list sentiment used when no model is available
//! - [`HeuristicDetector`]: capitalization-based person/organization guesses
//!
//! Person/organization/location detection proper needs a model; the heuristic
//! only runs when a caller opts in.

mod heuristic;
mod lexicon;
mod rules;

pub use heuristic::{CapitalizedSequenceDetector, HeuristicDetector};
pub use lexicon::{LexiconScorer, NEGATIVE, NEUTRAL, POSITIVE};
pub use rules::{builtin_types, PatternEngine, PatternRule};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("invalid pattern for '{entity_type}': {message}")]
    InvalidPattern {
        entity_type: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, PatternError>;

/// Entity types with a built-in regex rule.
pub mod types {
    pub const EMAIL_ADDRESS: &str = "email_address";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const SSN: &str = "ssn";
    pub const CREDIT_CARD: &str = "credit_card";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const URL: &str = "url";
    pub const DATE: &str = "date";
    pub const IBAN: &str = "iban";

    /// Types that need a token-classification model (or the heuristic).
    pub const PERSON: &str = "person";
    pub const ORGANIZATION: &str = "organization";
    pub const LOCATION: &str = "location";
}
