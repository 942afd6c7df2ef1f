//! Regex rules for structured PII.

use crate::types::*;
use crate::{PatternError, Result};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use veil_decode::offset::OffsetMap;
use veil_decode::{Entity, EntitySource, PATTERN_CONFIDENCE};

/// Compiled size cap for caller-supplied patterns.
const CUSTOM_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// One named rule. Matches are optionally post-checked by `validate`.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub entity_type: String,
    regex: Regex,
    validate: Option<fn(&str) -> bool>,
    builtin: bool,
}

impl PatternRule {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

fn builtin(entity_type: &str, pattern: &str, validate: Option<fn(&str) -> bool>) -> PatternRule {
    PatternRule {
        entity_type: entity_type.to_string(),
        regex: Regex::new(pattern).expect("built-in pattern is valid"),
        validate,
        builtin: true,
    }
}

// Order matters only for candidates with the same start offset.
static BUILTIN_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    vec![
        builtin(
            EMAIL_ADDRESS,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            None,
        ),
        builtin(
            URL,
            r#"\b(?:https?://|www\.)[^\s<>"']*[^\s<>"'.,;:!?)\]]"#,
            None,
        ),
        builtin(SSN, r"\b\d{3}-\d{2}-\d{4}\b", None),
        builtin(
            CREDIT_CARD,
            r"\b(?:\d[ -]?){12,18}\d\b",
            Some(passes_luhn),
        ),
        builtin(
            IBAN,
            r"\b[A-Z]{2}\d{2}(?: ?[A-Z0-9]{4}){2,7}(?: ?[A-Z0-9]{1,3})?\b",
            None,
        ),
        builtin(
            PHONE_NUMBER,
            r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
            None,
        ),
        builtin(
            IP_ADDRESS,
            r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            Some(is_ipv4),
        ),
        builtin(
            DATE,
            r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4}|(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:,\s*\d{4})?)\b",
            None,
        ),
    ]
});

/// Entity types covered by a built-in rule.
pub fn builtin_types() -> Vec<&'static str> {
    vec![
        EMAIL_ADDRESS,
        URL,
        SSN,
        CREDIT_CARD,
        IBAN,
        PHONE_NUMBER,
        IP_ADDRESS,
        DATE,
    ]
}

fn passes_luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn is_ipv4(candidate: &str) -> bool {
    candidate
        .split('.')
        .all(|octet| octet.parse::<u16>().is_ok_and(|v| v <= 255))
}

/// Built-in plus caller-registered regex rules.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    rules: Vec<PatternRule>,
}

impl PatternEngine {
    /// Engine with every built-in rule.
    pub fn new() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    /// Engine with no rules; custom rules only.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a custom rule. The pattern is compiled now so bad input is
    /// rejected here, never at match time.
    pub fn register(&mut self, entity_type: &str, pattern: &str) -> Result<()> {
        let entity_type = entity_type.trim();
        if entity_type.is_empty() {
            return Err(PatternError::InvalidPattern {
                entity_type: entity_type.to_string(),
                message: "entity type must not be empty".to_string(),
            });
        }
        let regex = RegexBuilder::new(pattern)
            .size_limit(CUSTOM_PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| PatternError::InvalidPattern {
                entity_type: entity_type.to_string(),
                message: e.to_string(),
            })?;
        if regex.is_match("") {
            return Err(PatternError::InvalidPattern {
                entity_type: entity_type.to_string(),
                message: "pattern matches the empty string".to_string(),
            });
        }

        tracing::debug!(entity_type, pattern, "Registered custom pattern");
        self.rules.push(PatternRule {
            entity_type: entity_type.to_string(),
            regex,
            validate: None,
            builtin: false,
        });
        Ok(())
    }

    /// Remove custom rules for `entity_type`. Returns how many were removed.
    pub fn remove_custom(&mut self, entity_type: &str) -> usize {
        let before = self.rules.len();
        self.rules
            .retain(|r| r.builtin || r.entity_type != entity_type);
        before - self.rules.len()
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Distinct entity types this engine can produce.
    pub fn supported_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !types.contains(&rule.entity_type.as_str()) {
                types.push(&rule.entity_type);
            }
        }
        types
    }

    pub fn supports(&self, entity_type: &str) -> bool {
        self.rules.iter().any(|r| r.entity_type == entity_type)
    }

    /// Run every rule whose type passes `is_enabled`.
    ///
    /// Results are sorted by start offset and may overlap; overlap resolution
    /// happens when candidates from all sources are merged.
    pub fn detect<F>(&self, text: &str, is_enabled: F) -> Vec<Entity>
    where
        F: Fn(&str) -> bool,
    {
        let offsets = OffsetMap::new(text);
        let mut entities = Vec::new();

        for rule in self.rules.iter().filter(|r| is_enabled(&r.entity_type)) {
            for m in rule.regex.find_iter(text) {
                if m.is_empty() {
                    continue;
                }
                if let Some(validate) = rule.validate {
                    if !validate(m.as_str()) {
                        continue;
                    }
                }
                entities.push(Entity::new(
                    rule.entity_type.clone(),
                    m.as_str(),
                    offsets.byte_to_char(m.start()),
                    offsets.byte_to_char(m.end()),
                    PATTERN_CONFIDENCE,
                    EntitySource::Pattern,
                ));
            }
        }

        entities.sort_by_key(|e| e.start_index);
        entities
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}
