//! Model-free guesses for name-like entities.

use crate::types::{ORGANIZATION, PERSON};
use veil_decode::{Entity, EntitySource, HEURISTIC_CONFIDENCE};

/// A detector that needs no model artifacts.
pub trait HeuristicDetector: Send + Sync {
    fn name(&self) -> &str;

    fn supported_types(&self) -> &[&'static str];

    /// Candidate entities for every type passing `is_enabled`, sorted by start.
    fn detect(&self, text: &str, is_enabled: &dyn Fn(&str) -> bool) -> Vec<Entity>;
}

const ORG_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "llc", "ltd", "limited", "co", "company", "plc", "gmbh", "ag",
    "group", "holdings", "foundation", "university", "institute", "bank",
];

/// Suffixes written with a trailing period that belongs to the entity.
const ABBREVIATED_SUFFIXES: &[&str] = &["inc", "corp", "ltd", "co"];

const TITLES: &[&str] = &["mr", "mrs", "ms", "dr", "prof"];

/// Capitalized words that start sentences or requests, never names.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "ask", "this", "that", "these", "those", "it", "he", "she", "we", "they", "i",
    "in", "on", "at", "to", "for", "from", "by", "with", "and", "but", "or", "if", "please",
    "contact", "call", "email", "dear", "hi", "hello", "thanks", "thank", "regards", "see",
    "note", "today", "yesterday", "tomorrow", "monday", "tuesday", "wednesday", "thursday",
    "friday", "saturday", "sunday",
];

const MAX_PERSON_WORDS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl Word<'_> {
    fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    fn is_capitalized(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }

    fn is_title(&self) -> bool {
        TITLES.contains(&self.lower().as_str())
    }
}

/// Split into alphanumeric words with char offsets.
fn words(text: &str) -> Vec<Word<'_>> {
    let mut out = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut char_idx = 0;

    for (byte_idx, c) in text.char_indices() {
        let is_word = c.is_alphanumeric() || (c == '\'' && current.is_some());
        match (is_word, current) {
            (true, None) => current = Some((byte_idx, char_idx)),
            (false, Some((byte_start, char_start))) => {
                out.push(Word {
                    text: &text[byte_start..byte_idx],
                    start: char_start,
                    end: char_idx,
                });
                current = None;
            }
            _ => {}
        }
        char_idx += 1;
    }
    if let Some((byte_start, char_start)) = current {
        out.push(Word {
            text: &text[byte_start..],
            start: char_start,
            end: char_idx,
        });
    }
    out
}

/// Runs of capitalized words separated by whitespace only.
///
/// A title keeps its period (`Dr. Watson`) without breaking the run.
fn capitalized_runs<'a>(chars: &[char], words: &[Word<'a>]) -> Vec<Vec<Word<'a>>> {
    let mut runs: Vec<Vec<Word<'a>>> = Vec::new();
    let mut run: Vec<Word<'a>> = Vec::new();

    for word in words {
        if !word.is_capitalized() {
            if !run.is_empty() {
                runs.push(std::mem::take(&mut run));
            }
            continue;
        }
        if let Some(prev) = run.last() {
            let gap = &chars[prev.end..word.start];
            let gap = match gap.split_first() {
                Some(('.', rest)) if prev.is_title() => rest,
                _ => gap,
            };
            if gap.is_empty() || !gap.iter().all(|c| c.is_whitespace()) {
                runs.push(std::mem::take(&mut run));
            }
        }
        run.push(*word);
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

/// Capitalization-based person and organization detector.
///
/// - a run ending in a company suffix (`Acme Corp.`) is an organization
/// - a title followed by capitalized words (`Dr. Watson`) is a person, title excluded
/// - otherwise two to four capitalized words are a person
///
/// Leading stopwords (`Contact`, `The`, weekdays) are dropped from a run first.
#[derive(Debug, Clone, Default)]
pub struct CapitalizedSequenceDetector;

impl CapitalizedSequenceDetector {
    pub fn new() -> Self {
        Self
    }

    fn classify(&self, chars: &[char], mut run: &[Word<'_>]) -> Option<Entity> {
        while let Some((first, rest)) = run.split_first() {
            if STOPWORDS.contains(&first.lower().as_str()) {
                run = rest;
            } else {
                break;
            }
        }

        let mut titled = false;
        while let Some((first, rest)) = run.split_first() {
            if first.is_title() {
                titled = true;
                run = rest;
            } else {
                break;
            }
        }

        let (first, last) = (run.first()?, run.last()?);
        let last_lower = last.lower();

        if run.len() >= 2 && ORG_SUFFIXES.contains(&last_lower.as_str()) {
            let mut end = last.end;
            if ABBREVIATED_SUFFIXES.contains(&last_lower.as_str()) && chars.get(end) == Some(&'.') {
                end += 1;
            }
            return Some(span(chars, ORGANIZATION, first.start, end));
        }

        if run.len() > MAX_PERSON_WORDS || (run.len() < 2 && !titled) {
            return None;
        }
        Some(span(chars, PERSON, first.start, last.end))
    }
}

fn span(chars: &[char], entity_type: &str, start: usize, end: usize) -> Entity {
    let surface: String = chars[start..end].iter().collect();
    Entity::new(
        entity_type,
        surface,
        start,
        end,
        HEURISTIC_CONFIDENCE,
        EntitySource::Heuristic,
    )
}

impl HeuristicDetector for CapitalizedSequenceDetector {
    fn name(&self) -> &str {
        "capitalized_sequence"
    }

    fn supported_types(&self) -> &[&'static str] {
        &[PERSON, ORGANIZATION]
    }

    fn detect(&self, text: &str, is_enabled: &dyn Fn(&str) -> bool) -> Vec<Entity> {
        if !is_enabled(PERSON) && !is_enabled(ORGANIZATION) {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let words = words(text);
        let entities: Vec<Entity> = capitalized_runs(&chars, &words)
            .iter()
            .filter_map(|run| self.classify(&chars, run))
            .filter(|e| is_enabled(&e.entity_type))
            .collect();

        tracing::trace!(count = entities.len(), "Heuristic candidates");
        entities
    }
}
