//! Word-list sentiment, used when no classification model is loaded.

use std::collections::{BTreeMap, HashSet};
use veil_decode::{argmax, ClassificationResult, ClassificationSource};

pub const NEGATIVE: &str = "negative";
pub const NEUTRAL: &str = "neutral";
pub const POSITIVE: &str = "positive";

/// A negator flips the polarity of a sentiment word at most this many words later.
const NEGATION_WINDOW: usize = 3;

/// Smoothing mass assigned to the neutral label.
const NEUTRAL_PRIOR: f32 = 0.5;

const INTENSIFIER_WEIGHT: f32 = 1.5;

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "better", "brilliant", "delighted", "enjoy",
    "enjoyed", "excellent", "fantastic", "fast", "fine", "glad", "good", "great", "happy",
    "helpful", "impressive", "like", "liked", "love", "loved", "lovely", "nice", "perfect",
    "pleasant", "pleased", "recommend", "reliable", "satisfied", "smooth", "superb", "thank",
    "thanks", "useful", "wonderful", "works",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoying", "awful", "bad", "broken", "bug", "buggy", "crash", "crashed",
    "crashes", "disappointed", "disappointing", "fail", "failed", "fails", "frustrated",
    "frustrating", "hate", "hated", "horrible", "poor", "problem", "refund", "sad", "slow",
    "terrible", "unhappy", "unusable", "useless", "waste", "worse", "worst", "wrong",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "hardly",
    "isn't", "wasn't", "aren't", "don't", "doesn't", "didn't", "can't", "cannot", "won't",
    "shouldn't", "couldn't", "wouldn't",
];

const INTENSIFIERS: &[&str] = &["very", "really", "extremely", "so", "totally", "absolutely"];

/// Scores text against fixed positive and negative word lists.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negators: HashSet<&'static str>,
    intensifiers: HashSet<&'static str>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negators: NEGATORS.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    /// Weighted positive and negative hit counts.
    fn polarity(&self, text: &str) -> (f32, f32) {
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty());

        let (mut pos, mut neg) = (0.0f32, 0.0f32);
        let mut since_negator: Option<usize> = None;
        let mut weight = 1.0f32;

        for word in words {
            if self.negators.contains(word) {
                since_negator = Some(0);
                continue;
            }
            if self.intensifiers.contains(word) {
                weight = INTENSIFIER_WEIGHT;
                continue;
            }

            let negated = since_negator.is_some_and(|n| n < NEGATION_WINDOW);
            let hit = if self.positive.contains(word) {
                Some(true)
            } else if self.negative.contains(word) {
                Some(false)
            } else {
                None
            };

            match hit {
                Some(is_positive) => {
                    if is_positive != negated {
                        pos += weight;
                    } else {
                        neg += weight;
                    }
                    since_negator = None;
                }
                None => {
                    since_negator = since_negator.map(|n| n + 1);
                }
            }
            weight = 1.0;
        }

        (pos, neg)
    }

    /// Score `text` with the default label names.
    pub fn score(&self, text: &str) -> ClassificationResult {
        self.score_with_labels(text, [NEGATIVE, NEUTRAL, POSITIVE])
    }

    /// Score `text`, reporting under `[negative, neutral, positive]` names.
    ///
    /// Scores sum to 1. Text with no sentiment words is fully neutral; equal
    /// positive and negative weight resolves to neutral.
    pub fn score_with_labels(&self, text: &str, labels: [&str; 3]) -> ClassificationResult {
        let (pos, neg) = self.polarity(text);
        let total = pos + neg + NEUTRAL_PRIOR;
        let probs = [neg / total, NEUTRAL_PRIOR / total, pos / total];

        let best = if (pos - neg).abs() < f32::EPSILON {
            1
        } else {
            argmax(&probs).unwrap_or(1)
        };

        let scores: BTreeMap<String, f32> = labels
            .iter()
            .zip(probs)
            .map(|(label, p)| (label.to_string(), p))
            .collect();

        ClassificationResult {
            label: labels[best].to_string(),
            confidence: probs[best],
            scores,
            source: ClassificationSource::Lexicon,
        }
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_text() {
        let result = LexiconScorer::new().score("I love this app, it works great!");
        assert_eq!(result.label, POSITIVE);
        assert_eq!(result.source, ClassificationSource::Lexicon);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_negative_text() {
        let result = LexiconScorer::new().score("Terrible update. It crashes and is so slow.");
        assert_eq!(result.label, NEGATIVE);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.score("This is not good").label, NEGATIVE);
        assert_eq!(scorer.score("It was not bad at all").label, POSITIVE);
    }

    #[test]
    fn test_negation_window_expires() {
        // Six words between the negator and "good".
        let result = LexiconScorer::new().score("no one ever said the food was good");
        assert_eq!(result.label, POSITIVE);
    }

    #[test]
    fn test_neutral_when_no_sentiment_words() {
        let result = LexiconScorer::new().score("The meeting is on Tuesday.");
        assert_eq!(result.label, NEUTRAL);
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tie_is_neutral() {
        let result = LexiconScorer::new().score("good and bad");
        assert_eq!(result.label, NEUTRAL);
    }

    #[test]
    fn test_scores_sum_to_one() {
        let result = LexiconScorer::new().score("great but really slow");
        let sum: f32 = result.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(result.scores.len(), 3);
    }

    #[test]
    fn test_custom_label_names() {
        let result = LexiconScorer::new().score_with_labels("awful", ["neg", "neu", "pos"]);
        assert_eq!(result.label, "neg");
        assert!(result.score("pos").is_some());
    }
}
