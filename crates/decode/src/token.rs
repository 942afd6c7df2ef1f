//! Token-classification output to entity spans.

use crate::offset::OffsetMap;
use crate::sequence::argmax;
use crate::{Entity, EntitySource, ML_CONFIDENCE};
use veil_tokenizer::TokenizedResult;

/// Max distance in chars between a span's end and the next token's start for
/// the token to extend that span.
pub const MERGE_GAP_CHARS: usize = 2;

/// Strip BIO/BIOES prefixes. Returns `None` for the outside label.
pub fn normalize_label(label: &str) -> Option<&str> {
    let bare = ["B-", "I-", "E-", "S-", "L-", "U-"]
        .iter()
        .find_map(|p| label.strip_prefix(p))
        .unwrap_or(label);
    if bare.is_empty() || bare.eq_ignore_ascii_case("o") {
        None
    } else {
        Some(bare)
    }
}

struct OpenSpan<'a> {
    label: &'a str,
    start: usize,
    end: usize,
}

impl OpenSpan<'_> {
    fn into_entity(self, text: &str, offsets: &OffsetMap) -> Entity {
        Entity::new(
            self.label,
            offsets.slice(text, self.start, self.end),
            self.start,
            self.end,
            ML_CONFIDENCE,
            EntitySource::Model,
        )
    }
}

/// Decode per-token logits into merged entity spans.
///
/// Only tokens that carry a character span (the first piece of each word) are
/// considered; continuation pieces inherit the word's label implicitly.
/// `is_enabled` filters the normalized label.
pub fn decode_token_classification<F>(
    text: &str,
    tokenized: &TokenizedResult,
    logits: &[Vec<f32>],
    labels: &[String],
    is_enabled: F,
) -> Vec<Entity>
where
    F: Fn(&str) -> bool,
{
    let offsets = OffsetMap::new(text);
    let text_len = offsets.char_len();
    let mut entities = Vec::new();
    let mut open: Option<OpenSpan<'_>> = None;

    for (i, row) in logits.iter().enumerate().take(tokenized.token_count) {
        if tokenized.attention_mask.get(i).copied().unwrap_or(0) == 0 {
            continue;
        }
        let Some((start, end)) = tokenized.char_span(i) else {
            continue;
        };
        if start >= end || end > text_len {
            continue;
        }
        let Some(label) = argmax(row)
            .and_then(|idx| labels.get(idx))
            .and_then(|l| normalize_label(l))
        else {
            continue;
        };
        if !is_enabled(label) {
            continue;
        }

        if let Some(span) = open.as_mut() {
            if span.label == label && start <= span.end + MERGE_GAP_CHARS {
                span.end = span.end.max(end);
                continue;
            }
        }
        if let Some(span) = open.replace(OpenSpan { label, start, end }) {
            entities.push(span.into_entity(text, &offsets));
        }
    }

    if let Some(span) = open.take() {
        entities.push(span.into_entity(text, &offsets));
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_tokenizer::NO_OFFSET;

    fn labels() -> Vec<String> {
        ["O", "B-person", "I-person", "B-location"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn one_hot(idx: usize) -> Vec<f32> {
        let mut row = vec![0.0; 4];
        row[idx] = 5.0;
        row
    }

    /// [CLS] + one token per span + [SEP].
    fn tokenized(spans: &[(i64, i64)]) -> TokenizedResult {
        let mut starts = vec![NO_OFFSET];
        let mut ends = vec![NO_OFFSET];
        for &(s, e) in spans {
            starts.push(s);
            ends.push(e);
        }
        starts.push(NO_OFFSET);
        ends.push(NO_OFFSET);
        let n = starts.len();
        TokenizedResult {
            input_ids: vec![1; n],
            attention_mask: vec![1; n],
            token_to_char_start: starts,
            token_to_char_end: ends,
            token_count: n,
        }
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("B-person"), Some("person"));
        assert_eq!(normalize_label("I-person"), Some("person"));
        assert_eq!(normalize_label("location"), Some("location"));
        assert_eq!(normalize_label("O"), None);
        assert_eq!(normalize_label("B-"), None);
    }

    #[test]
    fn test_adjacent_tokens_merge_into_one_span() {
        let text = "Contact John Smith today";
        let tok = tokenized(&[(0, 7), (8, 12), (13, 18), (19, 24)]);
        let logits = vec![one_hot(0), one_hot(0), one_hot(1), one_hot(2), one_hot(0), one_hot(0)];

        let entities = decode_token_classification(text, &tok, &logits, &labels(), |_| true);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "person");
        assert_eq!(entities[0].text, "John Smith");
        assert_eq!((entities[0].start_index, entities[0].end_index), (8, 18));
        assert_eq!(entities[0].confidence, ML_CONFIDENCE);
    }

    #[test]
    fn test_gap_larger_than_tolerance_splits() {
        let text = "John and Mary";
        let tok = tokenized(&[(0, 4), (5, 8), (9, 13)]);
        let logits = vec![one_hot(0), one_hot(1), one_hot(0), one_hot(1), one_hot(0)];

        let entities = decode_token_classification(text, &tok, &logits, &labels(), |_| true);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "John");
        assert_eq!(entities[1].text, "Mary");
    }

    #[test]
    fn test_label_change_closes_span() {
        let text = "Smith Paris";
        let tok = tokenized(&[(0, 5), (6, 11)]);
        let logits = vec![one_hot(0), one_hot(1), one_hot(3), one_hot(0)];

        let entities = decode_token_classification(text, &tok, &logits, &labels(), |_| true);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, "person");
        assert_eq!(entities[1].entity_type, "location");
    }

    #[test]
    fn test_disabled_types_dropped() {
        let text = "Smith Paris";
        let tok = tokenized(&[(0, 5), (6, 11)]);
        let logits = vec![one_hot(0), one_hot(1), one_hot(3), one_hot(0)];

        let entities =
            decode_token_classification(text, &tok, &logits, &labels(), |l| l == "location");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Paris");
    }

    #[test]
    fn test_continuation_pieces_are_skipped() {
        let text = "Johnson";
        // [CLS] john ##son [SEP]
        let tok = tokenized(&[(0, 7), (NO_OFFSET, NO_OFFSET)]);
        let logits = vec![one_hot(0), one_hot(1), one_hot(3), one_hot(0)];

        let entities = decode_token_classification(text, &tok, &logits, &labels(), |_| true);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Johnson");
        assert_eq!(entities[0].entity_type, "person");
    }

    #[test]
    fn test_padding_rows_ignored() {
        let text = "John";
        let mut tok = tokenized(&[(0, 4)]);
        tok.attention_mask[1] = 0;
        let logits = vec![one_hot(0), one_hot(1), one_hot(0)];

        let entities = decode_token_classification(text, &tok, &logits, &labels(), |_| true);
        assert!(entities.is_empty());
    }
}
