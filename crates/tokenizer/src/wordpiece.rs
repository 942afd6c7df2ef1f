//! Greedy longest-match WordPiece encoding.

use crate::basic::basic_split;
use crate::{Result, TokenizedResult, TokenizerError, Vocab, NO_OFFSET};

/// Prefix marking a piece that continues the previous one inside a word.
pub const CONTINUATION_PREFIX: &str = "##";

/// Words longer than this map straight to `[UNK]` without a subword search.
pub const MAX_CHARS_PER_WORD: usize = 100;

#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: Vocab,
    lowercase: bool,
}

impl WordPieceTokenizer {
    pub fn new(vocab: Vocab, lowercase: bool) -> Self {
        Self { vocab, lowercase }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn is_lowercase(&self) -> bool {
        self.lowercase
    }

    /// Number of special tokens added around the subwords.
    pub fn special_token_count(add_special_tokens: bool) -> usize {
        if add_special_tokens {
            2
        } else {
            0
        }
    }

    /// Encode `text` into `max_length` padded tensors.
    ///
    /// Subwords are truncated once the budget is reached; `[CLS]`/`[SEP]` are
    /// never dropped.
    pub fn tokenize(
        &self,
        text: &str,
        max_length: usize,
        add_special_tokens: bool,
    ) -> Result<TokenizedResult> {
        let specials = Self::special_token_count(add_special_tokens);
        if max_length == 0 || max_length < specials {
            return Err(TokenizerError::InvalidMaxLength(max_length));
        }
        let budget = max_length - specials;

        let mut input_ids = Vec::with_capacity(max_length);
        let mut starts = Vec::with_capacity(max_length);
        let mut ends = Vec::with_capacity(max_length);

        if add_special_tokens {
            input_ids.push(self.vocab.cls_id);
            starts.push(NO_OFFSET);
            ends.push(NO_OFFSET);
        }

        let mut subword_count = 0usize;
        let mut truncated = false;
        'words: for word in basic_split(text, self.lowercase) {
            for (piece_index, id) in self.word_pieces(&word.text).into_iter().enumerate() {
                if subword_count == budget {
                    truncated = true;
                    break 'words;
                }
                input_ids.push(id);
                if piece_index == 0 {
                    starts.push(word.start as i64);
                    ends.push(word.end as i64);
                } else {
                    starts.push(NO_OFFSET);
                    ends.push(NO_OFFSET);
                }
                subword_count += 1;
            }
        }

        if truncated {
            tracing::debug!(max_length, "Input truncated to model sequence length");
        }

        if add_special_tokens {
            input_ids.push(self.vocab.sep_id);
            starts.push(NO_OFFSET);
            ends.push(NO_OFFSET);
        }

        let token_count = input_ids.len();
        let mut attention_mask = vec![1i64; token_count];

        input_ids.resize(max_length, self.vocab.pad_id);
        attention_mask.resize(max_length, 0);
        starts.resize(max_length, NO_OFFSET);
        ends.resize(max_length, NO_OFFSET);

        Ok(TokenizedResult {
            input_ids,
            attention_mask,
            token_to_char_start: starts,
            token_to_char_end: ends,
            token_count,
        })
    }

    /// Split one basic token into vocabulary ids.
    fn word_pieces(&self, word: &str) -> Vec<i64> {
        if let Some(id) = self.vocab.get(word) {
            return vec![id];
        }

        let chars: Vec<char> = word.chars().collect();
        if chars.len() > MAX_CHARS_PER_WORD {
            return vec![self.vocab.unk_id];
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        let mut candidate = String::new();
        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while end > start {
                candidate.clear();
                if start > 0 {
                    candidate.push_str(CONTINUATION_PREFIX);
                }
                candidate.extend(&chars[start..end]);
                if let Some(id) = self.vocab.get(&candidate) {
                    found = Some(id);
                    break;
                }
                end -= 1;
            }

            match found {
                Some(id) => {
                    pieces.push(id);
                    start = end;
                }
                None => {
                    pieces.push(self.vocab.unk_id);
                    start += 1;
                }
            }
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vocab() -> Vocab {
        Vocab::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello", "world", "un", "##aff", "##able", "john",
            "smith", "@", ".", "com", ",", "!", "a", "##b",
        ])
        .unwrap()
    }

    fn tokenizer() -> WordPieceTokenizer {
        WordPieceTokenizer::new(test_vocab(), true)
    }

    #[test]
    fn test_known_words_single_piece_with_spans() {
        let result = tokenizer().tokenize("Hello world", 8, true).unwrap();
        assert_eq!(result.input_ids, vec![2, 4, 5, 3, 0, 0, 0, 0]);
        assert_eq!(result.attention_mask, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(result.token_count, 4);
        assert_eq!(result.char_span(0), None);
        assert_eq!(result.char_span(1), Some((0, 5)));
        assert_eq!(result.char_span(2), Some((6, 11)));
        assert_eq!(result.char_span(3), None);
    }

    #[test]
    fn test_subwords_only_first_piece_has_span() {
        let result = tokenizer().tokenize("unaffable", 8, true).unwrap();
        assert_eq!(&result.input_ids[..5], &[2, 6, 7, 8, 3]);
        assert_eq!(result.char_span(1), Some((0, 9)));
        assert_eq!(result.char_span(2), None);
        assert_eq!(result.char_span(3), None);
    }

    #[test]
    fn test_unknown_char_advances_one_and_retries() {
        let result = tokenizer().tokenize("xab", 8, false).unwrap();
        // x -> [UNK]; "##ab" / "##a" not in vocab -> [UNK]; "##b" matches.
        assert_eq!(&result.input_ids[..3], &[1, 1, 17]);
        assert_eq!(result.token_count, 3);
    }

    #[test]
    fn test_empty_text_is_all_padding() {
        let result = tokenizer().tokenize("", 6, true).unwrap();
        assert_eq!(result.token_count, 2);
        assert_eq!(result.input_ids, vec![2, 3, 0, 0, 0, 0]);
        assert!(result.token_to_char_start.iter().all(|&s| s == NO_OFFSET));
    }

    #[test]
    fn test_truncation_keeps_special_tokens() {
        let result = tokenizer().tokenize("hello world hello world", 4, true).unwrap();
        assert_eq!(result.input_ids, vec![2, 4, 5, 3]);
        assert_eq!(result.token_count, 4);
    }

    #[test]
    fn test_overlong_word_maps_to_unk() {
        let word = "a".repeat(MAX_CHARS_PER_WORD + 1);
        let result = tokenizer().tokenize(&word, 4, true).unwrap();
        assert_eq!(&result.input_ids[..3], &[2, 1, 3]);
        assert_eq!(result.char_span(1), Some((0, MAX_CHARS_PER_WORD + 1)));
    }

    #[test]
    fn test_invalid_max_length() {
        let err = tokenizer().tokenize("hello", 1, true).unwrap_err();
        assert!(matches!(err, TokenizerError::InvalidMaxLength(1)));
    }

    #[test]
    fn test_offsets_are_within_text() {
        let text = "Contact John Smith at john@example.com, or else!";
        let len = text.chars().count() as i64;
        let result = tokenizer().tokenize(text, 64, true).unwrap();
        for i in 0..result.max_length() {
            let (s, e) = (result.token_to_char_start[i], result.token_to_char_end[i]);
            if s != NO_OFFSET {
                assert!(s < e && e <= len, "bad span {s}..{e}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let t = tokenizer();
        let a = t.tokenize("john smith, hello!", 16, true).unwrap();
        let b = t.tokenize("john smith, hello!", 16, true).unwrap();
        assert_eq!(a, b);
    }
}
