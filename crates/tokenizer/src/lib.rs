//! Subword tokenization for BERT-style token and sequence classifiers.
//!
//! Converts raw text into the fixed-length tensors the models expect and keeps
//! a per-token table of character offsets back into the original string.

mod basic;
mod vocab;
mod wordpiece;

use std::path::PathBuf;

pub use basic::{basic_split, is_punctuation, BasicToken};
pub use vocab::{Vocab, CLS_TOKEN, PAD_TOKEN, SEP_TOKEN, UNK_TOKEN};
pub use wordpiece::{WordPieceTokenizer, CONTINUATION_PREFIX, MAX_CHARS_PER_WORD};

#[derive(Debug, thiserror::Error)]
pub enum TokenizerError {
    #[error("failed to read vocabulary '{path}': {source}")]
    ReadVocab {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("vocabulary is empty")]
    EmptyVocab,
    #[error("vocabulary is missing special token {0}")]
    MissingSpecialToken(&'static str),
    #[error("max length {0} cannot hold the special tokens")]
    InvalidMaxLength(usize),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;

/// Offset value used for tokens that carry no character span.
pub const NO_OFFSET: i64 = -1;

/// Model-ready tensors for one input text.
///
/// All vectors have length `max_length`. Offsets are counted in `char`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedResult {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_to_char_start: Vec<i64>,
    pub token_to_char_end: Vec<i64>,
    /// Real tokens including specials.
    pub token_count: usize,
}

impl TokenizedResult {
    pub fn max_length(&self) -> usize {
        self.input_ids.len()
    }

    /// Character span of token `i`, if it is the first piece of a basic token.
    pub fn char_span(&self, i: usize) -> Option<(usize, usize)> {
        let start = *self.token_to_char_start.get(i)?;
        let end = *self.token_to_char_end.get(i)?;
        if start == NO_OFFSET || end == NO_OFFSET {
            return None;
        }
        Some((start as usize, end as usize))
    }
}
