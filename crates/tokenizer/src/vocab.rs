use crate::{Result, TokenizerError};
use std::collections::HashMap;
use std::path::Path;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Token table parsed from a `vocab.txt` file (one token per line, id = line index).
#[derive(Debug, Clone)]
pub struct Vocab {
    ids: HashMap<String, i64>,
    pub pad_id: i64,
    pub unk_id: i64,
    pub cls_id: i64,
    pub sep_id: i64,
}

impl Vocab {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TokenizerError::ReadVocab {
            path: path.to_path_buf(),
            source: e,
        })?;
        let vocab = Self::from_tokens(content.lines())?;
        tracing::debug!(path = ?path, size = vocab.len(), "Vocabulary loaded");
        Ok(vocab)
    }

    /// Build a vocabulary from tokens in id order.
    ///
    /// Duplicate tokens keep their first id, like the reference BERT loader.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = HashMap::new();
        for (i, token) in tokens.into_iter().enumerate() {
            let token = token.as_ref().trim_end_matches('\r');
            if token.is_empty() {
                continue;
            }
            ids.entry(token.to_string()).or_insert(i as i64);
        }
        if ids.is_empty() {
            return Err(TokenizerError::EmptyVocab);
        }

        let special = |name: &'static str| {
            ids.get(name)
                .copied()
                .ok_or(TokenizerError::MissingSpecialToken(name))
        };

        Ok(Self {
            pad_id: special(PAD_TOKEN)?,
            unk_id: special(UNK_TOKEN)?,
            cls_id: special(CLS_TOKEN)?,
            sep_id: special(SEP_TOKEN)?,
            ids,
        })
    }

    pub fn get(&self, token: &str) -> Option<i64> {
        self.ids.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ids_follow_line_order() {
        let vocab = Vocab::from_tokens(["[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello"]).unwrap();
        assert_eq!(vocab.pad_id, 0);
        assert_eq!(vocab.unk_id, 1);
        assert_eq!(vocab.cls_id, 2);
        assert_eq!(vocab.sep_id, 3);
        assert_eq!(vocab.get("hello"), Some(4));
    }

    #[test]
    fn test_missing_special_token_is_rejected() {
        let err = Vocab::from_tokens(["[PAD]", "[UNK]", "[CLS]"]).unwrap_err();
        assert!(matches!(err, TokenizerError::MissingSpecialToken("[SEP]")));
    }

    #[test]
    fn test_empty_vocab_is_rejected() {
        let err = Vocab::from_tokens(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, TokenizerError::EmptyVocab));
    }

    #[test]
    fn test_from_file_handles_crlf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[PAD]\r\n[UNK]\r\n[CLS]\r\n[SEP]\r\nworld\r\n").unwrap();

        let vocab = Vocab::from_file(file.path()).unwrap();
        assert_eq!(vocab.get("world"), Some(4));
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = Vocab::from_file("/nonexistent/vocab.txt").unwrap_err();
        assert!(matches!(err, TokenizerError::ReadVocab { .. }));
    }
}
