//! Byte/char offset conversion.
//!
//! Regex matches and `String` slicing work in UTF-8 bytes; entities work in
//! chars. `OffsetMap` precomputes the table once per text.

#[derive(Debug, Clone)]
pub struct OffsetMap {
    /// Byte offset of every char, plus the total byte length at the end.
    char_to_byte: Vec<usize>,
    is_ascii: bool,
    byte_len: usize,
}

impl OffsetMap {
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                char_to_byte: Vec::new(),
                is_ascii: true,
                byte_len: text.len(),
            };
        }
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            is_ascii: false,
            byte_len: text.len(),
        }
    }

    /// Number of chars in the text.
    pub fn char_len(&self) -> usize {
        if self.is_ascii {
            self.byte_len
        } else {
            self.char_to_byte.len() - 1
        }
    }

    /// Byte offset of char `idx`; clamps to the end of the text.
    pub fn char_to_byte(&self, idx: usize) -> usize {
        if self.is_ascii {
            idx.min(self.byte_len)
        } else {
            self.char_to_byte
                .get(idx)
                .copied()
                .unwrap_or(self.byte_len)
        }
    }

    /// Char index of a byte offset that lies on a char boundary.
    pub fn byte_to_char(&self, byte: usize) -> usize {
        if self.is_ascii {
            byte.min(self.byte_len)
        } else {
            match self.char_to_byte.binary_search(&byte) {
                Ok(idx) => idx,
                Err(idx) => idx.saturating_sub(1),
            }
        }
    }

    /// Slice `text` (the same text this map was built from) by char range.
    pub fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        let start = self.char_to_byte(start);
        let end = self.char_to_byte(end).max(start);
        &text[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identity() {
        let map = OffsetMap::new("hello");
        assert_eq!(map.char_len(), 5);
        assert_eq!(map.char_to_byte(3), 3);
        assert_eq!(map.byte_to_char(3), 3);
        assert_eq!(map.slice("hello", 1, 4), "ell");
    }

    #[test]
    fn test_multibyte_conversion() {
        let text = "The café costs €50";
        let map = OffsetMap::new(text);
        assert_eq!(map.char_len(), 18);
        // "€" starts at byte 16, char 15
        assert_eq!(map.byte_to_char(16), 15);
        assert_eq!(map.char_to_byte(15), 16);
        assert_eq!(map.slice(text, 15, 18), "€50");
        assert_eq!(map.byte_to_char(text.len()), 18);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let map = OffsetMap::new("añb");
        assert_eq!(map.char_to_byte(10), 4);
        assert_eq!(map.slice("añb", 2, 10), "b");
    }
}
