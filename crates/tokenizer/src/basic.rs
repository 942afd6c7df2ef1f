//! Whitespace and punctuation splitting with character spans.

/// A whitespace/punctuation delimited token and its `[start, end)` char span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicToken {
    /// Normalized text used for vocabulary lookup.
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Punctuation in the BERT sense: ASCII symbols plus the common Unicode
/// punctuation blocks.
pub fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }
    matches!(
        c as u32,
        0x00A1..=0x00BF
            | 0x00D7
            | 0x00F7
            | 0x2010..=0x2027
            | 0x2030..=0x205E
            | 0x3000..=0x303F
            | 0xFE30..=0xFE4F
            | 0xFF01..=0xFF0F
            | 0xFF1A..=0xFF20
            | 0xFF3B..=0xFF40
            | 0xFF5B..=0xFF65
    )
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_control() || c == '\u{FEFF}'
}

/// Split `text` on whitespace and punctuation.
///
/// Each punctuation character becomes its own token. Spans are counted in
/// `char`s of the original text; lower-casing does not move them.
pub fn basic_split(text: &str, lowercase: bool) -> Vec<BasicToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_start = 0usize;

    let mut char_count = 0usize;
    for (i, c) in text.chars().enumerate() {
        char_count = i + 1;
        if is_separator(c) {
            flush(&mut current, current_start, i, &mut tokens);
            continue;
        }
        if is_punctuation(c) {
            flush(&mut current, current_start, i, &mut tokens);
            let mut punct = String::new();
            push_normalized(&mut punct, c, lowercase);
            tokens.push(BasicToken {
                text: punct,
                start: i,
                end: i + 1,
            });
            continue;
        }
        if current.is_empty() {
            current_start = i;
        }
        push_normalized(&mut current, c, lowercase);
    }
    flush(&mut current, current_start, char_count, &mut tokens);

    tokens
}

fn flush(current: &mut String, start: usize, end: usize, tokens: &mut Vec<BasicToken>) {
    if !current.is_empty() {
        tokens.push(BasicToken {
            text: std::mem::take(current),
            start,
            end,
        });
    }
}

fn push_normalized(out: &mut String, c: char, lowercase: bool) {
    if lowercase {
        out.extend(c.to_lowercase());
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[BasicToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_splits_whitespace_and_punctuation() {
        let tokens = basic_split("Hello, World!", true);
        assert_eq!(texts(&tokens), vec!["hello", ",", "world", "!"]);
        assert_eq!((tokens[0].start, tokens[0].end), (0, 5));
        assert_eq!((tokens[1].start, tokens[1].end), (5, 6));
        assert_eq!((tokens[2].start, tokens[2].end), (7, 12));
        assert_eq!((tokens[3].start, tokens[3].end), (12, 13));
    }

    #[test]
    fn test_cased_keeps_text() {
        let tokens = basic_split("John Smith", false);
        assert_eq!(texts(&tokens), vec!["John", "Smith"]);
    }

    #[test]
    fn test_spans_count_chars_not_bytes() {
        let tokens = basic_split("café résumé", true);
        assert_eq!((tokens[0].start, tokens[0].end), (0, 4));
        assert_eq!((tokens[1].start, tokens[1].end), (5, 11));
    }

    #[test]
    fn test_email_splits_on_symbols() {
        let tokens = basic_split("john@example.com", true);
        assert_eq!(texts(&tokens), vec!["john", "@", "example", ".", "com"]);
    }

    #[test]
    fn test_unicode_punctuation() {
        assert!(is_punctuation('¿'));
        assert!(is_punctuation('—'));
        assert!(is_punctuation('。'));
        assert!(!is_punctuation('é'));
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert!(basic_split("", true).is_empty());
        assert!(basic_split(" \t\n ", true).is_empty());
    }
}
