//! In-place span replacement.

use crate::offset::OffsetMap;
use crate::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionStyle {
    /// Replace every char of the span with this char (length preserving).
    Mask(char),
    /// Replace the span with `[TYPE]`.
    Label,
}

/// Apply `style` to every entity span of `text`.
///
/// `entities` must be non-overlapping and sorted by `start_index`; spans are
/// replaced from the last to the first so earlier offsets stay valid.
/// Spans outside the text or overlapping a later span are skipped.
pub fn redact(text: &str, entities: &[Entity], style: RedactionStyle) -> String {
    let text_len = OffsetMap::new(text).char_len();
    let mut out = text.to_string();
    let mut next_start = text_len;

    for entity in entities.iter().rev() {
        if !entity.is_valid_for(text_len) || entity.end_index > next_start {
            tracing::warn!(
                entity_type = %entity.entity_type,
                start = entity.start_index,
                end = entity.end_index,
                "Skipping invalid redaction span"
            );
            continue;
        }

        // Offsets before this span are untouched by the replacements already made.
        let offsets = OffsetMap::new(&out);
        let start = offsets.char_to_byte(entity.start_index);
        let end = offsets.char_to_byte(entity.end_index);

        let replacement = match style {
            RedactionStyle::Mask(c) => std::iter::repeat_n(c, entity.len()).collect::<String>(),
            RedactionStyle::Label => format!("[{}]", entity.entity_type.to_uppercase()),
        };
        out.replace_range(start..end, &replacement);
        next_start = entity.start_index;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntitySource;

    fn entity(ty: &str, start: usize, end: usize) -> Entity {
        Entity::new(ty, "", start, end, 0.9, EntitySource::Pattern)
    }

    const TEXT: &str = "Contact John Smith at john@example.com or call 555-123-4567.";

    fn entities() -> Vec<Entity> {
        vec![
            entity("person", 8, 18),
            entity("email_address", 22, 38),
            entity("phone_number", 47, 59),
        ]
    }

    #[test]
    fn test_mask_preserves_length() {
        let out = redact(TEXT, &entities(), RedactionStyle::Mask('*'));
        assert_eq!(out.chars().count(), TEXT.chars().count());
        assert_eq!(
            out,
            "Contact ********** at **************** or call ************."
        );
    }

    #[test]
    fn test_label_substitution() {
        let out = redact(TEXT, &entities(), RedactionStyle::Label);
        assert_eq!(
            out,
            "Contact [PERSON] at [EMAIL_ADDRESS] or call [PHONE_NUMBER]."
        );
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Zoë lives in Köln";
        let out = redact(text, &[entity("person", 0, 3), entity("location", 13, 17)], RedactionStyle::Mask('█'));
        assert_eq!(out, "███ lives in ████");
        assert_eq!(out.chars().count(), text.chars().count());
    }

    #[test]
    fn test_out_of_range_span_skipped() {
        let out = redact("short", &[entity("x", 2, 40)], RedactionStyle::Label);
        assert_eq!(out, "short");
    }

    #[test]
    fn test_no_entities() {
        assert_eq!(redact(TEXT, &[], RedactionStyle::Label), TEXT);
    }
}
