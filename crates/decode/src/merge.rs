//! Overlap resolution across model, pattern and heuristic candidates.

use crate::Entity;

/// Keep a non-overlapping subset of `candidates`, sorted by start.
///
/// Candidates are stably sorted by `start_index` and accepted in that order
/// while they start at or after the end of the last accepted one. The first
/// candidate wins an overlap regardless of confidence; among equal starts the
/// caller's input order decides.
pub fn resolve_overlaps(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by_key(|e| e.start_index);

    let mut accepted = Vec::with_capacity(candidates.len());
    let mut last_end: Option<usize> = None;
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        if last_end.is_some_and(|end| candidate.start_index < end) {
            tracing::trace!(
                entity_type = %candidate.entity_type,
                start = candidate.start_index,
                end = candidate.end_index,
                "Dropping overlapping candidate"
            );
            continue;
        }
        last_end = Some(candidate.end_index);
        accepted.push(candidate);
    }
    accepted
}

/// True if any two entities overlap.
pub fn has_overlaps(entities: &[Entity]) -> bool {
    entities
        .iter()
        .enumerate()
        .any(|(i, a)| entities[i + 1..].iter().any(|b| a.overlaps(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntitySource;

    fn entity(ty: &str, start: usize, end: usize, confidence: f32) -> Entity {
        Entity::new(ty, "", start, end, confidence, EntitySource::Model)
    }

    #[test]
    fn test_sorted_and_non_overlapping() {
        let merged = resolve_overlaps(vec![
            entity("b", 10, 15, 0.9),
            entity("a", 0, 5, 0.9),
            entity("c", 3, 8, 0.9),
            entity("d", 15, 20, 0.9),
        ]);
        let types: Vec<_> = merged.iter().map(|e| e.entity_type.as_str()).collect();
        assert_eq!(types, vec!["a", "b", "d"]);
        assert!(!has_overlaps(&merged));
        assert!(merged.windows(2).all(|w| w[0].start_index <= w[1].start_index));
    }

    #[test]
    fn test_first_match_wins_over_confidence() {
        let merged = resolve_overlaps(vec![
            entity("pattern", 0, 6, 0.5),
            entity("model", 2, 10, 0.99),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "pattern");
    }

    #[test]
    fn test_equal_start_keeps_input_order() {
        let merged = resolve_overlaps(vec![entity("first", 4, 6, 0.1), entity("second", 4, 9, 0.9)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].entity_type, "first");
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve_overlaps(Vec::new()).is_empty());
    }
}
