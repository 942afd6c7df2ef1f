//! Sequence-classification output to a label distribution.

use crate::{ClassificationResult, ClassificationSource};
use std::collections::BTreeMap;

/// Numerically stable softmax: the max logit is subtracted before `exp`.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let Some(max) = logits.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Names under which the model's logits are reported.
///
/// Model labels that all appear in `taxonomy` keep their names. Otherwise they
/// map by position: a binary model takes the first and last taxonomy labels,
/// a model of the same width takes them in order. Without a usable taxonomy
/// the model's own names are kept.
fn reported_labels(model_labels: &[String], taxonomy: &[String]) -> Vec<String> {
    if model_labels.iter().all(|l| taxonomy.contains(l)) {
        return model_labels.to_vec();
    }
    match (model_labels.len(), taxonomy.len()) {
        (2, 3) => vec![taxonomy[0].clone(), taxonomy[2].clone()],
        (m, t) if m == t => taxonomy.to_vec(),
        _ => model_labels.to_vec(),
    }
}

/// Decode sequence logits into a [`ClassificationResult`].
///
/// `model_labels` names the logits in order; the result is reported in the
/// caller's `taxonomy`. When the model is binary and the taxonomy has three
/// labels, the one the model lacks (normally the middle, "neutral") is scored
/// `1 - confidence`.
pub fn decode_sequence_classification(
    logits: &[f32],
    model_labels: &[String],
    taxonomy: &[String],
) -> Option<ClassificationResult> {
    if logits.is_empty() || logits.len() != model_labels.len() {
        return None;
    }
    let probs = softmax(logits);
    let best = argmax(&probs)?;
    let confidence = probs[best];

    let labels = reported_labels(model_labels, taxonomy);
    let mut scores: BTreeMap<String, f32> = labels
        .iter()
        .cloned()
        .zip(probs.iter().copied())
        .collect();

    if model_labels.len() == 2 && taxonomy.len() == 3 {
        for label in taxonomy {
            if !scores.contains_key(label) {
                scores.insert(label.clone(), 1.0 - confidence);
            }
        }
    }

    Some(ClassificationResult {
        label: labels[best].clone(),
        confidence,
        scores,
        source: ClassificationSource::Model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_binary_model_with_three_label_taxonomy() {
        let result = decode_sequence_classification(
            &[2.0, 0.0],
            &strings(&["negative", "positive"]),
            &strings(&["negative", "neutral", "positive"]),
        )
        .unwrap();

        assert_eq!(result.label, "negative");
        assert!((result.confidence - 0.8808).abs() < 1e-3);
        assert!((result.score("negative").unwrap() - 0.8808).abs() < 1e-3);
        assert!((result.score("positive").unwrap() - 0.1192).abs() < 1e-3);
        assert!((result.score("neutral").unwrap() - 0.1192).abs() < 1e-3);
        assert_eq!(result.source, ClassificationSource::Model);
    }

    #[test]
    fn test_three_label_model_is_a_distribution() {
        let result = decode_sequence_classification(
            &[0.1, 3.0, 0.2],
            &strings(&["negative", "neutral", "positive"]),
            &strings(&["negative", "neutral", "positive"]),
        )
        .unwrap();
        assert_eq!(result.label, "neutral");
        let sum: f32 = result.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_binary_model_maps_onto_renamed_taxonomy() {
        let result = decode_sequence_classification(
            &[2.0, 0.0],
            &strings(&["negative", "positive"]),
            &strings(&["neg", "neu", "pos"]),
        )
        .unwrap();

        assert_eq!(result.label, "neg");
        assert_eq!(result.scores.len(), 3);
        assert!((result.score("neg").unwrap() - 0.8808).abs() < 1e-3);
        assert!((result.score("pos").unwrap() - 0.1192).abs() < 1e-3);
        assert!((result.score("neu").unwrap() - 0.1192).abs() < 1e-3);
        assert!(result.score("negative").is_none());
    }

    #[test]
    fn test_same_width_model_reports_taxonomy_names() {
        let result = decode_sequence_classification(
            &[0.0, 0.0, 4.0],
            &strings(&["LABEL_0", "LABEL_1", "LABEL_2"]),
            &strings(&["bad", "meh", "good"]),
        )
        .unwrap();
        assert_eq!(result.label, "good");
        assert_eq!(
            result.scores.keys().collect::<Vec<_>>(),
            vec!["bad", "good", "meh"]
        );
    }

    #[test]
    fn test_model_names_kept_when_taxonomy_contains_them() {
        let result = decode_sequence_classification(
            &[0.0, 3.0],
            &strings(&["positive", "negative"]),
            &strings(&["negative", "neutral", "positive"]),
        )
        .unwrap();
        assert_eq!(result.label, "negative");
        assert_eq!(result.scores.len(), 3);
        assert!(result.score("neutral").unwrap() < 0.1);
    }

    #[test]
    fn test_label_count_mismatch() {
        assert!(decode_sequence_classification(&[1.0], &strings(&["a", "b"]), &[]).is_none());
    }
}
