//! Reshape raw engine output into per-token or per-sequence logits.

use crate::{InferenceError, InferenceSession, Result};
use veil_tokenizer::TokenizedResult;

/// Run a token-classification head.
///
/// Returns `token_count` rows of `num_labels` raw scores; padding rows are dropped.
pub fn run_token_classification(
    session: &dyn InferenceSession,
    tokenized: &TokenizedResult,
    num_labels: usize,
) -> Result<Vec<Vec<f32>>> {
    let output = session.run(&tokenized.input_ids, &tokenized.attention_mask)?;
    let seq_len = tokenized.max_length();

    if num_labels == 0 || output.data.len() != seq_len * num_labels {
        return Err(InferenceError::ShapeMismatch(format!(
            "expected {seq_len}x{num_labels} token logits, got {} values (shape {:?})",
            output.data.len(),
            output.shape
        )));
    }
    ensure_finite(&output.data)?;

    Ok(output
        .data
        .chunks(num_labels)
        .take(tokenized.token_count)
        .map(<[f32]>::to_vec)
        .collect())
}

/// Run a sequence-classification head and return one row of raw scores.
pub fn run_sequence_classification(
    session: &dyn InferenceSession,
    tokenized: &TokenizedResult,
    num_labels: usize,
) -> Result<Vec<f32>> {
    let output = session.run(&tokenized.input_ids, &tokenized.attention_mask)?;

    if num_labels == 0 || output.data.len() != num_labels {
        return Err(InferenceError::ShapeMismatch(format!(
            "expected {num_labels} sequence logits, got {} values (shape {:?})",
            output.data.len(),
            output.shape
        )));
    }
    ensure_finite(&output.data)?;

    Ok(output.data)
}

fn ensure_finite(data: &[f32]) -> Result<()> {
    if data.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(InferenceError::InferenceFailure(
            "model produced non-finite scores".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawOutput;

    struct FixedSession(RawOutput);

    impl InferenceSession for FixedSession {
        fn run(&self, _ids: &[i64], _mask: &[i64]) -> Result<RawOutput> {
            Ok(self.0.clone())
        }
    }

    struct FailingSession;

    impl InferenceSession for FailingSession {
        fn run(&self, _ids: &[i64], _mask: &[i64]) -> Result<RawOutput> {
            Err(InferenceError::InferenceFailure("unsupported op".to_string()))
        }
    }

    fn tokenized(max_length: usize, token_count: usize) -> TokenizedResult {
        let mut mask = vec![1; token_count];
        mask.resize(max_length, 0);
        TokenizedResult {
            input_ids: vec![0; max_length],
            attention_mask: mask,
            token_to_char_start: vec![-1; max_length],
            token_to_char_end: vec![-1; max_length],
            token_count,
        }
    }

    #[test]
    fn test_token_rows_drop_padding() {
        let session = FixedSession(RawOutput {
            shape: vec![1, 4, 2],
            data: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        });
        let rows = run_token_classification(&session, &tokenized(4, 3), 2).unwrap();
        assert_eq!(rows, vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);
    }

    #[test]
    fn test_token_shape_mismatch() {
        let session = FixedSession(RawOutput {
            shape: vec![1, 4],
            data: vec![0.0; 4],
        });
        let err = run_token_classification(&session, &tokenized(4, 2), 3).unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch(_)));
    }

    #[test]
    fn test_sequence_logits() {
        let session = FixedSession(RawOutput {
            shape: vec![1, 2],
            data: vec![2.0, 0.0],
        });
        let logits = run_sequence_classification(&session, &tokenized(8, 4), 2).unwrap();
        assert_eq!(logits, vec![2.0, 0.0]);
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        let session = FixedSession(RawOutput {
            shape: vec![1, 2],
            data: vec![f32::NAN, 0.0],
        });
        let err = run_sequence_classification(&session, &tokenized(8, 4), 2).unwrap_err();
        assert!(matches!(err, InferenceError::InferenceFailure(_)));
    }

    #[test]
    fn test_engine_failure_propagates() {
        let err = run_sequence_classification(&FailingSession, &tokenized(8, 4), 2).unwrap_err();
        assert!(matches!(err, InferenceError::InferenceFailure(_)));
    }
}
