//! Exhaustive cosine-similarity ranking over the corpus.
//!
//! A full O(N·D) scan: the corpus is a few hundred respondents. Anything
//! much larger would want an approximate index instead of this module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::semantic::corpus::CorpusStore;
use crate::semantic::errors::MatchError;

/// A ranked corpus entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub participant_id: String,
    /// Cosine similarity in [-1, 1]
    pub similarity_score: f64,
    pub data: BTreeMap<String, String>,
}

/// Compute L2 norm of a vector, accumulated in f64.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| {
            let x = f64::from(*x);
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

/// Zero or non-finite norms cannot be normalized.
pub fn is_degenerate(norm: f64) -> bool {
    norm == 0.0 || !norm.is_finite()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// Cosine similarity of two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            context: "cosine similarity".to_string(),
            expected: a.len(),
            got: b.len(),
        });
    }

    let (norm_a, norm_b) = (l2_norm(a), l2_norm(b));
    if is_degenerate(norm_a) || is_degenerate(norm_b) {
        return Err(MatchError::DegenerateVector(
            "cannot compare a zero-norm vector".to_string(),
        ));
    }

    Ok(scaled(dot(a, b), norm_a, norm_b))
}

fn scaled(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    // adding 0.0 turns -0.0 into 0.0, so orthogonal records tie
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) + 0.0
}

/// Rank every corpus record against `query` and keep the best `k`.
///
/// Scores are non-increasing. Records with exactly equal scores keep their
/// corpus order, so the first one seen wins a tie. `k` larger than the
/// corpus returns the whole corpus.
pub fn rank(query: &[f32], corpus: &CorpusStore, k: usize) -> Result<Vec<MatchResult>, MatchError> {
    if k == 0 {
        return Err(MatchError::InvalidInput(
            "number of matches must be at least 1".to_string(),
        ));
    }

    if query.len() != corpus.dimensions() {
        return Err(MatchError::DimensionMismatch {
            context: "query vector".to_string(),
            expected: corpus.dimensions(),
            got: query.len(),
        });
    }

    let query_norm = l2_norm(query);
    if is_degenerate(query_norm) {
        return Err(MatchError::DegenerateVector(
            "query embedding has zero norm".to_string(),
        ));
    }

    let mut scored = Vec::with_capacity(corpus.len());
    for (record, norm) in corpus.iter_with_norms() {
        if is_degenerate(norm) {
            return Err(MatchError::DegenerateVector(format!(
                "corpus record '{}' has a zero-norm embedding",
                record.participant_id
            )));
        }
        scored.push((record, scaled(dot(query, &record.embedding), query_norm, norm)));
    }

    // sort_by is stable: equal scores stay in corpus order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(record, score)| MatchResult {
            participant_id: record.participant_id.clone(),
            similarity_score: score,
            data: record.data.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::corpus::CorpusRecord;

    fn corpus(vectors: &[(&str, Vec<f32>)]) -> CorpusStore {
        let records = vectors
            .iter()
            .map(|(id, embedding)| CorpusRecord {
                participant_id: id.to_string(),
                embedding: embedding.clone(),
                data: BTreeMap::new(),
            })
            .collect();
        CorpusStore::from_records(records, None, None).unwrap()
    }

    fn ids(results: &[MatchResult]) -> Vec<&str> {
        results.iter().map(|r| r.participant_id.as_str()).collect()
    }

    #[test]
    fn test_three_record_scenario() {
        let store = corpus(&[
            ("record1", vec![1.0, 0.0]),
            ("record2", vec![0.0, 1.0]),
            ("record3", vec![0.7, 0.7]),
        ]);

        let results = rank(&[1.0, 0.0], &store, 3).unwrap();

        assert_eq!(ids(&results), vec!["record1", "record3", "record2"]);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-9);
        assert!((results[1].similarity_score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(results[2].similarity_score.abs() < 1e-9);
    }

    #[test]
    fn test_scores_non_increasing() {
        let store = corpus(&[
            ("a", vec![0.1, 0.9, 0.3]),
            ("b", vec![-1.0, 0.2, 0.0]),
            ("c", vec![0.5, 0.5, 0.5]),
            ("d", vec![0.9, -0.1, 0.2]),
            ("e", vec![0.0, 0.0, 1.0]),
        ]);

        let results = rank(&[0.3, 0.4, 0.5], &store, 5).unwrap();
        assert_eq!(results.len(), 5);
        assert!(results
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    #[test]
    fn test_self_similarity() {
        let target = vec![0.013, -0.42, 0.77, 0.0005, -0.31, 0.92, 0.11, -0.06];
        let store = corpus(&[
            ("other", vec![0.5, 0.1, -0.2, 0.3, 0.0, 0.4, -0.9, 0.2]),
            ("self", target.clone()),
        ]);

        let results = rank(&target, &store, 1).unwrap();
        assert_eq!(results[0].participant_id, "self");
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_bound() {
        let store = corpus(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![1.0, 1.0]),
        ]);

        for k in 1..=5 {
            let results = rank(&[1.0, 0.2], &store, k).unwrap();
            assert_eq!(results.len(), k.min(store.len()));
        }
    }

    #[test]
    fn test_zero_k_rejected() {
        let store = corpus(&[("a", vec![1.0, 0.0])]);
        assert!(matches!(
            rank(&[1.0, 0.0], &store, 0),
            Err(MatchError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        // same direction, different magnitudes: identical cosine
        let store = corpus(&[
            ("low", vec![0.0, 1.0]),
            ("first", vec![2.0, 0.0]),
            ("second", vec![1.0, 0.0]),
            ("third", vec![5.0, 0.0]),
        ]);

        let results = rank(&[1.0, 0.0], &store, 4).unwrap();
        assert_eq!(ids(&results), vec!["first", "second", "third", "low"]);
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
    }

    #[test]
    fn test_orthogonal_ties_keep_corpus_order() {
        // dot products of -0.0 and 0.0
        let store = corpus(&[("first", vec![-1.0, 0.0]), ("second", vec![1.0, 0.0])]);

        let results = rank(&[0.0, -1.0], &store, 2).unwrap();
        assert_eq!(ids(&results), vec!["first", "second"]);
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
        assert!(results[0].similarity_score.is_sign_positive());
    }

    #[test]
    fn test_tiny_vectors_are_not_degenerate() {
        let store = corpus(&[("tiny", vec![1e-8, 0.0]), ("other", vec![0.0, 1e-8])]);

        let results = rank(&[1e-8, 0.0], &store, 2).unwrap();
        assert_eq!(ids(&results), vec!["tiny", "other"]);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1e-9, 0.0], &[2e-9, 0.0]).is_ok());
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let store = corpus(&[
            ("a", vec![0.2, 0.8]),
            ("b", vec![0.8, 0.2]),
            ("c", vec![0.5, 0.5]),
        ]);

        let first = rank(&[0.6, 0.4], &store, 3).unwrap();
        let second = rank(&[0.6, 0.4], &store, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_query_is_degenerate() {
        let store = corpus(&[("a", vec![1.0, 0.0])]);
        assert!(matches!(
            rank(&[0.0, 0.0], &store, 1),
            Err(MatchError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_zero_corpus_vector_is_degenerate() {
        let store = corpus(&[("a", vec![1.0, 0.0]), ("zero", vec![0.0, 0.0])]);
        assert!(matches!(
            rank(&[1.0, 0.0], &store, 1),
            Err(MatchError::DegenerateVector(msg)) if msg.contains("zero")
        ));
    }

    #[test]
    fn test_nan_query_is_degenerate() {
        let store = corpus(&[("a", vec![1.0, 0.0])]);
        assert!(matches!(
            rank(&[f32::NAN, 1.0], &store, 1),
            Err(MatchError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = corpus(&[("a", vec![1.0, 0.0])]);
        assert!(matches!(
            rank(&[1.0, 0.0, 0.0], &store, 1),
            Err(MatchError::DimensionMismatch {
                expected: 2,
                got: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_result_carries_display_payload() {
        let mut data = BTreeMap::new();
        data.insert("Age".to_string(), "31".to_string());
        let store = CorpusStore::from_records(
            vec![CorpusRecord {
                participant_id: "p1".to_string(),
                embedding: vec![1.0, 0.0],
                data: data.clone(),
            }],
            None,
            None,
        )
        .unwrap();

        let results = rank(&[1.0, 0.0], &store, 1).unwrap();
        assert_eq!(results[0].data, data);
    }
}
