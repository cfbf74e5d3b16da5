//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity used to rank course passages against a
//! query embedding. SQLite has no native vector index, so candidate
//! passages are loaded per course and ranked in process.

use coursepilot_core::passage::Passage;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank passages by cosine similarity to a query embedding.
///
/// Returns the top `k` passages sorted by descending similarity, with
/// each passage's `similarity` set to the cosine value clamped to
/// [0, 1]. Passages without an embedding are skipped. Ties keep the
/// input order (stable sort), which is the store's natural order.
pub fn rank_passages(passages: &[Passage], query_embedding: &[f32], k: usize) -> Vec<Passage> {
    let mut scored: Vec<Passage> = passages
        .iter()
        .filter_map(|passage| {
            let emb = passage.embedding.as_ref()?;
            let sim = cosine_similarity(emb, query_embedding).clamp(0.0, 1.0);
            let mut p = passage.clone();
            p.similarity = sim;
            Some(p)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Option<Vec<f32>>) -> Passage {
        Passage {
            id: id.into(),
            content_file_id: "f1".into(),
            course_id: "c1".into(),
            text: format!("Content for {id}"),
            position: 0,
            source_title: "Lecture".into(),
            page_number: None,
            section_heading: None,
            similarity: 0.0,
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        // similarity = 1 / sqrt(2) ≈ 0.7071
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 0.7071).abs() < 0.001);
    }

    #[test]
    fn rank_orders_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let passages = vec![
            passage("a", Some(vec![0.0, 1.0, 0.0])), // orthogonal = 0
            passage("b", Some(vec![1.0, 0.0, 0.0])), // identical = 1
            passage("c", Some(vec![0.5, 0.5, 0.0])), // partial ≈ 0.707
        ];

        let results = rank_passages(&passages, &query, 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "c");
        assert_eq!(results[2].id, "a");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_skips_missing_embeddings() {
        let query = vec![1.0, 0.0];
        let passages = vec![
            passage("a", Some(vec![1.0, 0.0])),
            passage("b", None),
        ];

        let results = rank_passages(&passages, &query, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn rank_respects_limit() {
        let query = vec![1.0, 0.0];
        let passages: Vec<_> = (0..10)
            .map(|i| passage(&format!("p{i}"), Some(vec![1.0, i as f32 * 0.1])))
            .collect();

        let results = rank_passages(&passages, &query, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn opposite_vectors_clamp_to_zero() {
        let query = vec![1.0, 0.0];
        let passages = vec![passage("a", Some(vec![-1.0, 0.0]))];

        let results = rank_passages(&passages, &query, 10);
        assert_eq!(results[0].similarity, 0.0);
    }
}
