use std::collections::BTreeMap;

use crate::application::{LexicalHit, VectorHit};
use crate::domain::HybridWeights;

/// One side of a hybrid merge, already scored but not yet normalized.
#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    raw: f32,
}

/// Min-max scales `scores` to `[0, 1]`. A single-bucket non-empty set (every
/// score equal, including a set of one) maps to `1.0`; an empty set yields no
/// entries at all.
fn normalize(scores: &[Scored]) -> BTreeMap<usize, f32> {
    if scores.is_empty() {
        return BTreeMap::new();
    }
    let min = scores.iter().map(|s| s.raw).fold(f32::INFINITY, f32::min);
    let max = scores.iter().map(|s| s.raw).fold(f32::NEG_INFINITY, f32::max);
    scores
        .iter()
        .map(|s| {
            let norm = if max > min { (s.raw - min) / (max - min) } else { 1.0 };
            (s.index, norm)
        })
        .collect()
}

/// One row of the merged result set, before facets/transitive/pagination.
#[derive(Debug, Clone)]
pub struct MergedHit {
    pub chunk_id: String,
    pub lexical: Option<LexicalHit>,
    pub vector: Option<VectorHit>,
    pub combined_score: f32,
}

/// Normalizes both sides independently with min-max scaling, then merges by
/// `chunk_id` as `combined = keyword_weight * norm_lex + vector_weight *
/// norm_vec` (a missing side contributes 0). Lexical metadata wins when a
/// `chunk_id` is present on both sides. Sorted by `combined` descending, ties
/// broken by `chunk_id` ascending.
pub fn merge(lexical: Vec<LexicalHit>, vector: Vec<VectorHit>, weights: HybridWeights) -> Vec<MergedHit> {
    let lex_scored: Vec<Scored> = lexical
        .iter()
        .enumerate()
        .map(|(index, hit)| Scored { index, raw: hit.score })
        .collect();
    let vec_scored: Vec<Scored> = vector
        .iter()
        .enumerate()
        .map(|(index, hit)| Scored { index, raw: hit.similarity })
        .collect();

    let lex_norm = normalize(&lex_scored);
    let vec_norm = normalize(&vec_scored);

    let mut by_id: BTreeMap<String, MergedHit> = BTreeMap::new();

    for (index, hit) in lexical.into_iter().enumerate() {
        let norm = lex_norm.get(&index).copied().unwrap_or(0.0);
        by_id.insert(
            hit.chunk_id.clone(),
            MergedHit {
                chunk_id: hit.chunk_id.clone(),
                combined_score: weights.keyword_weight * norm,
                lexical: Some(hit),
                vector: None,
            },
        );
    }

    for (index, hit) in vector.into_iter().enumerate() {
        let norm = vec_norm.get(&index).copied().unwrap_or(0.0);
        let contribution = weights.vector_weight * norm;
        by_id
            .entry(hit.chunk_id.clone())
            .and_modify(|merged| {
                merged.combined_score += contribution;
                merged.vector = Some(hit.clone());
            })
            .or_insert_with(|| MergedHit {
                chunk_id: hit.chunk_id.clone(),
                combined_score: contribution,
                lexical: None,
                vector: Some(hit),
            });
    }

    let mut merged: Vec<MergedHit> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chunk, EntityType, Language};
    use std::collections::BTreeMap as Map;

    fn chunk(id: &str) -> Chunk {
        let mut c = Chunk::new(
            "repo".into(),
            "src/lib.rs".into(),
            "fn x() {}".into(),
            1,
            2,
            0,
            10,
            Language::Rust,
            EntityType::Function,
        );
        // chunk_id is derived, but tests key on the id we attach to the hit,
        // not the chunk's own derived id.
        let _ = id;
        c = c.with_entity_name("x");
        c
    }

    fn lex_hit(chunk_id: &str, score: f32) -> LexicalHit {
        LexicalHit {
            chunk_id: chunk_id.to_string(),
            chunk: chunk(chunk_id),
            score,
            matched_fields: vec![],
            field_scores: Map::new(),
        }
    }

    fn vec_hit(chunk_id: &str, similarity: f32) -> VectorHit {
        VectorHit {
            chunk_id: chunk_id.to_string(),
            metadata: Map::new(),
            similarity,
        }
    }

    #[test]
    fn dedups_overlapping_hits_to_one_row() {
        let weights = HybridWeights::default();
        let lexical = vec![lex_hit("a", 1.0)];
        let vector = vec![vec_hit("a", 1.0)];
        let merged = merge(lexical, vector, weights);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].combined_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_side_contributes_zero() {
        let weights = HybridWeights::default();
        let lexical = vec![lex_hit("a", 1.0)];
        let merged = merge(lexical, vec![], weights);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].combined_score - weights.keyword_weight).abs() < 1e-6);
    }

    #[test]
    fn single_bucket_normalizes_to_one() {
        let weights = HybridWeights::default();
        let lexical = vec![lex_hit("a", 5.0), lex_hit("b", 5.0)];
        let merged = merge(lexical, vec![], weights);
        for hit in &merged {
            assert!((hit.combined_score - weights.keyword_weight).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_inputs_yield_no_rows() {
        let merged = merge(vec![], vec![], HybridWeights::default());
        assert!(merged.is_empty());
    }

    #[test]
    fn sorted_descending_with_chunk_id_tiebreak() {
        let weights = HybridWeights::default();
        let lexical = vec![lex_hit("b", 1.0), lex_hit("a", 1.0)];
        let merged = merge(lexical, vec![], weights);
        // equal scores -> tiebreak by chunk_id ascending
        assert_eq!(merged[0].chunk_id, "a");
        assert_eq!(merged[1].chunk_id, "b");
    }

    #[test]
    fn lexical_metadata_preferred_when_both_present() {
        let weights = HybridWeights::default();
        let lexical = vec![lex_hit("a", 1.0)];
        let vector = vec![vec_hit("a", 1.0)];
        let merged = merge(lexical, vector, weights);
        assert!(merged[0].lexical.is_some());
        assert!(merged[0].vector.is_some());
    }
}
