use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::application::use_cases::hybrid_merge::{self, MergedHit};
use crate::application::use_cases::transitive_resolver;
use crate::application::{Embedder, LexicalIndex, VectorIndex};
use crate::domain::{
    BoostConfiguration, Chunk, DomainError, EntityType, FacetConfig, FacetCounts, FieldMatch,
    HybridWeights, Language, SearchQuery, SearchResponse, SearchResult, TransitiveConfig,
};

/// Query-time deadline; exceeding it yields `Timeout` and discards partial
/// results rather than returning them half-formed.
const QUERY_DEADLINE: Duration = Duration::from_secs(10);

/// The Hybrid Search Orchestrator: dispatches lexical and vector search in
/// parallel, normalizes and merges their scores, computes facets, and
/// optionally expands the result set transitively.
pub struct SearchCodeUseCase {
    lexical_index: Arc<dyn LexicalIndex>,
    vector_index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    #[allow(dead_code)]
    boost: BoostConfiguration,
    weights: HybridWeights,
    facets: FacetConfig,
    transitive: TransitiveConfig,
}

impl SearchCodeUseCase {
    pub fn new(
        lexical_index: Arc<dyn LexicalIndex>,
        vector_index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        boost: BoostConfiguration,
        weights: HybridWeights,
    ) -> Result<Self, DomainError> {
        Self::with_config(
            lexical_index,
            vector_index,
            embedder,
            boost,
            weights,
            FacetConfig::default(),
            TransitiveConfig::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_config(
        lexical_index: Arc<dyn LexicalIndex>,
        vector_index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        boost: BoostConfiguration,
        weights: HybridWeights,
        facets: FacetConfig,
        transitive: TransitiveConfig,
    ) -> Result<Self, DomainError> {
        boost.validate()?;
        weights.validate()?;
        transitive.validate()?;
        Ok(Self {
            lexical_index,
            vector_index,
            embedder,
            boost,
            weights,
            facets,
            transitive,
        })
    }

    pub async fn execute(&self, query: SearchQuery) -> Result<SearchResponse, DomainError> {
        tokio::time::timeout(QUERY_DEADLINE, self.execute_inner(query))
            .await
            .map_err(|_| DomainError::Timeout)?
    }

    async fn execute_inner(&self, query: SearchQuery) -> Result<SearchResponse, DomainError> {
        if query.is_blank() {
            return Err(DomainError::validation("query must not be blank"));
        }
        if let Some(depth) = query.depth() {
            if depth == 0 {
                return Err(DomainError::validation("depth must be at least 1"));
            }
            if depth > self.transitive.max_depth {
                return Err(DomainError::validation(format!(
                    "depth must be at most {}",
                    self.transitive.max_depth
                )));
            }
        }

        let started = std::time::Instant::now();
        let mode = query.mode();
        let filters = query.filters().clone();

        let lexical_fut = async {
            if mode.runs_lexical() {
                self.lexical_index
                    .search(
                        query.query(),
                        &filters,
                        query.limit() + query.offset(),
                        0,
                        query.include_field_match(),
                    )
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };

        let vector_fut = async {
            if mode.runs_vector() {
                match self.embedder.embed(&[query.query().to_string()]).await {
                    Ok(mut vectors) => {
                        let vector = vectors.pop().unwrap_or_default();
                        self.vector_index
                            .search(&vector, query.limit() + query.offset())
                            .await
                            .map(Some)
                    }
                    Err(e) => {
                        warn!("query embedding failed, degrading to lexical-only: {}", e);
                        Ok(None)
                    }
                }
            } else {
                Ok(None)
            }
        };

        let (lexical_result, vector_result) = tokio::join!(lexical_fut, vector_fut);

        let mut degraded = None;
        let lexical_hits = match lexical_result {
            Ok(hits) => hits.unwrap_or_default(),
            Err(e) => {
                if mode.runs_vector() {
                    warn!("lexical search failed, degrading to vector-only: {}", e);
                    degraded = Some("lexical backend failed".to_string());
                    Vec::new()
                } else {
                    return Err(e);
                }
            }
        };
        let vector_hits = match vector_result {
            Ok(hits) => hits.unwrap_or_default(),
            Err(e) => {
                if mode.runs_lexical() && !lexical_hits.is_empty() {
                    warn!("vector search failed, degrading to lexical-only: {}", e);
                    degraded = Some("vector backend failed".to_string());
                    Vec::new()
                } else {
                    return Err(e);
                }
            }
        };

        if degraded.is_some() && lexical_hits.is_empty() && vector_hits.is_empty() {
            return Err(DomainError::internal("both search backends failed"));
        }

        let merged = hybrid_merge::merge(lexical_hits, vector_hits, self.weights);

        let facets = if mode.supports_facets() {
            self.lexical_index
                .compute_facets(query.query(), &filters, self.facets.limit)
                .await?
        } else {
            FacetCounts::default()
        };

        let mut results: Vec<SearchResult> = merged
            .iter()
            .map(|hit| to_search_result(hit, query.include_field_match()))
            .collect();

        if query.is_transitive() {
            let seeds: Vec<Chunk> = merged
                .iter()
                .filter_map(|hit| hit.lexical.as_ref().map(|l| l.chunk.clone()))
                .collect();
            let depth = query.depth().unwrap_or(self.transitive.default_depth);
            let repository = filters.repositories.first().cloned().unwrap_or_default();
            match transitive_resolver::expand(self.lexical_index.as_ref(), &repository, &seeds, depth).await {
                Ok(hits) => {
                    for hit in hits {
                        results.push(chunk_to_result(&hit.chunk, 0.0).with_transitive(hit.relationship_path));
                    }
                }
                Err(e) => warn!("transitive expansion failed, returning direct hits only: {}", e),
            }
        }

        let total = results.len();
        let page: Vec<SearchResult> = results
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();

        Ok(SearchResponse {
            results: page,
            total,
            page: query.offset() / query.limit().max(1),
            size: query.limit(),
            query: query.query().to_string(),
            took_ms: started.elapsed().as_millis() as u64,
            facets,
            degraded,
        })
    }
}

fn to_search_result(hit: &MergedHit, include_field_match: bool) -> SearchResult {
    let chunk = hit
        .lexical
        .as_ref()
        .map(|l| l.chunk.clone())
        .unwrap_or_else(|| chunk_from_vector_metadata(hit));

    let mut result = chunk_to_result(&chunk, hit.combined_score);

    if include_field_match {
        if let Some(lexical) = &hit.lexical {
            result = result.with_field_match(FieldMatch {
                matched_fields: lexical.matched_fields.clone(),
                scores: lexical.field_scores.clone(),
            });
        }
    }

    result
}

fn chunk_to_result(chunk: &Chunk, score: f32) -> SearchResult {
    SearchResult::new(
        chunk.chunk_id().to_string(),
        chunk.content().to_string(),
        chunk.entity_name().map(String::from),
        chunk.entity_type(),
        chunk.source_file().to_string(),
        chunk.language().as_str().to_string(),
        chunk.repository().to_string(),
        score,
        chunk.line_range(),
        chunk.doc_summary().map(String::from),
    )
}

/// A vector-only hit (no lexical counterpart) is reconstructed from its
/// stored metadata payload rather than a round-trip to the lexical index.
fn chunk_from_vector_metadata(hit: &MergedHit) -> Chunk {
    let metadata = hit.vector.as_ref().map(|v| &v.metadata);
    let get = |key: &str| metadata.and_then(|m| m.get(key)).cloned().unwrap_or_default();

    let language = Language::parse(&get("language"));
    let entity_type = EntityType::parse(&get("entity_type")).unwrap_or(EntityType::Function);
    let start_line: u32 = get("start_line").parse().unwrap_or(1);
    let end_line: u32 = get("end_line").parse().unwrap_or(start_line);

    let mut chunk = Chunk::new(
        get("repository"),
        get("source_file"),
        get("content"),
        start_line,
        end_line,
        0,
        0,
        language,
        entity_type,
    );
    if let Some(name) = metadata.and_then(|m| m.get("entity_name")) {
        chunk = chunk.with_entity_name(name.clone());
    }
    if let Some(summary) = metadata.and_then(|m| m.get("doc_summary")) {
        chunk = chunk.with_doc_summary(summary.clone());
    }
    chunk.mark_lexical_only();
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_weights_rejected_before_any_query_runs() {
        let bad_weights = HybridWeights {
            keyword_weight: 0.9,
            vector_weight: 0.9,
        };
        assert!(bad_weights.validate().is_err());
    }

    #[test]
    fn invalid_transitive_config_rejected_before_any_query_runs() {
        let bad_transitive = TransitiveConfig {
            default_depth: 20,
            max_depth: 10,
        };
        assert!(bad_transitive.validate().is_err());
    }
}
