use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EntityType;

/// Which back-end(s) a query is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Keyword,
    Vector,
}

impl SearchMode {
    /// Parses case-insensitively; an unrecognized value falls back to
    /// `Hybrid` rather than rejecting the query.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "keyword" => SearchMode::Keyword,
            "vector" => SearchMode::Vector,
            _ => SearchMode::Hybrid,
        }
    }

    pub fn runs_lexical(&self) -> bool {
        !matches!(self, SearchMode::Vector)
    }

    pub fn runs_vector(&self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }

    pub fn supports_facets(&self) -> bool {
        !matches!(self, SearchMode::Vector)
    }

    pub fn supports_transitive(&self) -> bool {
        !matches!(self, SearchMode::Vector)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub languages: Vec<String>,
    pub repositories: Vec<String>,
    pub file_path_prefix: Option<String>,
    pub entity_types: Vec<EntityType>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
            && self.repositories.is_empty()
            && self.file_path_prefix.is_none()
            && self.entity_types.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    query: String,
    mode: SearchMode,
    limit: usize,
    offset: usize,
    filters: SearchFilters,
    include_field_match: bool,
    transitive: bool,
    depth: Option<u32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Hybrid,
            limit: 10,
            offset: 0,
            filters: SearchFilters::default(),
            include_field_match: false,
            transitive: false,
            depth: None,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Clamped to the Search API's documented bounds of `[1, 100]`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, 100);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_field_match(mut self, include: bool) -> Self {
        self.include_field_match = include;
        self
    }

    pub fn with_transitive(mut self, transitive: bool, depth: Option<u32>) -> Self {
        self.transitive = transitive;
        self.depth = depth;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub fn include_field_match(&self) -> bool {
        self.include_field_match
    }

    pub fn is_transitive(&self) -> bool {
        self.transitive && self.mode.supports_transitive()
    }

    pub fn depth(&self) -> Option<u32> {
        self.depth
    }

    pub fn is_blank(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// Per-field score contribution, returned when `include_field_match` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatch {
    pub matched_fields: Vec<String>,
    pub scores: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    chunk_id: String,
    content: String,
    entity_name: Option<String>,
    entity_type: EntityType,
    source_file: String,
    language: String,
    repository: String,
    score: f32,
    line_range: (u32, u32),
    doc_summary: Option<String>,
    field_match: Option<FieldMatch>,
    is_transitive: bool,
    relationship_path: Option<Vec<String>>,
}

impl SearchResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chunk_id: String,
        content: String,
        entity_name: Option<String>,
        entity_type: EntityType,
        source_file: String,
        language: String,
        repository: String,
        score: f32,
        line_range: (u32, u32),
        doc_summary: Option<String>,
    ) -> Self {
        Self {
            chunk_id,
            content,
            entity_name,
            entity_type,
            source_file,
            language,
            repository,
            score,
            line_range,
            doc_summary,
            field_match: None,
            is_transitive: false,
            relationship_path: None,
        }
    }

    pub fn with_field_match(mut self, field_match: FieldMatch) -> Self {
        self.field_match = Some(field_match);
        self
    }

    pub fn with_transitive(mut self, path: Vec<String>) -> Self {
        self.is_transitive = true;
        self.relationship_path = Some(path);
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.entity_name.as_deref()
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn line_range(&self) -> (u32, u32) {
        self.line_range
    }

    pub fn doc_summary(&self) -> Option<&str> {
        self.doc_summary.as_deref()
    }

    pub fn field_match(&self) -> Option<&FieldMatch> {
        self.field_match.as_ref()
    }

    pub fn is_transitive(&self) -> bool {
        self.is_transitive
    }

    pub fn relationship_path(&self) -> Option<&[String]> {
        self.relationship_path.as_deref()
    }

    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// Top-N facet counts for one dimension, always present even when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetCounts {
    pub language: BTreeMap<String, u64>,
    pub repository: BTreeMap<String, u64>,
    pub entity_type: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub query: String,
    pub took_ms: u64,
    pub facets: FacetCounts,
    /// Set when one back-end failed in hybrid mode and the other's results
    /// were served alone.
    pub degraded: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively_and_falls_back() {
        assert_eq!(SearchMode::parse("KEYWORD"), SearchMode::Keyword);
        assert_eq!(SearchMode::parse("Vector"), SearchMode::Vector);
        assert_eq!(SearchMode::parse("bogus"), SearchMode::Hybrid);
    }

    #[test]
    fn vector_mode_disables_facets_and_transitive() {
        assert!(!SearchMode::Vector.supports_facets());
        assert!(!SearchMode::Vector.supports_transitive());
        assert!(SearchMode::Keyword.supports_facets());
    }

    #[test]
    fn limit_clamped_to_api_bounds() {
        let q = SearchQuery::new("x").with_limit(500);
        assert_eq!(q.limit(), 100);
        let q = SearchQuery::new("x").with_limit(0);
        assert_eq!(q.limit(), 1);
    }

    #[test]
    fn blank_query_detected() {
        assert!(SearchQuery::new("   ").is_blank());
        assert!(!SearchQuery::new("foo").is_blank());
    }
}
