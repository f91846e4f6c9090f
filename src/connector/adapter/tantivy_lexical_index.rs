use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query as TantivyQuery, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING};
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};

use crate::application::{LexicalHit, LexicalIndex};
use crate::domain::{BoostConfiguration, Chunk, DomainError, FacetCounts, SearchFilters};

/// Upper bound on documents scanned to build a facet count. Facets are an
/// approximation over very large result sets, not an exact aggregate.
const FACET_SCAN_CAP: usize = 10_000;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "for", "and", "or", "is", "to", "with", "as", "by", "at",
];

struct SchemaFields {
    chunk_id: Field,
    qualified_name: Field,
    repo_file: Field,
    repository: Field,
    source_file: Field,
    language: Field,
    entity_type: Field,
    entity_name: Field,
    content: Field,
    doc_summary: Field,
    chunk_json: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer("code")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let searchable = TextOptions::default()
        .set_indexing_options(text_indexing)
        .set_stored();

    let mut builder = Schema::builder();
    let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
    let qualified_name = builder.add_text_field("qualified_name", STRING | STORED);
    let repo_file = builder.add_text_field("repo_file", STRING);
    let repository = builder.add_text_field("repository", STRING | STORED);
    let source_file = builder.add_text_field("source_file", STRING | STORED);
    let language = builder.add_text_field("language", STRING | STORED);
    let entity_type = builder.add_text_field("entity_type", STRING | STORED);
    let entity_name = builder.add_text_field("entity_name", searchable.clone());
    let content = builder.add_text_field("content", searchable.clone());
    let doc_summary = builder.add_text_field("doc_summary", searchable);
    let chunk_json = builder.add_text_field("chunk_json", STORED);
    let schema = builder.build();

    (
        schema,
        SchemaFields {
            chunk_id,
            qualified_name,
            repo_file,
            repository,
            source_file,
            language,
            entity_type,
            entity_name,
            content,
            doc_summary,
            chunk_json,
        },
    )
}

/// Word-delimiter tokenizer for identifiers: splits on non-alphanumeric
/// boundaries, then again on `camelCase`/`snake_case` boundaries, emitting
/// both the whole identifier and its sub-words lowercased so `parseJSON` and
/// `parse_json` match the same query terms as `parse` or `json` alone.
#[derive(Clone, Default)]
struct CodeTokenizer;

impl Tokenizer for CodeTokenizer {
    type TokenStream<'a> = CodeTokenStream;

    fn token_stream<'a>(&mut self, text: &'a str) -> Self::TokenStream<'a> {
        CodeTokenStream {
            tokens: tokenize_code(text),
            index: 0,
        }
    }
}

struct CodeTokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream for CodeTokenStream {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.index - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.index - 1]
    }
}

fn tokenize_code(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = 0usize;

    for (start, word) in split_words(text) {
        let lower = word.to_lowercase();
        if !STOPWORDS.contains(&lower.as_str()) {
            tokens.push(Token {
                offset_from: start,
                offset_to: start + word.len(),
                position,
                text: lower,
                position_length: 1,
            });
            position += 1;
        }

        let subwords = split_subwords(word);
        if subwords.len() > 1 {
            for sub in subwords {
                let lower_sub = sub.to_lowercase();
                if lower_sub.len() < 2 || STOPWORDS.contains(&lower_sub.as_str()) {
                    continue;
                }
                tokens.push(Token {
                    offset_from: start,
                    offset_to: start + word.len(),
                    position,
                    text: lower_sub,
                    position_length: 1,
                });
                position += 1;
            }
        }
    }

    tokens
}

fn split_words(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            words.push((start, &text[start..i]));
        } else {
            i += 1;
        }
    }
    words
}

fn split_subwords(word: &str) -> Vec<String> {
    let mut subwords = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = word.chars().collect();

    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                subwords.push(std::mem::take(&mut current));
            }
            continue;
        }
        if idx > 0 && ch.is_uppercase() && chars[idx - 1].is_lowercase() {
            if !current.is_empty() {
                subwords.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        subwords.push(current);
    }
    subwords
}

fn escape_query_syntax(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if "+-&|!(){}[]^\"~*?:\\/".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Full-text inverted index over `Chunk`s, backed by tantivy.
///
/// Single writer behind a `Mutex`, many concurrent readers through a reload
/// policy that picks up each commit after a short delay. Facet counts are
/// cached per filter set and invalidated whenever the write generation
/// advances.
pub struct TantivyLexicalIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: SchemaFields,
    boost: BoostConfiguration,
    version: AtomicU64,
    facet_cache: DashMap<String, (u64, FacetCounts)>,
}

impl TantivyLexicalIndex {
    pub fn open_or_create(index_dir: &Path, boost: BoostConfiguration) -> Result<Self, DomainError> {
        let (schema, fields) = build_schema();

        let index = if index_dir.exists() && index_dir.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) {
            Index::open_in_dir(index_dir)
                .map_err(|e| DomainError::index_write(format!("failed to open lexical index: {e}")))?
        } else {
            std::fs::create_dir_all(index_dir)?;
            Index::create_in_dir(index_dir, schema)
                .map_err(|e| DomainError::index_write(format!("failed to create lexical index: {e}")))?
        };
        index.tokenizers().register("code", CodeTokenizer);

        Self::from_index(index, fields, boost)
    }

    pub fn in_memory(boost: BoostConfiguration) -> Result<Self, DomainError> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        index.tokenizers().register("code", CodeTokenizer);
        Self::from_index(index, fields, boost)
    }

    fn from_index(index: Index, fields: SchemaFields, boost: BoostConfiguration) -> Result<Self, DomainError> {
        let writer = index
            .writer(50_000_000)
            .map_err(|e| DomainError::index_write(format!("failed to create index writer: {e}")))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| DomainError::index_write(format!("failed to build reader: {e}")))?;

        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            fields,
            boost,
            version: AtomicU64::new(0),
            facet_cache: DashMap::new(),
        })
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.facet_cache.clear();
    }

    fn boosted_parser(&self) -> QueryParser {
        let mut parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.content, self.fields.entity_name, self.fields.doc_summary],
        );
        parser.set_field_boost(self.fields.content, self.boost.content);
        parser.set_field_boost(self.fields.entity_name, self.boost.entity_name);
        parser.set_field_boost(self.fields.doc_summary, self.boost.doc_summary);
        parser
    }

    /// Parses `raw` with graceful degradation: first as written, then with
    /// special characters escaped, then as a bag-of-words disjunction of its
    /// terms, and finally as a query that matches nothing.
    fn parse_with_degradation(&self, raw: &str) -> Box<dyn TantivyQuery> {
        let parser = self.boosted_parser();

        if let Ok(query) = parser.parse_query(raw) {
            return query;
        }

        let escaped = escape_query_syntax(raw);
        if let Ok(query) = parser.parse_query(&escaped) {
            return query;
        }

        let bag_of_words = raw
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");
        if !bag_of_words.is_empty() {
            if let Ok(query) = parser.parse_query(&bag_of_words) {
                return query;
            }
        }

        self.empty_query()
    }

    fn empty_query(&self) -> Box<dyn TantivyQuery> {
        Box::new(TermQuery::new(
            Term::from_field_text(self.fields.chunk_id, "\u{0}no-match\u{0}"),
            IndexRecordOption::Basic,
        ))
    }

    fn or_terms(field: Field, values: &[String]) -> Box<dyn TantivyQuery> {
        let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = values
            .iter()
            .map(|value| {
                let term_query = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);
                (Occur::Should, Box::new(term_query) as Box<dyn TantivyQuery>)
            })
            .collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn filter_query(&self, filters: &SearchFilters) -> Option<Box<dyn TantivyQuery>> {
        let mut musts: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();

        if !filters.languages.is_empty() {
            musts.push((Occur::Must, Self::or_terms(self.fields.language, &filters.languages)));
        }
        if !filters.repositories.is_empty() {
            musts.push((Occur::Must, Self::or_terms(self.fields.repository, &filters.repositories)));
        }
        if !filters.entity_types.is_empty() {
            let values: Vec<String> = filters.entity_types.iter().map(|e| e.as_str().to_string()).collect();
            musts.push((Occur::Must, Self::or_terms(self.fields.entity_type, &values)));
        }

        if musts.is_empty() {
            None
        } else {
            Some(Box::new(BooleanQuery::new(musts)))
        }
    }

    fn build_document(&self, chunk: &Chunk) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.chunk_id, chunk.chunk_id());
        doc.add_text(
            self.fields.repo_file,
            format!("{}\u{1}{}", chunk.repository(), chunk.source_file()),
        );
        doc.add_text(self.fields.repository, chunk.repository());
        doc.add_text(self.fields.source_file, chunk.source_file());
        doc.add_text(self.fields.language, chunk.language().as_str());
        doc.add_text(self.fields.entity_type, chunk.entity_type().as_str());
        if let Some(name) = chunk.entity_name() {
            doc.add_text(self.fields.entity_name, name);
        }
        if let Some(qualified_name) = chunk.entity_qualified_name() {
            doc.add_text(self.fields.qualified_name, qualified_name);
        }
        doc.add_text(self.fields.content, chunk.content());
        if let Some(summary) = chunk.doc_summary() {
            doc.add_text(self.fields.doc_summary, summary);
        }
        doc.add_text(self.fields.chunk_json, serde_json::to_string(chunk).unwrap_or_default());
        doc
    }

    fn chunk_from_doc(&self, doc: &TantivyDocument) -> Option<Chunk> {
        let json = doc.get_first(self.fields.chunk_json).and_then(|v| v.as_str())?;
        serde_json::from_str(json).ok()
    }

    fn explain_field_match(&self, query_terms: &[String], chunk: &Chunk) -> (Vec<String>, BTreeMap<String, f32>) {
        let mut matched_fields = Vec::new();
        let mut scores = BTreeMap::new();

        for (field_name, text, boost) in [
            ("content", chunk.content(), self.boost.content),
            ("entity_name", chunk.entity_name().unwrap_or(""), self.boost.entity_name),
            ("doc_summary", chunk.doc_summary().unwrap_or(""), self.boost.doc_summary),
        ] {
            if text.is_empty() {
                continue;
            }
            let lower = text.to_lowercase();
            let hit_count = query_terms.iter().filter(|term| !term.is_empty() && lower.contains(term.as_str())).count();
            if hit_count > 0 {
                matched_fields.push(field_name.to_string());
                scores.insert(field_name.to_string(), hit_count as f32 * boost);
            }
        }

        (matched_fields, scores)
    }

    fn facet_for_field(
        &self,
        searcher: &Searcher,
        query_clause: &Option<Box<dyn TantivyQuery>>,
        filters: &SearchFilters,
        field: Field,
        limit: usize,
    ) -> Result<BTreeMap<String, u64>, DomainError> {
        let filter_clause = self.filter_query(filters);
        let query: Box<dyn TantivyQuery> = match (query_clause.as_ref().map(|q| q.box_clone()), filter_clause) {
            (Some(q), Some(f)) => Box::new(BooleanQuery::new(vec![(Occur::Must, q), (Occur::Must, f)])),
            (Some(q), None) => q,
            (None, Some(f)) => f,
            (None, None) => Box::new(tantivy::query::AllQuery),
        };
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(FACET_SCAN_CAP))
            .map_err(|e| DomainError::index_write(format!("facet scan failed: {e}")))?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for (_, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| DomainError::index_write(format!("failed to load document: {e}")))?;
            if let Some(value) = doc.get_first(field).and_then(|v| v.as_str()) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }

        let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        Ok(entries.into_iter().collect())
    }

    fn filters_cache_key(filters: &SearchFilters) -> String {
        let mut languages = filters.languages.clone();
        languages.sort();
        let mut repositories = filters.repositories.clone();
        repositories.sort();
        let mut entity_types: Vec<&str> = filters.entity_types.iter().map(|e| e.as_str()).collect();
        entity_types.sort();
        format!(
            "{}|{}|{}|{}",
            languages.join(","),
            repositories.join(","),
            entity_types.join(","),
            filters.file_path_prefix.as_deref().unwrap_or("")
        )
    }
}

#[async_trait]
impl LexicalIndex for TantivyLexicalIndex {
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DomainError::index_write("lexical writer lock poisoned"))?;
        for chunk in chunks {
            writer.delete_term(Term::from_field_text(self.fields.chunk_id, chunk.chunk_id()));
            writer
                .add_document(self.build_document(chunk))
                .map_err(|e| DomainError::index_write(format!("failed to add document: {e}")))?;
        }
        writer
            .commit()
            .map_err(|e| DomainError::index_write(format!("commit failed: {e}")))?;
        drop(writer);
        self.bump_version();
        Ok(())
    }

    async fn remove_by_file(&self, repository: &str, source_file: &str) -> Result<(), DomainError> {
        let key = format!("{repository}\u{1}{source_file}");
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DomainError::index_write("lexical writer lock poisoned"))?;
        writer.delete_term(Term::from_field_text(self.fields.repo_file, &key));
        writer
            .commit()
            .map_err(|e| DomainError::index_write(format!("commit failed: {e}")))?;
        drop(writer);
        self.bump_version();
        Ok(())
    }

    async fn remove_by_id(&self, chunk_id: &str) -> Result<(), DomainError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DomainError::index_write("lexical writer lock poisoned"))?;
        writer.delete_term(Term::from_field_text(self.fields.chunk_id, chunk_id));
        writer
            .commit()
            .map_err(|e| DomainError::index_write(format!("commit failed: {e}")))?;
        drop(writer);
        self.bump_version();
        Ok(())
    }

    async fn remove_by_repository(&self, repository: &str) -> Result<(), DomainError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DomainError::index_write("lexical writer lock poisoned"))?;
        writer.delete_term(Term::from_field_text(self.fields.repository, repository));
        writer
            .commit()
            .map_err(|e| DomainError::index_write(format!("commit failed: {e}")))?;
        drop(writer);
        self.bump_version();
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        include_field_match: bool,
    ) -> Result<Vec<LexicalHit>, DomainError> {
        let searcher = self.reader.searcher();
        let text_query = self.parse_with_degradation(query);
        let combined: Box<dyn TantivyQuery> = match self.filter_query(filters) {
            Some(filter_query) => Box::new(BooleanQuery::new(vec![(Occur::Must, text_query), (Occur::Must, filter_query)])),
            None => text_query,
        };

        // file_path_prefix has no native index support (repository/source_file
        // are exact-match terms), so over-fetch and filter in-process.
        let fetch_count = (offset + limit).saturating_mul(4).max(limit).min(FACET_SCAN_CAP);
        let top_docs = searcher
            .search(&combined, &TopDocs::with_limit(fetch_count))
            .map_err(|e| DomainError::index_write(format!("lexical search failed: {e}")))?;

        let query_terms: Vec<String> = query.split_whitespace().map(|t| t.to_lowercase()).collect();

        let mut hits = Vec::new();
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| DomainError::index_write(format!("failed to load document: {e}")))?;
            let Some(chunk) = self.chunk_from_doc(&doc) else {
                continue;
            };

            if let Some(prefix) = &filters.file_path_prefix {
                if !chunk.source_file().starts_with(prefix.as_str()) {
                    continue;
                }
            }

            let (matched_fields, field_scores) = if include_field_match {
                self.explain_field_match(&query_terms, &chunk)
            } else {
                (Vec::new(), BTreeMap::new())
            };

            hits.push(LexicalHit {
                chunk_id: chunk.chunk_id().to_string(),
                chunk,
                score,
                matched_fields,
                field_scores,
            });
        }

        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    async fn compute_facets(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<FacetCounts, DomainError> {
        let cache_key = format!("{}||{}||{}", query.trim(), Self::filters_cache_key(filters), limit);
        let version = self.version.load(Ordering::Acquire);
        if let Some(cached) = self.facet_cache.get(&cache_key) {
            if cached.0 == version {
                return Ok(cached.1.clone());
            }
        }

        let searcher = self.reader.searcher();

        // Facets are computed over (query ∧ filter), never over filter alone.
        let query_clause: Option<Box<dyn TantivyQuery>> = if query.trim().is_empty() {
            None
        } else {
            Some(self.parse_with_degradation(query))
        };

        // Exclude-self: a filter on dimension D never suppresses D's own
        // facet counts, only the other dimensions'.
        let mut without_languages = filters.clone();
        without_languages.languages.clear();
        let mut without_repositories = filters.clone();
        without_repositories.repositories.clear();
        let mut without_entity_types = filters.clone();
        without_entity_types.entity_types.clear();

        let facets = FacetCounts {
            language: self.facet_for_field(&searcher, &query_clause, &without_languages, self.fields.language, limit)?,
            repository: self.facet_for_field(
                &searcher,
                &query_clause,
                &without_repositories,
                self.fields.repository,
                limit,
            )?,
            entity_type: self.facet_for_field(
                &searcher,
                &query_clause,
                &without_entity_types,
                self.fields.entity_type,
                limit,
            )?,
        };

        self.facet_cache.insert(cache_key, (version, facets.clone()));
        Ok(facets)
    }

    async fn find_by_qualified_name(&self, repository: &str, qualified_name: &str) -> Result<Option<Chunk>, DomainError> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.repository, repository),
                    IndexRecordOption::Basic,
                )) as Box<dyn TantivyQuery>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.qualified_name, qualified_name),
                    IndexRecordOption::Basic,
                )) as Box<dyn TantivyQuery>,
            ),
        ]);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(|e| DomainError::index_write(format!("qualified-name lookup failed: {e}")))?;

        match top_docs.into_iter().next() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher
                    .doc(address)
                    .map_err(|e| DomainError::index_write(format!("failed to load document: {e}")))?;
                Ok(self.chunk_from_doc(&doc))
            }
            None => Ok(None),
        }
    }
}
