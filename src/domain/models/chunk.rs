use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Language;

/// A syntactic entity extracted from source: a function, a type definition, or
/// (falling back) a coarser block when no named entity could be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    chunk_id: String,
    content: String,
    entity_name: Option<String>,
    entity_qualified_name: Option<String>,
    entity_type: EntityType,
    language: Language,
    repository: String,
    source_file: String,
    start_line: u32,
    end_line: u32,
    start_byte: u32,
    end_byte: u32,
    /// Ordered so that serialization (and hashing, if ever needed) is stable.
    attributes: BTreeMap<String, String>,
    doc_summary: Option<String>,
    /// Set when the embedder could not produce a vector for this chunk; the
    /// lexical index still carries it, but the vector index does not.
    lexical_only: bool,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: String,
        source_file: String,
        content: String,
        start_line: u32,
        end_line: u32,
        start_byte: u32,
        end_byte: u32,
        language: Language,
        entity_type: EntityType,
    ) -> Self {
        let chunk_id = derive_chunk_id(&repository, &source_file, None, start_byte, end_byte);
        Self {
            chunk_id,
            content,
            entity_name: None,
            entity_qualified_name: None,
            entity_type,
            language,
            repository,
            source_file,
            start_line,
            end_line,
            start_byte,
            end_byte,
            attributes: BTreeMap::new(),
            doc_summary: None,
            lexical_only: false,
        }
    }

    pub fn with_entity_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.entity_qualified_name = Some(qualify(
            self.attributes.get("enclosing_type").map(String::as_str),
            &name,
        ));
        self.chunk_id = derive_chunk_id(
            &self.repository,
            &self.source_file,
            self.entity_qualified_name.as_deref(),
            self.start_byte,
            self.end_byte,
        );
        self.entity_name = Some(name);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_doc_summary(mut self, summary: impl Into<String>) -> Self {
        self.doc_summary = Some(summary.into());
        self
    }

    pub fn mark_lexical_only(&mut self) {
        self.lexical_only = true;
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        chunk_id: String,
        content: String,
        entity_name: Option<String>,
        entity_qualified_name: Option<String>,
        entity_type: EntityType,
        language: Language,
        repository: String,
        source_file: String,
        start_line: u32,
        end_line: u32,
        start_byte: u32,
        end_byte: u32,
        attributes: BTreeMap<String, String>,
        doc_summary: Option<String>,
        lexical_only: bool,
    ) -> Self {
        Self {
            chunk_id,
            content,
            entity_name,
            entity_qualified_name,
            entity_type,
            language,
            repository,
            source_file,
            start_line,
            end_line,
            start_byte,
            end_byte,
            attributes,
            doc_summary,
            lexical_only,
        }
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

    pub fn entity_qualified_name(&self) -> Option<&str> {
        self.entity_qualified_name.as_deref()
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn line_range(&self) -> (u32, u32) {
        (self.start_line, self.end_line)
    }

    pub fn byte_range(&self) -> (u32, u32) {
        (self.start_byte, self.end_byte)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn doc_summary(&self) -> Option<&str> {
        self.doc_summary.as_deref()
    }

    pub fn is_lexical_only(&self) -> bool {
        self.lexical_only
    }

    /// Superclass/interfaces parsed from `attributes`, as used by the
    /// transitive graph resolver (comma-separated in both attributes).
    pub fn superclass(&self) -> Option<&str> {
        self.attribute("superclass")
    }

    pub fn interfaces(&self) -> Vec<String> {
        self.attribute("interfaces")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn location(&self) -> String {
        format!(
            "{}:{}-{}",
            self.source_file, self.start_line, self.end_line
        )
    }
}

fn qualify(enclosing: Option<&str>, name: &str) -> String {
    match enclosing {
        Some(parent) if !parent.is_empty() => format!("{parent}::{name}"),
        _ => name.to_string(),
    }
}

/// Deterministic, content-addressed chunk identity: stable across
/// re-indexing runs as long as the entity doesn't move or change shape.
fn derive_chunk_id(
    repository: &str,
    source_file: &str,
    qualified_name: Option<&str>,
    start_byte: u32,
    end_byte: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository.as_bytes());
    hasher.update(b"\0");
    hasher.update(source_file.as_bytes());
    hasher.update(b"\0");
    hasher.update(qualified_name.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(start_byte.to_le_bytes());
    hasher.update(end_byte.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// The kind of syntactic entity a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
    Method,
    Constructor,
    Function,
    Struct,
    Trait,
    Impl,
    Union,
    Type,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Class => "class",
            EntityType::Interface => "interface",
            EntityType::Enum => "enum",
            EntityType::Record => "record",
            EntityType::Annotation => "annotation",
            EntityType::Method => "method",
            EntityType::Constructor => "constructor",
            EntityType::Function => "function",
            EntityType::Struct => "struct",
            EntityType::Trait => "trait",
            EntityType::Impl => "impl",
            EntityType::Union => "union",
            EntityType::Type => "type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "class" => EntityType::Class,
            "interface" => EntityType::Interface,
            "enum" => EntityType::Enum,
            "record" => EntityType::Record,
            "annotation" => EntityType::Annotation,
            "method" => EntityType::Method,
            "constructor" => EntityType::Constructor,
            "function" => EntityType::Function,
            "struct" => EntityType::Struct,
            "trait" => EntityType::Trait,
            "impl" => EntityType::Impl,
            "union" => EntityType::Union,
            "type" => EntityType::Type,
            _ => return None,
        })
    }

    /// Entity types that can carry `extends`/`implements` edges in the
    /// transitive graph resolver.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EntityType::Class
                | EntityType::Interface
                | EntityType::Struct
                | EntityType::Trait
                | EntityType::Enum
                | EntityType::Record
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Chunk {
        Chunk::new(
            "repo".into(),
            "src/lib.rs".into(),
            "fn add(a: i32, b: i32) -> i32 { a + b }".into(),
            10,
            12,
            100,
            140,
            Language::Rust,
            EntityType::Function,
        )
    }

    #[test]
    fn chunk_id_is_stable_for_identical_inputs() {
        let a = sample().with_entity_name("add");
        let b = sample().with_entity_name("add");
        assert_eq!(a.chunk_id(), b.chunk_id());
    }

    #[test]
    fn chunk_id_changes_with_byte_range() {
        let a = sample();
        let mut b = sample();
        b.end_byte = 999;
        assert_ne!(a.chunk_id(), derive_chunk_id("repo", "src/lib.rs", None, 100, 999));
        let _ = b;
    }

    #[test]
    fn qualified_name_uses_enclosing_type_attribute() {
        let chunk = sample()
            .with_attribute("enclosing_type", "Calculator")
            .with_entity_name("add");
        assert_eq!(chunk.entity_qualified_name(), Some("Calculator::add"));
    }

    #[test]
    fn interfaces_attribute_splits_on_comma() {
        let chunk = sample().with_attribute("interfaces", "Display, Debug");
        assert_eq!(
            chunk.interfaces(),
            vec!["Display".to_string(), "Debug".to_string()]
        );
    }

    #[test]
    fn line_count_invariant_holds() {
        let chunk = sample();
        let (start, end) = chunk.line_range();
        assert!(start >= 1 && end >= start);
    }
}
