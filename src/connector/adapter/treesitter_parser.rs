use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::application::CodeParser;
use crate::domain::{Chunk, DomainError, EntityType, Language};

/// Minimum trimmed body length for a captured node to be kept as a chunk.
/// Filters out degenerate matches (forward declarations, type aliases to a
/// single primitive) that would otherwise pollute the index with near-empty
/// documents.
const MIN_CHUNK_LEN: usize = 8;

/// `CodeParser` backed by tree-sitter grammars, one query per supported
/// language mapping named captures onto entity kinds. A parse failure for
/// one file surfaces as a single `ParseError`; callers log and skip it, it
/// never partially applies a file's chunks.
pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }

    fn ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::HCL => Some(tree_sitter_hcl::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Unknown => None,
        }
    }

    /// Named captures: a bare `@<kind>` on the outer node selects the entity
    /// kind (via `capture_to_entity_type`); `@name` is the entity's leaf
    /// identifier; `@superclass`/`@interface` feed the transitive resolver's
    /// edges.
    fn query_source(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (struct_item name: (type_identifier) @name) @struct
                (enum_item name: (type_identifier) @name) @enum
                (trait_item name: (type_identifier) @name) @trait
                (impl_item trait: (type_identifier)? @superclass type: (type_identifier) @name) @impl
                (type_item name: (type_identifier) @name) @type
                (union_item name: (type_identifier) @name) @union
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition
                    name: (identifier) @name
                    superclasses: (argument_list (identifier) @superclass)?) @class
                "#
            }
            Language::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_definition name: (property_identifier) @name) @method
                (class_declaration
                    name: (identifier) @name
                    (class_heritage (identifier) @superclass)?) @class
                "#
            }
            Language::TypeScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_definition name: (property_identifier) @name) @method
                (class_declaration
                    name: (type_identifier) @name
                    (class_heritage (extends_clause value: (identifier) @superclass))?) @class
                (interface_declaration
                    name: (type_identifier) @name
                    (extends_type_clause (type_identifier) @interface)?) @interface
                (type_alias_declaration name: (type_identifier) @name) @type
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @method
                (type_spec name: (type_identifier) @name type: (struct_type)) @struct
                (type_spec name: (type_identifier) @name type: (interface_type)) @interface
                "#
            }
            Language::Php => {
                r#"
                (function_definition name: (name) @name) @function
                (method_declaration name: (name) @name) @method
                (class_declaration
                    name: (name) @name
                    (base_clause (name) @superclass)?
                    (class_interface_clause (name) @interface)?) @class
                (interface_declaration
                    name: (name) @name
                    (base_clause (name) @interface)?) @interface
                (trait_declaration name: (name) @name) @trait
                (enum_declaration name: (name) @name) @enum
                "#
            }
            Language::HCL => {
                r#"
                (block (identifier) @name) @type
                "#
            }
            Language::Unknown => "",
        }
    }

    fn capture_to_entity_type(capture_name: &str) -> Option<EntityType> {
        match capture_name {
            "class" => Some(EntityType::Class),
            "interface" => Some(EntityType::Interface),
            "enum" => Some(EntityType::Enum),
            "record" => Some(EntityType::Record),
            "annotation" => Some(EntityType::Annotation),
            "method" => Some(EntityType::Method),
            "constructor" => Some(EntityType::Constructor),
            "function" => Some(EntityType::Function),
            "struct" => Some(EntityType::Struct),
            "trait" => Some(EntityType::Trait),
            "impl" => Some(EntityType::Impl),
            "union" => Some(EntityType::Union),
            "type" => Some(EntityType::Type),
            _ => None,
        }
    }

    /// Containers, per language, whose own name doubles as the
    /// `enclosing_type` attribute for nested methods. Keyed on tree-sitter
    /// node kind; the value is the field holding the container's own name.
    fn container_name_field(language: Language, kind: &str) -> Option<&'static str> {
        match (language, kind) {
            (Language::Rust, "impl_item") => Some("type"),
            (Language::Rust, "trait_item") => Some("name"),
            (Language::Python, "class_definition") => Some("name"),
            (Language::JavaScript, "class_declaration") => Some("name"),
            (Language::TypeScript, "class_declaration") => Some("name"),
            (Language::TypeScript, "interface_declaration") => Some("name"),
            (Language::Php, "class_declaration") => Some("name"),
            (Language::Php, "interface_declaration") => Some("name"),
            (Language::Php, "trait_declaration") => Some("name"),
            _ => None,
        }
    }

    fn enclosing_type(language: Language, node: Node, content: &str) -> Option<String> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if let Some(field) = Self::container_name_field(language, parent.kind()) {
                if let Some(name_node) = parent.child_by_field_name(field) {
                    return Some(content[name_node.byte_range()].to_string());
                }
            }
            current = parent.parent();
        }
        None
    }

    /// A doc comment is the single comment node immediately preceding the
    /// entity, stripped of its delimiters. Consecutive single-line comments
    /// are not coalesced; the nearest one is taken as the summary.
    fn doc_summary(node: Node, content: &str) -> Option<String> {
        let candidate = node.prev_sibling()?;
        if !candidate.kind().contains("comment") {
            return None;
        }
        let text = content[candidate.byte_range()].to_string();
        let stripped = strip_comment_markers(&text);
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    }

    fn field_attribute(node: Node, field: &str, content: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| content[n.byte_range()].to_string())
    }
}

fn strip_comment_markers(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl CodeParser for TreeSitterParser {
    fn supports(&self, language: Language) -> bool {
        self.supported_languages.contains(&language)
    }

    fn parse(
        &self,
        repository: &str,
        source_file: &str,
        content: &str,
        language: Language,
    ) -> Result<Vec<Chunk>, DomainError> {
        let ts_language = self
            .ts_language(language)
            .ok_or_else(|| DomainError::parse(format!("unsupported language: {language:?}")))?;

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DomainError::parse(format!("failed to set grammar: {e}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse(format!("failed to parse {source_file}")))?;

        let query_source = self.query_source(language);
        if query_source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(&ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("invalid query for {language:?}: {e}")))?;

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let bytes = content.as_bytes();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), bytes);

        let mut chunks = Vec::new();

        while let Some(query_match) = matches_iter.next() {
            let mut main_node: Option<Node> = None;
            let mut entity_type: Option<EntityType> = None;
            let mut name_node: Option<Node> = None;
            let mut superclass: Option<String> = None;
            let mut interfaces: Vec<String> = Vec::new();

            for capture in query_match.captures {
                let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                match capture_name {
                    "name" => name_node = Some(capture.node),
                    "superclass" => superclass = Some(content[capture.node.byte_range()].to_string()),
                    "interface" => interfaces.push(content[capture.node.byte_range()].to_string()),
                    other => {
                        if let Some(et) = Self::capture_to_entity_type(other) {
                            main_node = Some(capture.node);
                            entity_type = Some(et);
                        }
                    }
                }
            }

            let (Some(node), Some(mut entity_type)) = (main_node, entity_type) else {
                continue;
            };

            let entity_text = &content[node.byte_range()];
            if entity_text.trim().len() < MIN_CHUNK_LEN {
                continue;
            }

            let start_line = node.start_position().row as u32 + 1;
            let end_line = node.end_position().row as u32 + 1;
            let start_byte = node.start_byte() as u32;
            let end_byte = node.end_byte() as u32;

            let enclosing = Self::enclosing_type(language, node, content);

            let name = name_node.map(|n| content[n.byte_range()].to_string());
            if entity_type == EntityType::Method {
                if let Some(n) = &name {
                    if n == "constructor" || n == "__construct" {
                        entity_type = EntityType::Constructor;
                    }
                }
            }

            let mut chunk = Chunk::new(
                repository.to_string(),
                source_file.to_string(),
                entity_text.to_string(),
                start_line,
                end_line,
                start_byte,
                end_byte,
                language,
                entity_type,
            );

            if let Some(enclosing_type) = &enclosing {
                chunk = chunk.with_attribute("enclosing_type", enclosing_type.clone());
            }
            if let Some(name) = name {
                chunk = chunk.with_entity_name(name);
            }
            if let Some(superclass) = superclass.filter(|s| !s.is_empty()) {
                chunk = chunk.with_attribute("superclass", superclass);
            }
            if !interfaces.is_empty() {
                chunk = chunk.with_attribute("interfaces", interfaces.join(", "));
            }
            if let Some(params) = Self::field_attribute(node, "parameters", content) {
                chunk = chunk.with_attribute("parameters", params);
            }
            if let Some(return_type) = Self::field_attribute(node, "return_type", content) {
                chunk = chunk.with_attribute("return_type", return_type);
            }
            if let Some(result) = Self::field_attribute(node, "result", content) {
                chunk = chunk.with_attribute("return_type", result);
            }
            if let Some(summary) = Self::doc_summary(node, content) {
                chunk = chunk.with_doc_summary(summary);
            }

            chunks.push(chunk);
        }

        debug!(
            "parsed {} chunks from {} ({:?})",
            chunks.len(),
            source_file,
            language
        );

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_function_is_extracted_with_name_and_return_type() {
        let parser = TreeSitterParser::new();
        let source = "pub fn add(a: i32, b: i32) -> i32 { a + b }\n";
        let chunks = parser
            .parse("repo", "src/lib.rs", source, Language::Rust)
            .expect("parse should succeed");
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.entity_type(), EntityType::Function);
        assert_eq!(chunk.entity_name(), Some("add"));
        assert_eq!(chunk.attribute("return_type"), Some("i32"));
    }

    #[test]
    fn rust_impl_trait_captures_superclass() {
        let parser = TreeSitterParser::new();
        let source = "struct Foo;\nimpl Display for Foo {\n    fn fmt(&self) {}\n}\n";
        let chunks = parser
            .parse("repo", "src/lib.rs", source, Language::Rust)
            .expect("parse should succeed");
        let impl_chunk = chunks
            .iter()
            .find(|c| c.entity_type() == EntityType::Impl)
            .expect("impl chunk present");
        assert_eq!(impl_chunk.entity_name(), Some("Foo"));
        assert_eq!(impl_chunk.superclass(), Some("Display"));
    }

    #[test]
    fn python_class_with_base_is_captured() {
        let parser = TreeSitterParser::new();
        let source = "class Dog(Animal):\n    def bark(self):\n        pass\n";
        let chunks = parser
            .parse("repo", "animal.py", source, Language::Python)
            .expect("parse should succeed");
        let class_chunk = chunks
            .iter()
            .find(|c| c.entity_type() == EntityType::Class)
            .expect("class chunk present");
        assert_eq!(class_chunk.entity_name(), Some("Dog"));
        assert_eq!(class_chunk.superclass(), Some("Animal"));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let parser = TreeSitterParser::new();
        assert!(!parser.supports(Language::Unknown));
        let err = parser
            .parse("repo", "f.unknown", "???", Language::Unknown)
            .unwrap_err();
        assert!(matches!(err, DomainError::ParseError(_)));
    }

    #[test]
    fn degenerate_match_below_min_length_is_skipped() {
        let parser = TreeSitterParser::new();
        let source = "type X = u8;\n";
        let chunks = parser
            .parse("repo", "src/lib.rs", source, Language::Rust)
            .expect("parse should succeed");
        assert!(chunks.iter().all(|c| c.content().trim().len() >= MIN_CHUNK_LEN));
    }
}
