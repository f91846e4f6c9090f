use anyhow::Result;

use crate::domain::{EntityType, Language, SearchFilters, SearchMode, SearchQuery, SearchResponse};

use super::super::Container;

/// Thin shell over [`crate::application::SearchCodeUseCase`]: parses CLI
/// arguments into a `SearchQuery`, the same shape a remote caller would
/// build from its own query parameters, and renders the response.
pub struct SearchController<'a> {
    container: &'a Container,
}

impl<'a> SearchController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn search(
        &self,
        query: String,
        limit: usize,
        offset: usize,
        mode: String,
        languages: Vec<String>,
        repositories: Vec<String>,
        file_path: Option<String>,
        entity_types: Vec<String>,
        include_field_match: bool,
        transitive: bool,
        depth: Option<u32>,
    ) -> Result<String> {
        let filters = SearchFilters {
            languages: languages
                .iter()
                .map(|l| Language::parse(l).as_str().to_string())
                .collect(),
            repositories,
            file_path_prefix: file_path,
            entity_types: entity_types
                .iter()
                .filter_map(|t| EntityType::parse(t))
                .collect(),
        };

        let search_query = SearchQuery::new(query)
            .with_mode(SearchMode::parse(&mode))
            .with_limit(limit)
            .with_offset(offset)
            .with_filters(filters)
            .with_field_match(include_field_match)
            .with_transitive(transitive, depth);

        let use_case = self.container.search_use_case()?;
        let response = use_case.execute(search_query).await?;

        Ok(self.format_response(&response))
    }

    fn format_response(&self, response: &SearchResponse) -> String {
        if response.results.is_empty() {
            return format!(
                "No results for \"{}\" ({} total, took {}ms).",
                response.query, response.total, response.took_ms
            );
        }

        let mut output = format!(
            "Found {} of {} results for \"{}\" (took {}ms):\n\n",
            response.results.len(),
            response.total,
            response.query,
            response.took_ms
        );

        for (i, result) in response.results.iter().enumerate() {
            output.push_str(&format!(
                "{}. {}:{}-{} (score: {:.3}){}\n",
                i + 1,
                result.source_file(),
                result.line_range().0,
                result.line_range().1,
                result.score(),
                if result.is_transitive() { " [transitive]" } else { "" },
            ));

            if let Some(name) = result.entity_name() {
                output.push_str(&format!(
                    "   {} {} ({}) in {}\n",
                    result.entity_type(),
                    name,
                    result.language(),
                    result.repository()
                ));
            }

            if let Some(path) = result.relationship_path() {
                output.push_str(&format!("   path: {}\n", path.join(" -> ")));
            }

            let preview: String = result
                .content()
                .lines()
                .take(5)
                .map(|l| format!("   | {}", l))
                .collect::<Vec<_>>()
                .join("\n");
            output.push_str(&preview);
            output.push_str("\n\n");
        }

        if let Some(reason) = &response.degraded {
            output.push_str(&format!("(degraded: {reason})\n\n"));
        }

        output.push_str(&format!(
            "facets: language={:?} repository={:?} entity_type={:?}\n",
            response.facets.language, response.facets.repository, response.facets.entity_type
        ));

        output
    }
}
