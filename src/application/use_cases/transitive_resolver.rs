use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::application::LexicalIndex;
use crate::domain::{Chunk, DomainError};

/// One chunk reached by following `extends`/`implements` edges away from a
/// seed, together with the qualified-name path that reached it.
#[derive(Debug, Clone)]
pub struct TransitiveHit {
    pub chunk: Chunk,
    pub relationship_path: Vec<String>,
}

/// Breadth-first expansion from `seeds` over the `superclass`/`interfaces`
/// edges carried in chunk attributes, bounded by `depth`. Visited is keyed on
/// `entity_qualified_name`, so a diamond inheritance graph is never
/// double-expanded. The graph itself is materialized in `petgraph` as it is
/// discovered; edges whose target isn't present in the lexical index are
/// left dangling rather than erroring.
pub async fn expand(
    lexical_index: &dyn LexicalIndex,
    repository: &str,
    seeds: &[Chunk],
    depth: u32,
) -> Result<Vec<TransitiveHit>, DomainError> {
    if depth == 0 {
        return Err(DomainError::validation("transitive depth must be at least 1"));
    }

    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut node_for_name: HashMap<String, NodeIndex> = HashMap::new();
    let mut chunk_for_name: HashMap<String, Chunk> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32, Vec<String>)> = VecDeque::new();

    for seed in seeds {
        if !seed.entity_type().is_structural() {
            continue;
        }
        let Some(name) = seed.entity_qualified_name() else {
            continue;
        };
        let name = name.to_string();
        chunk_for_name.insert(name.clone(), seed.clone());
        node_for_name
            .entry(name.clone())
            .or_insert_with(|| graph.add_node(name.clone()));
        if visited.insert(name.clone()) {
            queue.push_back((name.clone(), 0, vec![name]));
        }
    }

    let mut hits = Vec::new();

    while let Some((name, current_depth, path)) = queue.pop_front() {
        if current_depth >= depth {
            continue;
        }

        let mut edge_targets: Vec<String> = chunk_for_name
            .get(&name)
            .map(|c| c.interfaces())
            .unwrap_or_default();
        if let Some(superclass) = chunk_for_name.get(&name).and_then(|c| c.superclass()) {
            edge_targets.push(superclass.to_string());
        }

        for target_name in edge_targets {
            if target_name.is_empty() {
                continue;
            }

            let from_idx = node_for_name[&name];
            let to_idx = *node_for_name
                .entry(target_name.clone())
                .or_insert_with(|| graph.add_node(target_name.clone()));
            graph.update_edge(from_idx, to_idx, ());

            if !visited.insert(target_name.clone()) {
                continue;
            }

            let target_chunk = match chunk_for_name.get(&target_name) {
                Some(c) => c.clone(),
                None => match lexical_index.find_by_qualified_name(repository, &target_name).await? {
                    Some(c) => {
                        chunk_for_name.insert(target_name.clone(), c.clone());
                        c
                    }
                    None => continue,
                },
            };

            let mut new_path = path.clone();
            new_path.push(target_name.clone());

            hits.push(TransitiveHit {
                chunk: target_chunk,
                relationship_path: new_path.clone(),
            });

            queue.push_back((target_name, current_depth + 1, new_path));
        }
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityType, FacetCounts, Language, SearchFilters};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeIndex {
        by_name: Mutex<HashMap<String, Chunk>>,
    }

    fn interface_chunk(name: &str) -> Chunk {
        Chunk::new(
            "repo".into(),
            format!("src/{name}.rs"),
            format!("interface {name} {{}}"),
            1,
            1,
            0,
            1,
            Language::Rust,
            EntityType::Interface,
        )
        .with_entity_name(name)
    }

    #[async_trait]
    impl LexicalIndex for FakeIndex {
        async fn add_chunks(&self, _chunks: &[Chunk]) -> Result<(), DomainError> {
            Ok(())
        }
        async fn remove_by_file(&self, _repository: &str, _source_file: &str) -> Result<(), DomainError> {
            Ok(())
        }
        async fn remove_by_id(&self, _chunk_id: &str) -> Result<(), DomainError> {
            Ok(())
        }
        async fn search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
            _limit: usize,
            _offset: usize,
            _include_field_match: bool,
        ) -> Result<Vec<crate::application::LexicalHit>, DomainError> {
            Ok(vec![])
        }
        async fn compute_facets(
            &self,
            _query: &str,
            _filters: &SearchFilters,
            _limit: usize,
        ) -> Result<FacetCounts, DomainError> {
            Ok(FacetCounts::default())
        }
        async fn find_by_qualified_name(
            &self,
            _repository: &str,
            qualified_name: &str,
        ) -> Result<Option<Chunk>, DomainError> {
            Ok(self.by_name.lock().unwrap().get(qualified_name).cloned())
        }
    }

    #[tokio::test]
    async fn depth_zero_rejected() {
        let index = FakeIndex { by_name: Mutex::new(HashMap::new()) };
        let seed = interface_chunk("B");
        let err = expand(&index, "repo", &[seed], 0).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn closure_reaches_depth_two_but_not_one() {
        // I <- A <- B : B extends A, A implements I
        let mut by_name = HashMap::new();
        by_name.insert("A".to_string(), interface_chunk("A").with_attribute("interfaces", "I"));
        by_name.insert("I".to_string(), interface_chunk("I"));
        let index = FakeIndex { by_name: Mutex::new(by_name) };

        let seed = interface_chunk("B").with_attribute("superclass", "A");

        let depth1 = expand(&index, "repo", &[seed.clone()], 1).await.unwrap();
        assert_eq!(depth1.len(), 1);
        assert_eq!(depth1[0].relationship_path, vec!["B".to_string(), "A".to_string()]);

        let depth2 = expand(&index, "repo", &[seed], 2).await.unwrap();
        assert_eq!(depth2.len(), 2);
        let names: Vec<&str> = depth2.iter().filter_map(|h| h.chunk.entity_name()).collect();
        assert!(names.contains(&"A"));
        assert!(names.contains(&"I"));
    }

    #[tokio::test]
    async fn diamond_inheritance_not_double_expanded() {
        let mut by_name = HashMap::new();
        by_name.insert("A".to_string(), interface_chunk("A").with_attribute("interfaces", "Root"));
        by_name.insert("B".to_string(), interface_chunk("B").with_attribute("interfaces", "Root"));
        by_name.insert("Root".to_string(), interface_chunk("Root"));
        let index = FakeIndex { by_name: Mutex::new(by_name) };

        let seed = interface_chunk("C").with_attribute("interfaces", "A,B");
        let hits = expand(&index, "repo", &[seed], 3).await.unwrap();
        let root_hits: Vec<_> = hits.iter().filter(|h| h.chunk.entity_name() == Some("Root")).collect();
        assert_eq!(root_hits.len(), 1);
    }
}
