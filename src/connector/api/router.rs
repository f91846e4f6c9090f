use anyhow::Result;

use crate::cli::Commands;

use super::container::Container;
use super::controller::{
    DeleteController, IndexController, ListRepositoriesController, SearchController,
    StatsController,
};

/// Dispatches a parsed CLI command to its controller: one match arm per
/// operation, no business logic of its own.
pub struct Router<'a> {
    search_controller: SearchController<'a>,
    index_controller: IndexController<'a>,
    list_repositories_controller: ListRepositoriesController<'a>,
    delete_controller: DeleteController<'a>,
    stats_controller: StatsController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            search_controller: SearchController::new(container),
            index_controller: IndexController::new(container),
            list_repositories_controller: ListRepositoriesController::new(container),
            delete_controller: DeleteController::new(container),
            stats_controller: StatsController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Index { path, name, incremental } => {
                self.index_controller.index(path, name, incremental).await
            }
            Commands::Search {
                query,
                limit,
                offset,
                mode,
                languages,
                repositories,
                file_path,
                entity_types,
                include_field_match,
                transitive,
                depth,
            } => {
                self.search_controller
                    .search(
                        query,
                        limit,
                        offset,
                        mode,
                        languages,
                        repositories,
                        file_path,
                        entity_types,
                        include_field_match,
                        transitive,
                        depth,
                    )
                    .await
            }
            Commands::List => self.list_repositories_controller.list().await,
            Commands::Delete { id_or_path } => self.delete_controller.delete(id_or_path).await,
            Commands::Stats => self.stats_controller.stats().await,
        }
    }
}
