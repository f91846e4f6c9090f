pub mod delete_controller;
pub mod index_controller;
pub mod list_repositories_controller;
pub mod search_controller;
pub mod stats_controller;

pub use delete_controller::DeleteController;
pub use index_controller::IndexController;
pub use list_repositories_controller::ListRepositoriesController;
pub use search_controller::SearchController;
pub use stats_controller::StatsController;
