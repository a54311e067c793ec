//! Adapters for the hosted services the assistant depends on.
//!
//! Every remote capability sits behind a narrow trait so view-models can be
//! driven by [`BackendClient`] in production and by [`FakeBackend`] offline.

pub mod connection;
pub mod endpoints;
mod fake;

pub use connection::{ApiConnectionError, BackendClient};
pub use endpoints::GenerationOptions;
pub use fake::{FakeBackend, ImageBehavior};

use async_trait::async_trait;

use crate::recipe::{Recipe, RecipeRequest, SearchHistoryEntry};

/// Turns a validated request into the model's raw answer (JSON or labeled
/// free text). May take several seconds.
#[async_trait]
pub trait RecipeGenerationService: Send + Sync {
    async fn generate_recipe(
        &self,
        request: &RecipeRequest,
        options: GenerationOptions,
    ) -> Result<String, ApiConnectionError>;
}

/// Best-effort image generation; callers race it against a timeout.
#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate_image(&self, prompt: &str, recipe_name: &str)
        -> Result<String, ApiConnectionError>;
}

#[async_trait]
pub trait EmailDispatchService: Send + Sync {
    async fn send_recipe_email(&self, recipe: &Recipe, address: &str)
        -> Result<(), ApiConnectionError>;
}

/// Remote store for saved recipes and the append-only search history. The
/// store is the source of truth once a recipe is saved.
#[async_trait]
pub trait RecipePersistence: Send + Sync {
    async fn persist_recipe(&self, recipe: &Recipe) -> Result<String, ApiConnectionError>;
    async fn find_saved_by_name(&self, name: &str) -> Result<Option<String>, ApiConnectionError>;
    async fn set_favorite(&self, id: &str, favorited: bool) -> Result<(), ApiConnectionError>;
    async fn delete_recipe(&self, id: &str) -> Result<(), ApiConnectionError>;
    async fn list_saved_recipes(&self) -> Result<Vec<Recipe>, ApiConnectionError>;
    async fn record_search(
        &self,
        request: &RecipeRequest,
        recipe: &Recipe,
    ) -> Result<(), ApiConnectionError>;
    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>, ApiConnectionError>;
}

/// Everything the front-end needs from one backend.
pub trait Backend:
    RecipeGenerationService + ImageGenerationService + EmailDispatchService + RecipePersistence
{
}

impl<T> Backend for T where
    T: RecipeGenerationService + ImageGenerationService + EmailDispatchService + RecipePersistence
{
}
