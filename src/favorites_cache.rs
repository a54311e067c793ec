//! Local, non-authoritative copy of the user's favorited recipes.
//!
//! The remote store stays the source of truth. The saved-recipes screen falls
//! back to this copy when the store cannot be reached. A missing or corrupt
//! file is treated as an empty cache.

use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::recipe::Recipe;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write favorites cache {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode favorites cache: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct FavoritesCache {
    path: PathBuf,
    recipes: Vec<Recipe>,
}

fn cache_key(recipe: &Recipe) -> &str {
    recipe.id.as_deref().unwrap_or(recipe.name.as_str())
}

impl FavoritesCache {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recipes: Vec::new(),
        }
    }

    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let recipes = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<Recipe>>(&content) {
                Ok(recipes) => recipes,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Ignoring unreadable favorites cache");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        debug!(path = ?path, count = recipes.len(), "Loaded favorites cache");
        Self { path, recipes }
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn contains(&self, recipe: &Recipe) -> bool {
        let key = cache_key(recipe);
        self.recipes.iter().any(|cached| cache_key(cached) == key)
    }

    /// Records a favorite, replacing any earlier copy with the same key.
    pub async fn remember(&mut self, recipe: &Recipe) -> Result<(), CacheError> {
        let key = cache_key(recipe).to_string();
        self.recipes.retain(|cached| cache_key(cached) != key);
        let mut cached = recipe.clone();
        cached.favorited = true;
        self.recipes.push(cached);
        self.flush().await
    }

    pub async fn forget(&mut self, recipe: &Recipe) -> Result<(), CacheError> {
        let key = cache_key(recipe).to_string();
        self.recipes.retain(|cached| cache_key(cached) != key);
        self.flush().await
    }

    /// Mirrors the remote favorite flag for one recipe.
    pub async fn sync(&mut self, recipe: &Recipe) -> Result<(), CacheError> {
        if recipe.favorited {
            self.remember(recipe).await
        } else {
            self.forget(recipe).await
        }
    }

    pub async fn clear(&mut self) -> Result<(), CacheError> {
        self.recipes.clear();
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let io_error = |source: std::io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(&self.recipes)?;
        fs::write(&self.path, content).await.map_err(io_error)
    }
}
