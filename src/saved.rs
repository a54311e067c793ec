//! Saved-recipes screen: filtering, searching, sorting and optimistic edits.

use std::cmp::Ordering;
use std::str::FromStr;
use tracing::{info, warn};

use crate::api_connection::{ApiConnectionError, RecipePersistence};
use crate::favorites_cache::FavoritesCache;
use crate::notify::Notices;
use crate::recipe::Recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Calories,
    Protein,
    CookingTime,
    CreatedAt,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "calories" => Ok(SortKey::Calories),
            "protein" => Ok(SortKey::Protein),
            "time" | "cooking-time" => Ok(SortKey::CookingTime),
            "created" | "date" => Ok(SortKey::CreatedAt),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// How an optimistic edit ended. The local change is applied before the
/// remote call either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticOutcome {
    Confirmed,
    Reverted { error: String },
}

impl OptimisticOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, OptimisticOutcome::Confirmed)
    }
}

#[derive(Debug, Clone)]
pub struct SavedRecipes {
    recipes: Vec<Recipe>,
    favorites_only: bool,
    search: String,
    sort_key: SortKey,
    direction: SortDirection,
    notices: Notices,
}

impl Default for SavedRecipes {
    fn default() -> Self {
        Self {
            recipes: Vec::new(),
            favorites_only: false,
            search: String::new(),
            sort_key: SortKey::Name,
            direction: SortDirection::Ascending,
            notices: Notices::default(),
        }
    }
}

fn compare(a: &Recipe, b: &Recipe, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Calories => a.calories.total_cmp(&b.calories),
        SortKey::Protein => a.protein_grams.total_cmp(&b.protein_grams),
        SortKey::CookingTime => a.cooking_time_minutes.cmp(&b.cooking_time_minutes),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn matches_term(recipe: &Recipe, term: &str) -> bool {
    recipe.name.to_lowercase().contains(term)
        || recipe.ingredients.iter().any(|i| i.to_lowercase().contains(term))
        || recipe.goals.iter().any(|g| g.to_lowercase().contains(term))
}

impl SavedRecipes {
    pub fn with_recipes(recipes: Vec<Recipe>) -> Self {
        Self {
            recipes,
            ..Self::default()
        }
    }

    /// Replaces the local list with the store's. On failure the current list
    /// is kept and an error notice is queued.
    pub async fn load<S>(&mut self, store: &S) -> Result<usize, ApiConnectionError>
    where
        S: RecipePersistence + ?Sized,
    {
        match store.list_saved_recipes().await {
            Ok(recipes) => {
                info!(count = recipes.len(), "Loaded saved recipes");
                self.recipes = recipes;
                Ok(self.recipes.len())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load saved recipes");
                self.notices
                    .error("Error", "Failed to load saved recipes. Please try again.");
                Err(e)
            }
        }
    }

    /// Replaces the list with the locally cached favorites, for when the
    /// store cannot be reached.
    pub fn show_cached_favorites(&mut self, cache: &FavoritesCache) -> usize {
        self.recipes = cache
            .recipes()
            .iter()
            .cloned()
            .map(|mut recipe| {
                recipe.favorited = true;
                recipe
            })
            .collect();
        info!(count = self.recipes.len(), "Showing cached favorites");
        self.notices
            .info("Offline", "Showing favorites stored on this device.");
        self.recipes.len()
    }

    pub fn all(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id.as_deref() == Some(id))
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.favorites_only = favorites_only;
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_lowercase();
    }

    /// Choosing the current ascending key flips to descending; anything
    /// else sorts ascending by the chosen key.
    pub fn sort_by(&mut self, key: SortKey) {
        self.direction = if self.sort_key == key && self.direction == SortDirection::Ascending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.sort_key = key;
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.direction = direction;
    }

    pub fn sort_order(&self) -> (SortKey, SortDirection) {
        (self.sort_key, self.direction)
    }

    /// Recipes after the favorites filter, the search term and the sort.
    pub fn visible(&self) -> Vec<&Recipe> {
        let mut visible: Vec<&Recipe> = self
            .recipes
            .iter()
            .filter(|r| !self.favorites_only || r.favorited)
            .filter(|r| self.search.is_empty() || matches_term(r, &self.search))
            .collect();
        visible.sort_by(|a, b| {
            let ordering = compare(a, b, self.sort_key);
            match self.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        visible
    }

    /// Flips the favorite flag locally, then asks the store to confirm. A
    /// rejected update restores the previous flag. The favorites cache
    /// follows whichever state is final.
    pub async fn toggle_favorite<S>(
        &mut self,
        store: &S,
        id: &str,
        cache: &mut FavoritesCache,
    ) -> Option<OptimisticOutcome>
    where
        S: RecipePersistence + ?Sized,
    {
        let index = self.recipes.iter().position(|r| r.id.as_deref() == Some(id))?;
        let previous = self.recipes[index].favorited;
        self.recipes[index].favorited = !previous;

        let outcome = match store.set_favorite(id, !previous).await {
            Ok(()) => OptimisticOutcome::Confirmed,
            Err(e) => {
                warn!(id = %id, error = %e, "Favorite update rejected, reverting");
                if let Some(recipe) = self.recipes.iter_mut().find(|r| r.id.as_deref() == Some(id)) {
                    recipe.favorited = previous;
                }
                self.notices
                    .error("Error", "Failed to update favorite status. Please try again.");
                OptimisticOutcome::Reverted {
                    error: e.to_string(),
                }
            }
        };

        if let Some(recipe) = self.get(id) {
            if let Err(e) = cache.sync(recipe).await {
                warn!(error = %e, "Failed to update favorites cache");
            }
        }
        Some(outcome)
    }

    /// Removes a recipe locally, then from the store. A rejected delete puts
    /// the recipe back at its original position.
    pub async fn delete<S>(
        &mut self,
        store: &S,
        id: &str,
        cache: &mut FavoritesCache,
    ) -> Option<OptimisticOutcome>
    where
        S: RecipePersistence + ?Sized,
    {
        let index = self.recipes.iter().position(|r| r.id.as_deref() == Some(id))?;
        let removed = self.recipes.remove(index);

        match store.delete_recipe(id).await {
            Ok(()) => {
                info!(id = %id, "Recipe deleted");
                self.notices
                    .success("Recipe deleted", "The recipe has been deleted successfully.");
                if let Err(e) = cache.forget(&removed).await {
                    warn!(error = %e, "Failed to update favorites cache");
                }
                Some(OptimisticOutcome::Confirmed)
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Delete rejected, restoring recipe");
                let index = index.min(self.recipes.len());
                self.recipes.insert(index, removed);
                self.notices
                    .error("Error", "Failed to delete the recipe. Please try again.");
                Some(OptimisticOutcome::Reverted {
                    error: e.to_string(),
                })
            }
        }
    }
}
