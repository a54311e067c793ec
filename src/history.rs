use tracing::{info, warn};

use crate::api_connection::{ApiConnectionError, RecipePersistence};
use crate::notify::Notices;
use crate::recipe::SearchHistoryEntry;

/// Read-only list of past searches, newest first.
#[derive(Debug, Clone, Default)]
pub struct SearchHistory {
    entries: Vec<SearchHistoryEntry>,
    notices: Notices,
}

impl SearchHistory {
    pub async fn load<S>(&mut self, store: &S) -> Result<usize, ApiConnectionError>
    where
        S: RecipePersistence + ?Sized,
    {
        match store.list_search_history().await {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                info!(count = entries.len(), "Loaded search history");
                self.entries = entries;
                Ok(self.entries.len())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load search history");
                self.notices
                    .error("Error", "Failed to load your search history. Please try again.");
                Err(e)
            }
        }
    }

    pub fn entries(&self) -> &[SearchHistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&SearchHistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::FakeBackend;
    use crate::recipe::{GoalTag, Recipe, RecipeRequest};

    #[tokio::test]
    async fn entries_come_back_newest_first() {
        let backend = FakeBackend::new();
        for (ingredients, name) in [("eggs", "Omelette"), ("rice, beans", "Burrito Bowl")] {
            let request = RecipeRequest::new(ingredients, vec![GoalTag::Vegan], 20).unwrap();
            let recipe = Recipe {
                name: name.to_string(),
                ..Recipe::default()
            };
            backend.record_search(&request, &recipe).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let mut history = SearchHistory::default();
        assert_eq!(history.load(&backend).await.unwrap(), 2);
        assert_eq!(history.entries()[0].recipe.name, "Burrito Bowl");
        assert_eq!(history.entries()[1].goals, vec![GoalTag::Vegan]);
        let id = history.entries()[1].id.clone();
        assert_eq!(history.get(&id).unwrap().ingredients, "eggs");
    }

    #[tokio::test]
    async fn signed_out_history_is_an_error() {
        let mut history = SearchHistory::default();
        let result = history.load(&FakeBackend::new().signed_out()).await;
        assert!(matches!(result, Err(ApiConnectionError::NotAuthenticated)));
        assert!(history.entries().is_empty());
    }
}
