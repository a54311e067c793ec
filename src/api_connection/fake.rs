//! Deterministic in-memory backend.
//!
//! Used when `FIME_BACKEND=fake` and by tests. Generation answers come from
//! a queue of canned responses, falling back to a labeled free-text recipe
//! derived from the request.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{
    ApiConnectionError, EmailDispatchService, GenerationOptions, ImageGenerationService,
    RecipeGenerationService, RecipePersistence,
};
use crate::recipe::{Recipe, RecipeRequest, SearchHistoryEntry};
use crate::session::{Session, SessionHandle};

#[derive(Debug, Clone)]
pub enum ImageBehavior {
    Url(String),
    Fail,
    /// Never resolves.
    Hang,
    Delayed(Duration, String),
}

#[derive(Debug, Default)]
struct FakeState {
    responses: VecDeque<Result<String, String>>,
    generation_calls: Vec<(RecipeRequest, GenerationOptions)>,
    saved: Vec<Recipe>,
    searches: Vec<SearchHistoryEntry>,
    emails: Vec<(String, String)>,
    next_id: u64,
    fail_favorites: bool,
    fail_deletes: bool,
    fail_emails: bool,
}

#[derive(Debug)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    image: ImageBehavior,
    session: SessionHandle,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            image: ImageBehavior::Url("https://images.example/fake-dish.png".to_string()),
            session: SessionHandle::new(Some(Session {
                access_token: "fake-token".to_string(),
                user_id: "fake-user".to_string(),
                email: None,
            })),
        }
    }

    /// Queue raw generation answers; `Err` entries become remote failures.
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let backend = Self::new();
        backend.lock().responses.extend(responses);
        backend
    }

    pub fn with_image(mut self, behavior: ImageBehavior) -> Self {
        self.image = behavior;
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.session = SessionHandle::default();
        self
    }

    pub fn with_session_handle(mut self, session: SessionHandle) -> Self {
        self.session = session;
        self
    }

    pub fn failing_favorites(self) -> Self {
        self.lock().fail_favorites = true;
        self
    }

    pub fn failing_deletes(self) -> Self {
        self.lock().fail_deletes = true;
        self
    }

    pub fn failing_emails(self) -> Self {
        self.lock().fail_emails = true;
        self
    }

    /// Seeds a saved recipe and returns its id.
    pub fn seed_saved(&self, mut recipe: Recipe) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("fake-{}", state.next_id);
        recipe.id = Some(id.clone());
        recipe.created_at.get_or_insert_with(Utc::now);
        state.saved.push(recipe);
        id
    }

    pub fn generation_calls(&self) -> Vec<(RecipeRequest, GenerationOptions)> {
        self.lock().generation_calls.clone()
    }

    pub fn saved_recipes(&self) -> Vec<Recipe> {
        self.lock().saved.clone()
    }

    pub fn searches(&self) -> Vec<SearchHistoryEntry> {
        self.lock().searches.clone()
    }

    pub fn sent_emails(&self) -> Vec<(String, String)> {
        self.lock().emails.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_session(&self) -> Result<(), ApiConnectionError> {
        if self.session.is_signed_in() {
            Ok(())
        } else {
            Err(ApiConnectionError::NotAuthenticated)
        }
    }
}

/// A labeled free-text answer in the format the generation prompt asks for.
fn sample_response(request: &RecipeRequest, options: GenerationOptions) -> String {
    let items: Vec<&str> = request
        .ingredients()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();
    let lead = items.first().copied().unwrap_or("Pantry");
    let mut lead_chars = lead.chars();
    let lead = match lead_chars.next() {
        Some(first) => first.to_uppercase().chain(lead_chars).collect::<String>(),
        None => String::new(),
    };
    let dish = if options.different_idea {
        format!("{} Grain Bowl (take {})", lead, options.regeneration_count + 1)
    } else {
        format!("{} Skillet", lead)
    };
    let ingredient_lines: String = items.iter().map(|item| format!("- {}\n", item)).collect();
    format!(
        "Recipe Name:\n{dish}\n\nIngredients:\n{ingredient_lines}- olive oil\n\nInstructions:\n1. Prepare the ingredients.\n2. Cook everything for about {minutes} minutes.\n3. Serve warm.\n\nNutritional Information (estimated):\n- Protein: ~{protein}g\n- Carbs: ~30g\n- Fat: ~12g\n- Calories: ~{calories}",
        minutes = request.cooking_time_minutes(),
        protein = 10 + 5 * items.len(),
        calories = 250 + 50 * items.len(),
    )
}

#[async_trait]
impl RecipeGenerationService for FakeBackend {
    async fn generate_recipe(
        &self,
        request: &RecipeRequest,
        options: GenerationOptions,
    ) -> Result<String, ApiConnectionError> {
        let queued = {
            let mut state = self.lock();
            state.generation_calls.push((request.clone(), options));
            state.responses.pop_front()
        };
        match queued {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(ApiConnectionError::Remote(message)),
            None => Ok(sample_response(request, options)),
        }
    }
}

#[async_trait]
impl ImageGenerationService for FakeBackend {
    async fn generate_image(
        &self,
        _prompt: &str,
        _recipe_name: &str,
    ) -> Result<String, ApiConnectionError> {
        match &self.image {
            ImageBehavior::Url(url) => Ok(url.clone()),
            ImageBehavior::Fail => Err(ApiConnectionError::Remote(
                "image model unavailable".to_string(),
            )),
            ImageBehavior::Hang => std::future::pending().await,
            ImageBehavior::Delayed(delay, url) => {
                tokio::time::sleep(*delay).await;
                Ok(url.clone())
            }
        }
    }
}

#[async_trait]
impl EmailDispatchService for FakeBackend {
    async fn send_recipe_email(
        &self,
        recipe: &Recipe,
        address: &str,
    ) -> Result<(), ApiConnectionError> {
        let mut state = self.lock();
        if state.fail_emails {
            return Err(ApiConnectionError::Remote("mail relay rejected the message".to_string()));
        }
        state.emails.push((address.to_string(), recipe.name.clone()));
        Ok(())
    }
}

#[async_trait]
impl RecipePersistence for FakeBackend {
    async fn persist_recipe(&self, recipe: &Recipe) -> Result<String, ApiConnectionError> {
        self.require_session()?;
        Ok(self.seed_saved(recipe.clone()))
    }

    async fn find_saved_by_name(&self, name: &str) -> Result<Option<String>, ApiConnectionError> {
        self.require_session()?;
        Ok(self
            .lock()
            .saved
            .iter()
            .find(|recipe| recipe.name == name)
            .and_then(|recipe| recipe.id.clone()))
    }

    async fn set_favorite(&self, id: &str, favorited: bool) -> Result<(), ApiConnectionError> {
        self.require_session()?;
        let mut state = self.lock();
        if state.fail_favorites {
            return Err(ApiConnectionError::Remote("update rejected".to_string()));
        }
        match state.saved.iter_mut().find(|r| r.id.as_deref() == Some(id)) {
            Some(recipe) => {
                recipe.favorited = favorited;
                Ok(())
            }
            None => Err(ApiConnectionError::Remote(format!("no saved recipe {}", id))),
        }
    }

    async fn delete_recipe(&self, id: &str) -> Result<(), ApiConnectionError> {
        self.require_session()?;
        let mut state = self.lock();
        if state.fail_deletes {
            return Err(ApiConnectionError::Remote("delete rejected".to_string()));
        }
        state.saved.retain(|r| r.id.as_deref() != Some(id));
        Ok(())
    }

    async fn list_saved_recipes(&self) -> Result<Vec<Recipe>, ApiConnectionError> {
        self.require_session()?;
        Ok(self.saved_recipes())
    }

    async fn record_search(
        &self,
        request: &RecipeRequest,
        recipe: &Recipe,
    ) -> Result<(), ApiConnectionError> {
        self.require_session()?;
        let mut state = self.lock();
        state.next_id += 1;
        let entry = SearchHistoryEntry {
            id: format!("search-{}", state.next_id),
            ingredients: request.ingredients().to_string(),
            goals: request.goals().to_vec(),
            cooking_time_minutes: request.cooking_time_minutes(),
            recipe: recipe.clone(),
            created_at: Some(Utc::now()),
        };
        state.searches.push(entry);
        Ok(())
    }

    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>, ApiConnectionError> {
        self.require_session()?;
        let mut entries = self.searches();
        entries.reverse();
        Ok(entries)
    }
}
