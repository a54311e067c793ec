//! The rendered recipe and the follow-up actions offered on it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api_connection::{
    ApiConnectionError, EmailDispatchService, ImageGenerationService, RecipePersistence,
};
use crate::image::{load_image, ImageSlot, ImageSource};
use crate::notify::Notices;
use crate::recipe::{Recipe, RecipeRequest};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Please enter an email address")]
    Missing,
    #[error("'{0}' is not a valid email address")]
    Invalid(String),
    #[error("Failed to send the recipe: {0}")]
    Dispatch(#[from] ApiConnectionError),
}

/// Accepts `local@domain` with both parts non-empty and no whitespace.
pub fn validate_email(address: &str) -> Result<&str, EmailError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(EmailError::Missing);
    }
    match address.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.contains(char::is_whitespace) =>
        {
            Ok(address)
        }
        _ => Err(EmailError::Invalid(address.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailStatus {
    Idle,
    Sent(String),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(String),
    AlreadySaved(String),
    Failed,
}

#[derive(Debug, Clone)]
pub struct RecipeView {
    recipe: Recipe,
    request: Option<RecipeRequest>,
    image: ImageSlot,
    email: EmailStatus,
    saved_id: Option<String>,
    notices: Notices,
}

impl RecipeView {
    pub fn new(recipe: Recipe, request: Option<RecipeRequest>) -> Self {
        let image = match recipe.image_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => ImageSlot::Ready {
                url: url.to_string(),
                source: ImageSource::Generated,
            },
            None => ImageSlot::Empty,
        };
        let saved_id = recipe.id.clone();
        Self {
            recipe,
            request,
            image,
            email: EmailStatus::Idle,
            saved_id,
            notices: Notices::default(),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn request(&self) -> Option<&RecipeRequest> {
        self.request.as_ref()
    }

    pub fn image(&self) -> &ImageSlot {
        &self.image
    }

    pub fn email_status(&self) -> &EmailStatus {
        &self.email
    }

    pub fn saved_id(&self) -> Option<&str> {
        self.saved_id.as_deref()
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub async fn send_email<S>(&mut self, service: &S, address: &str) -> Result<(), EmailError>
    where
        S: EmailDispatchService + ?Sized,
    {
        let address = match validate_email(address) {
            Ok(address) => address,
            Err(e) => {
                self.notices.error("Invalid email", e.to_string());
                return Err(e);
            }
        };
        match service.send_recipe_email(&self.recipe, address).await {
            Ok(()) => {
                info!(recipe = %self.recipe.name, "Recipe emailed");
                self.notices
                    .success("Email sent", format!("Recipe sent to {}", address));
                self.email = EmailStatus::Sent(address.to_string());
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to email recipe");
                self.notices
                    .error("Email failed", "Failed to send the recipe. Please try again.");
                self.email = EmailStatus::Failed;
                Err(e.into())
            }
        }
    }

    /// Saves the recipe unless a recipe with the same name is already stored.
    pub async fn save<S>(&mut self, store: &S) -> SaveOutcome
    where
        S: RecipePersistence + ?Sized,
    {
        if let Some(id) = self.saved_id.clone() {
            self.notices.info("Already saved", "This recipe is in your collection.");
            return SaveOutcome::AlreadySaved(id);
        }
        let existing = match store.find_saved_by_name(&self.recipe.name).await {
            Ok(existing) => existing,
            Err(e) => return self.save_failed(e),
        };
        if let Some(id) = existing {
            debug!(id = %id, "Recipe already saved under this name");
            self.notices.info("Already saved", "This recipe is in your collection.");
            self.saved_id = Some(id.clone());
            self.recipe.id = Some(id.clone());
            return SaveOutcome::AlreadySaved(id);
        }
        match store.persist_recipe(&self.recipe).await {
            Ok(id) => {
                info!(id = %id, recipe = %self.recipe.name, "Recipe saved");
                self.notices
                    .success("Recipe saved", "You can find it under saved recipes.");
                self.saved_id = Some(id.clone());
                self.recipe.id = Some(id.clone());
                SaveOutcome::Saved(id)
            }
            Err(e) => self.save_failed(e),
        }
    }

    fn save_failed(&mut self, error: ApiConnectionError) -> SaveOutcome {
        warn!(error = %error, "Failed to save recipe");
        let description = match error {
            ApiConnectionError::NotAuthenticated => "Sign in to save recipes.",
            _ => "Failed to save the recipe. Please try again.",
        };
        self.notices.error("Save failed", description);
        SaveOutcome::Failed
    }

    /// Appends the request and its recipe to the search history. Signed-out
    /// users have no history; failures are only logged.
    pub async fn record_history<S>(&self, store: &S, signed_in: bool)
    where
        S: RecipePersistence + ?Sized,
    {
        let Some(request) = self.request.as_ref().filter(|_| signed_in) else {
            return;
        };
        if let Err(e) = store.record_search(request, &self.recipe).await {
            warn!(error = %e, "Failed to record search history");
        }
    }

    /// Fills the image slot within `timeout`. Returns the still-running call
    /// when the fallback was used because the service was too slow.
    pub async fn load_image<S>(
        &mut self,
        service: Arc<S>,
        timeout: Duration,
    ) -> Option<JoinHandle<Result<String, ApiConnectionError>>>
    where
        S: ImageGenerationService + ?Sized + 'static,
    {
        let prompt = self.recipe.image_prompt_or_default();
        self.image = ImageSlot::Loading;
        let load = load_image(service, prompt.clone(), self.recipe.name.clone(), timeout).await;
        self.image = load.slot();
        self.recipe.image_url = Some(load.url.clone());
        self.recipe.image_prompt = Some(prompt);
        load.late
    }

    /// Applies an image that arrived after the fallback was shown.
    pub fn apply_late_image(&mut self, result: Result<String, ApiConnectionError>) -> bool {
        match result {
            Ok(url) if !url.trim().is_empty() => {
                debug!("Late recipe image replaced the fallback");
                self.recipe.image_url = Some(url.clone());
                self.image = ImageSlot::Ready {
                    url,
                    source: ImageSource::Generated,
                };
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "Late image generation failed, keeping fallback");
                false
            }
        }
    }
}
