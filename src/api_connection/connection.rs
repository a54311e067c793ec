use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::endpoints::{
    FavoritePatch, GenerateImagePayload, GenerateImageResponse, GenerateRecipePayload,
    GenerationOptions, RemoteErrorBody, SavedRecipeRow, SearchRow, SendEmailPayload,
    SendEmailResponse, GENERATE_IMAGE_FUNCTION, GENERATE_RECIPE_FUNCTION, SAVED_RECIPES_TABLE,
    SEARCHES_TABLE, SEND_EMAIL_FUNCTION,
};
use super::{EmailDispatchService, ImageGenerationService, RecipeGenerationService, RecipePersistence};
use crate::config::{AppConfig, ANON_KEY_ENV_VAR, BACKEND_URL_ENV_VAR};
use crate::recipe::{Recipe, RecipeRequest, SearchHistoryEntry};
use crate::session::{Session, SessionHandle};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("Configuration not found in environment: {0}")]
    MissingConfig(String),
    #[error("Sign in required")]
    NotAuthenticated,
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError { status: StatusCode, error_body: String },
    #[error("Remote function failed: {0}")]
    Remote(String),
    #[error("Empty response from {0}")]
    EmptyResponse(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// HTTP adapter for the hosted backend: serverless functions under
/// `/functions/v1` and table access under `/rest/v1`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    anon_key: String,
    timeout: Duration,
    session: SessionHandle,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiConnectionError> {
        let base_url = config
            .backend_url
            .clone()
            .ok_or_else(|| ApiConnectionError::MissingConfig(BACKEND_URL_ENV_VAR.to_string()))?;
        let anon_key = config
            .anon_key
            .clone()
            .ok_or_else(|| ApiConnectionError::MissingConfig(ANON_KEY_ENV_VAR.to_string()))?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            timeout: config.request_timeout,
            session: SessionHandle::new(config.session.clone()),
        })
    }

    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = SessionHandle::new(session);
        self
    }

    /// Follows a session owned elsewhere, typically by the app context.
    pub fn with_session_handle(mut self, session: SessionHandle) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    fn require_session(&self) -> Result<Session, ApiConnectionError> {
        self.session.current().ok_or(ApiConnectionError::NotAuthenticated)
    }

    fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Authorizes and sends a request. Client-side timeouts are reported as
    /// [`ApiConnectionError::Timeout`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiConnectionError> {
        self.authorize(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiConnectionError::Timeout(self.timeout)
            } else {
                ApiConnectionError::NetworkError(e)
            }
        })
    }

    async fn checked(response: Response) -> Result<String, ApiConnectionError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        if let Ok(remote) = serde_json::from_str::<RemoteErrorBody>(&body) {
            return Err(ApiConnectionError::Remote(remote.error));
        }
        Err(ApiConnectionError::ApiError {
            status,
            error_body: body,
        })
    }

    /// Calls a hosted function and returns its raw body. A successful status
    /// whose body is `{"error": ...}` still counts as a failure.
    pub async fn invoke_function<P: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &P,
    ) -> Result<String, ApiConnectionError> {
        debug!(function = name, "Invoking backend function");
        let response = self
            .send(self.http.post(self.function_url(name)).json(payload))
            .await?;
        let body = Self::checked(response).await?;

        if body.trim().is_empty() {
            return Err(ApiConnectionError::EmptyResponse(name.to_string()));
        }
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) {
            if let Some(Value::String(message)) = map.get("error") {
                return Err(ApiConnectionError::Remote(message.clone()));
            }
        }
        Ok(body)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiConnectionError> {
        let response = self
            .send(self.http.get(self.table_url(table)).query(query))
            .await?;
        let body = Self::checked(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<Vec<R>, ApiConnectionError> {
        let response = self
            .send(
                self.http
                    .post(self.table_url(table))
                    .header("Prefer", "return=representation")
                    .json(row),
            )
            .await?;
        let body = Self::checked(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RecipeGenerationService for BackendClient {
    async fn generate_recipe(
        &self,
        request: &RecipeRequest,
        options: GenerationOptions,
    ) -> Result<String, ApiConnectionError> {
        info!(
            goals = ?request.goal_labels(),
            minutes = request.cooking_time_minutes(),
            different_idea = options.different_idea,
            "Requesting recipe generation"
        );
        let payload = GenerateRecipePayload::new(request, options);
        self.invoke_function(GENERATE_RECIPE_FUNCTION, &payload).await
    }
}

#[async_trait]
impl ImageGenerationService for BackendClient {
    async fn generate_image(
        &self,
        prompt: &str,
        recipe_name: &str,
    ) -> Result<String, ApiConnectionError> {
        let payload = GenerateImagePayload {
            prompt: prompt.to_string(),
            recipe_name: recipe_name.to_string(),
        };
        let body = self.invoke_function(GENERATE_IMAGE_FUNCTION, &payload).await?;
        let response: GenerateImageResponse = serde_json::from_str(&body)?;
        response
            .image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ApiConnectionError::EmptyResponse(GENERATE_IMAGE_FUNCTION.to_string()))
    }
}

#[async_trait]
impl EmailDispatchService for BackendClient {
    async fn send_recipe_email(
        &self,
        recipe: &Recipe,
        address: &str,
    ) -> Result<(), ApiConnectionError> {
        let payload = SendEmailPayload {
            recipe: recipe.into(),
            email: address.to_string(),
        };
        let body = self.invoke_function(SEND_EMAIL_FUNCTION, &payload).await?;
        let response: SendEmailResponse = serde_json::from_str(&body)?;
        if response.success {
            Ok(())
        } else {
            Err(ApiConnectionError::Remote(
                response
                    .message
                    .unwrap_or_else(|| "email was not accepted".to_string()),
            ))
        }
    }
}

#[async_trait]
impl RecipePersistence for BackendClient {
    async fn persist_recipe(&self, recipe: &Recipe) -> Result<String, ApiConnectionError> {
        let session = self.require_session()?;
        let row = SavedRecipeRow::for_insert(recipe, &session.user_id);
        let inserted: Vec<SavedRecipeRow> = self.insert(SAVED_RECIPES_TABLE, &row).await?;
        inserted
            .into_iter()
            .next()
            .and_then(|row| row.id)
            .ok_or_else(|| ApiConnectionError::EmptyResponse(SAVED_RECIPES_TABLE.to_string()))
    }

    async fn find_saved_by_name(&self, name: &str) -> Result<Option<String>, ApiConnectionError> {
        let session = self.require_session()?;
        let rows: Vec<SavedRecipeRow> = self
            .select(
                SAVED_RECIPES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", session.user_id)),
                    ("recipe_name", format!("eq.{}", name)),
                ],
            )
            .await?;
        Ok(rows.into_iter().find_map(|row| row.id))
    }

    async fn set_favorite(&self, id: &str, favorited: bool) -> Result<(), ApiConnectionError> {
        self.require_session()?;
        let response = self
            .send(
                self.http
                    .patch(self.table_url(SAVED_RECIPES_TABLE))
                    .query(&[("id", format!("eq.{}", id))])
                    .json(&FavoritePatch {
                        is_favorited: favorited,
                    }),
            )
            .await?;
        Self::checked(response).await.map(|_| ())
    }

    async fn delete_recipe(&self, id: &str) -> Result<(), ApiConnectionError> {
        self.require_session()?;
        let response = self
            .send(
                self.http
                    .delete(self.table_url(SAVED_RECIPES_TABLE))
                    .query(&[("id", format!("eq.{}", id))]),
            )
            .await?;
        Self::checked(response).await.map(|_| ())
    }

    async fn list_saved_recipes(&self) -> Result<Vec<Recipe>, ApiConnectionError> {
        let session = self.require_session()?;
        let rows: Vec<SavedRecipeRow> = self
            .select(
                SAVED_RECIPES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", session.user_id)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn record_search(
        &self,
        request: &RecipeRequest,
        recipe: &Recipe,
    ) -> Result<(), ApiConnectionError> {
        let session = self.require_session()?;
        let row = SearchRow::for_insert(request, recipe, &session.user_id)?;
        let _: Vec<SearchRow> = self.insert(SEARCHES_TABLE, &row).await?;
        Ok(())
    }

    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>, ApiConnectionError> {
        self.require_session()?;
        let rows: Vec<SearchRow> = self
            .select(
                SEARCHES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await?;
        debug!(count = rows.len(), "Loaded search history");
        Ok(rows.into_iter().map(SearchRow::into_entry).collect())
    }
}
