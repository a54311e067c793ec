use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::api_connection::{ApiConnectionError, Backend, BackendClient, FakeBackend};
use crate::config::{AppConfig, BackendMode};
use crate::favorites_cache::{CacheError, FavoritesCache};

/// A signed-in user as issued by the hosted auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: Option<String>,
}

/// Shared view of the current session. Backends built from an
/// [`AppContext`] hold a clone, so signing out reaches them too.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            current: Arc::new(RwLock::new(session)),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub fn replace(&self, session: Option<Session>) -> Option<Session> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *current, session)
    }
}

/// Application-wide state, created once at start and handed to screens
/// explicitly.
pub struct AppContext {
    config: AppConfig,
    session: SessionHandle,
    favorites: FavoritesCache,
}

impl AppContext {
    pub async fn start(config: AppConfig) -> Self {
        let favorites = FavoritesCache::load(config.favorites_cache.clone()).await;
        let session = config.session.clone();
        if let Some(session) = &session {
            info!(
                user_id = %session.user_id,
                email = session.email.as_deref().unwrap_or("-"),
                "Session restored from configuration"
            );
        }
        Self {
            config,
            session: SessionHandle::new(session),
            favorites,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    pub fn sign_in(&mut self, session: Session) {
        info!(
            user_id = %session.user_id,
            email = session.email.as_deref().unwrap_or("-"),
            "Signed in"
        );
        self.session.replace(Some(session));
    }

    /// Drops the session, for this context and every backend built from it,
    /// along with the local favorites copy that belonged to it.
    pub async fn sign_out(&mut self) -> Result<(), CacheError> {
        if let Some(session) = self.session.replace(None) {
            info!(user_id = %session.user_id, "Signed out");
        }
        self.favorites.clear().await
    }

    pub fn favorites(&self) -> &FavoritesCache {
        &self.favorites
    }

    pub fn favorites_mut(&mut self) -> &mut FavoritesCache {
        &mut self.favorites
    }

    /// Builds a backend that follows this context's session.
    pub fn backend(&self) -> Result<Arc<dyn Backend>, ApiConnectionError> {
        match self.config.backend {
            BackendMode::Fake => Ok(Arc::new(
                FakeBackend::new().with_session_handle(self.session.clone()),
            )),
            BackendMode::Remote => {
                let client =
                    BackendClient::new(&self.config)?.with_session_handle(self.session.clone());
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::RecipePersistence;
    use crate::recipe::Recipe;
    use tempfile::tempdir;

    fn session() -> Session {
        Session {
            access_token: "token".to_string(),
            user_id: "user-1".to_string(),
            email: Some("cook@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn sign_out_invalidates_session_and_favorites() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            favorites_cache: dir.path().join("favorites.json"),
            session: Some(session()),
            ..AppConfig::default()
        };
        let mut context = AppContext::start(config).await;
        assert!(context.is_signed_in());

        let recipe = Recipe {
            name: "Soup".to_string(),
            ..Recipe::default()
        };
        context.favorites_mut().remember(&recipe).await.unwrap();
        context.sign_out().await.unwrap();

        assert!(!context.is_signed_in());
        assert!(context.favorites().recipes().is_empty());
    }

    #[tokio::test]
    async fn remote_backend_requires_url_and_key() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            favorites_cache: dir.path().join("favorites.json"),
            ..AppConfig::default()
        };
        let context = AppContext::start(config).await;
        assert!(matches!(
            context.backend(),
            Err(ApiConnectionError::MissingConfig(_))
        ));
    }

    #[tokio::test]
    async fn fake_backend_follows_session_state() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            backend: BackendMode::Fake,
            favorites_cache: dir.path().join("favorites.json"),
            ..AppConfig::default()
        };
        let mut context = AppContext::start(config).await;
        let backend = context.backend().unwrap();
        assert!(matches!(
            backend.list_saved_recipes().await,
            Err(ApiConnectionError::NotAuthenticated)
        ));

        context.sign_in(session());
        let backend = context.backend().unwrap();
        assert!(backend.list_saved_recipes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_out_reaches_backends_built_earlier() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            backend: BackendMode::Fake,
            favorites_cache: dir.path().join("favorites.json"),
            session: Some(session()),
            ..AppConfig::default()
        };
        let mut context = AppContext::start(config).await;
        let backend = context.backend().unwrap();
        assert!(backend.list_saved_recipes().await.is_ok());

        context.sign_out().await.unwrap();
        assert!(matches!(
            backend.list_saved_recipes().await,
            Err(ApiConnectionError::NotAuthenticated)
        ));
        assert!(matches!(
            backend.persist_recipe(&Recipe::default()).await,
            Err(ApiConnectionError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn remote_client_drops_token_on_sign_out() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            backend_url: Some("http://127.0.0.1:9".to_string()),
            anon_key: Some("anon-test-key".to_string()),
            favorites_cache: dir.path().join("favorites.json"),
            session: Some(session()),
            ..AppConfig::default()
        };
        let mut context = AppContext::start(config).await;
        let backend = context.backend().unwrap();

        context.sign_out().await.unwrap();
        assert!(matches!(
            backend.set_favorite("r1", true).await,
            Err(ApiConnectionError::NotAuthenticated)
        ));
    }

    #[test]
    fn handle_clones_share_one_session() {
        let handle = SessionHandle::new(Some(session()));
        let copy = handle.clone();
        assert_eq!(copy.current().unwrap().email.as_deref(), Some("cook@example.com"));
        handle.replace(None);
        assert!(!copy.is_signed_in());
        assert!(copy.current().is_none());
    }
}
