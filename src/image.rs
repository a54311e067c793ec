//! Best-effort recipe images.
//!
//! The image service is raced against a timeout. Whatever arrives first fills
//! the slot; a real image that shows up after the fallback may still replace it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api_connection::{ApiConnectionError, ImageGenerationService};

const FALLBACK_IMAGE_BASE: &str = "https://source.unsplash.com/featured/800x600/?food";
const MAX_FALLBACK_KEYWORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageSlot {
    #[default]
    Empty,
    Loading,
    Ready { url: String, source: ImageSource },
}

impl ImageSlot {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageSlot::Ready { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ImageSlot::Loading)
    }
}

/// Words longer than three characters, lowercased, first occurrence only.
pub fn fallback_keywords(prompt: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 3)
    {
        let word = word.to_lowercase();
        if !keywords.contains(&word) {
            keywords.push(word);
        }
        if keywords.len() == MAX_FALLBACK_KEYWORDS {
            break;
        }
    }
    keywords
}

/// Stock-photo search URL for a prompt. `timestamp` busts client caches.
/// Keywords are percent-encoded.
pub fn fallback_image_url(prompt: &str, timestamp: i64) -> String {
    let mut url = FALLBACK_IMAGE_BASE.to_string();
    for keyword in fallback_keywords(prompt) {
        url.push(',');
        url.push_str(&urlencoding::encode(&keyword));
    }
    url.push_str(&format!("&t={}", timestamp));
    url
}

/// Result of one race between the image service and the timeout.
#[derive(Debug)]
pub struct ImageLoad {
    pub url: String,
    pub source: ImageSource,
    /// Still-running generation call when the timeout won.
    pub late: Option<JoinHandle<Result<String, ApiConnectionError>>>,
}

impl ImageLoad {
    pub fn slot(&self) -> ImageSlot {
        ImageSlot::Ready {
            url: self.url.clone(),
            source: self.source,
        }
    }
}

pub async fn load_image<S>(
    service: Arc<S>,
    prompt: String,
    recipe_name: String,
    timeout: Duration,
) -> ImageLoad
where
    S: ImageGenerationService + ?Sized + 'static,
{
    let fallback = || fallback_image_url(&prompt, chrono::Utc::now().timestamp_millis());
    let mut call = {
        let prompt = prompt.clone();
        tokio::spawn(async move { service.generate_image(&prompt, &recipe_name).await })
    };

    match tokio::time::timeout(timeout, &mut call).await {
        Ok(Ok(Ok(url))) if !url.trim().is_empty() => {
            debug!("Generated recipe image arrived in time");
            ImageLoad {
                url,
                source: ImageSource::Generated,
                late: None,
            }
        }
        Ok(Ok(Ok(_))) => {
            warn!("Image service returned an empty URL, using fallback");
            ImageLoad {
                url: fallback(),
                source: ImageSource::Fallback,
                late: None,
            }
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Image generation failed, using fallback");
            ImageLoad {
                url: fallback(),
                source: ImageSource::Fallback,
                late: None,
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Image generation task aborted, using fallback");
            ImageLoad {
                url: fallback(),
                source: ImageSource::Fallback,
                late: None,
            }
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Image generation timed out, using fallback");
            ImageLoad {
                url: fallback(),
                source: ImageSource::Fallback,
                late: Some(call),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::{FakeBackend, ImageBehavior};

    #[test]
    fn fallback_url_uses_at_most_five_long_words() {
        let url = fallback_image_url(
            "Spicy Tofu Stir-fry with bok choy, garlic, ginger and sesame seeds",
            42,
        );
        assert_eq!(
            url,
            "https://source.unsplash.com/featured/800x600/?food,spicy,tofu,stir,with,garlic&t=42"
        );
    }

    #[test]
    fn keywords_skip_short_and_repeated_words() {
        assert_eq!(fallback_keywords("Egg & Eggs and EGGS"), vec!["eggs"]);
        assert!(fallback_keywords("a b c").is_empty());
        assert_eq!(
            fallback_image_url("", 7),
            "https://source.unsplash.com/featured/800x600/?food&t=7"
        );
    }

    #[test]
    fn accented_keywords_are_percent_encoded() {
        assert_eq!(
            fallback_image_url("Crème Brûlée with fresh berries", 1),
            "https://source.unsplash.com/featured/800x600/?food,cr%C3%A8me,br%C3%BBl%C3%A9e,with,fresh,berries&t=1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_service_falls_back_after_timeout() {
        let backend = Arc::new(FakeBackend::new().with_image(ImageBehavior::Hang));
        let started = tokio::time::Instant::now();
        let load = load_image(
            backend,
            "Chicken Skillet".to_string(),
            "Chicken Skillet".to_string(),
            Duration::from_secs(5),
        )
        .await;

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(load.source, ImageSource::Fallback);
        assert!(load
            .url
            .starts_with("https://source.unsplash.com/featured/800x600/?food,chicken,skillet&t="));
        assert!(!load.slot().is_loading());
        if let Some(late) = load.late {
            late.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_image_is_still_delivered() {
        let backend = Arc::new(FakeBackend::new().with_image(ImageBehavior::Delayed(
            Duration::from_secs(8),
            "https://images.example/late.png".to_string(),
        )));
        let load = load_image(
            backend,
            "Lentil Soup".to_string(),
            "Lentil Soup".to_string(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(load.source, ImageSource::Fallback);

        let late = load.late.unwrap().await.unwrap().unwrap();
        assert_eq!(late, "https://images.example/late.png");
    }

    #[tokio::test]
    async fn failing_service_falls_back_immediately() {
        let backend = Arc::new(FakeBackend::new().with_image(ImageBehavior::Fail));
        let load = load_image(
            backend,
            "Lentil Soup".to_string(),
            "Lentil Soup".to_string(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(load.source, ImageSource::Fallback);
        assert!(load.late.is_none());
    }

    #[tokio::test]
    async fn generated_image_wins_the_race() {
        let backend = Arc::new(FakeBackend::new());
        let load = load_image(
            backend,
            "Lentil Soup".to_string(),
            "Lentil Soup".to_string(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(load.source, ImageSource::Generated);
        assert_eq!(load.url, "https://images.example/fake-dish.png");
    }
}
