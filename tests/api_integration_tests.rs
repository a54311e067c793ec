use dotenv::dotenv;
use fime::api_connection::{
    connection::ApiConnectionError, BackendClient, GenerationOptions, ImageGenerationService,
    RecipeGenerationService, RecipePersistence,
};
use fime::config::{AppConfig, ANON_KEY_ENV_VAR, BACKEND_URL_ENV_VAR};
use fime::recipe::{GoalTag, Recipe, RecipeRequest};
use fime::recipe_parser::parse_for_request;
use fime::session::Session;
use std::time::Duration;

fn setup_test_environment() {
    dotenv().ok();
}

fn offline_config() -> AppConfig {
    AppConfig {
        // Nothing listens on the discard port.
        backend_url: Some("http://127.0.0.1:9".to_string()),
        anon_key: Some("anon-test-key".to_string()),
        request_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    }
}

fn sample_request() -> RecipeRequest {
    RecipeRequest::new("chicken, rice, broccoli", vec![GoalTag::BuildMuscle], 30).unwrap()
}

#[tokio::test]
async fn test_missing_backend_url_error() {
    let config = AppConfig {
        anon_key: Some("anon-test-key".to_string()),
        ..AppConfig::default()
    };
    let result = BackendClient::new(&config);
    assert!(matches!(result, Err(ApiConnectionError::MissingConfig(_))));
    if let Err(ApiConnectionError::MissingConfig(var)) = result {
        assert_eq!(var, BACKEND_URL_ENV_VAR);
    }
}

#[tokio::test]
async fn test_missing_anon_key_error() {
    let config = AppConfig {
        backend_url: Some("https://example.invalid".to_string()),
        ..AppConfig::default()
    };
    match BackendClient::new(&config) {
        Err(ApiConnectionError::MissingConfig(var)) => assert_eq!(var, ANON_KEY_ENV_VAR),
        other => panic!("expected missing config, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_persistence_requires_session_before_network() {
    let client = BackendClient::new(&offline_config()).unwrap();
    assert!(client.session().is_none());

    let recipe = Recipe::default();
    assert!(matches!(
        client.persist_recipe(&recipe).await,
        Err(ApiConnectionError::NotAuthenticated)
    ));
    assert!(matches!(
        client.set_favorite("r1", true).await,
        Err(ApiConnectionError::NotAuthenticated)
    ));
    assert!(matches!(
        client.list_search_history().await,
        Err(ApiConnectionError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let client = BackendClient::new(&offline_config()).unwrap().with_session(Some(Session {
        access_token: "token".to_string(),
        user_id: "user-1".to_string(),
        email: None,
    }));
    let result = client
        .generate_recipe(&sample_request(), GenerationOptions::default())
        .await;
    assert!(
        matches!(result, Err(ApiConnectionError::NetworkError(_))),
        "unexpected result: {:?}",
        result
    );
}

#[tokio::test]
#[ignore]
async fn test_live_recipe_generation() {
    setup_test_environment();
    let config = match AppConfig::from_env() {
        Ok(config) if config.backend_url.is_some() && config.anon_key.is_some() => config,
        _ => {
            println!(
                "Skipping test_live_recipe_generation: {} / {} not set.",
                BACKEND_URL_ENV_VAR, ANON_KEY_ENV_VAR
            );
            return;
        }
    };
    let client = BackendClient::new(&config).unwrap();
    let request = sample_request();

    let raw = client
        .generate_recipe(&request, GenerationOptions::default())
        .await;
    assert!(raw.is_ok(), "Generation failed: {:?}", raw.err());
    let recipe = parse_for_request(&raw.unwrap(), &request);
    println!("Live recipe: {:#?}", recipe);
    assert!(!recipe.name.is_empty());
    assert!(!recipe.ingredients.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_live_image_generation() {
    setup_test_environment();
    let Ok(config) = AppConfig::from_env() else {
        println!("Skipping test_live_image_generation: invalid configuration.");
        return;
    };
    let Ok(client) = BackendClient::new(&config) else {
        println!(
            "Skipping test_live_image_generation: {} / {} not set.",
            BACKEND_URL_ENV_VAR, ANON_KEY_ENV_VAR
        );
        return;
    };

    let result = client
        .generate_image("Lemon herb chicken with rice, freshly plated", "Lemon Herb Chicken")
        .await;
    assert!(result.is_ok(), "Image generation failed: {:?}", result.err());
    assert!(result.unwrap().starts_with("http"));
}
