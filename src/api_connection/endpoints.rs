use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::recipe::{GoalTag, Recipe, RecipeRequest, SearchHistoryEntry};
use crate::recipe_parser::recipe_from_value;

pub const GENERATE_RECIPE_FUNCTION: &str = "generate-recipe";
pub const GENERATE_IMAGE_FUNCTION: &str = "generate-recipe-image";
pub const SEND_EMAIL_FUNCTION: &str = "send-recipe-email";

pub const SAVED_RECIPES_TABLE: &str = "saved_recipes";
pub const SEARCHES_TABLE: &str = "searches";

/// Image attached to emailed recipes that never got one of their own.
pub const DEFAULT_EMAIL_IMAGE_URL: &str = "https://source.unsplash.com/featured/?food,cooking";

/// Knobs for a single generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Asks the model to avoid repeating the previous answer.
    pub different_idea: bool,
    /// How many times this request has been regenerated so far.
    pub regeneration_count: u32,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRecipePayload {
    pub ingredients: String,
    pub goals: Vec<String>,
    pub cooking_time: u32,
    pub regeneration_count: u32,
    pub different_idea: bool,
}

impl GenerateRecipePayload {
    pub fn new(request: &RecipeRequest, options: GenerationOptions) -> Self {
        Self {
            ingredients: request.ingredients().to_string(),
            goals: request.goal_labels(),
            cooking_time: request.cooking_time_minutes(),
            regeneration_count: options.regeneration_count,
            different_idea: options.different_idea,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImagePayload {
    pub prompt: String,
    pub recipe_name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecipe {
    pub recipe_name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub calories: f64,
    pub cooking_time: u32,
    pub goals: Vec<String>,
    pub image_url: String,
}

impl From<&Recipe> for EmailRecipe {
    fn from(recipe: &Recipe) -> Self {
        Self {
            recipe_name: recipe.name.clone(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            protein: recipe.protein_grams,
            carbs: recipe.carb_grams,
            fat: recipe.fat_grams,
            calories: recipe.calories,
            cooking_time: recipe.cooking_time_minutes,
            goals: recipe.goals.clone(),
            image_url: recipe
                .image_url
                .clone()
                .unwrap_or_else(|| DEFAULT_EMAIL_IMAGE_URL.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct SendEmailPayload {
    pub recipe: EmailRecipe,
    pub email: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SendEmailResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body the hosted functions return alongside a failure.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteErrorBody {
    pub error: String,
}

/// A row of the saved recipes collection, in the store's snake_case layout.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SavedRecipeRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub recipe_name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub cooking_time: Option<u32>,
    #[serde(default)]
    pub goals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_favorited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SavedRecipeRow {
    pub fn for_insert(recipe: &Recipe, user_id: &str) -> Self {
        Self {
            id: None,
            user_id: Some(user_id.to_string()),
            recipe_name: recipe.name.clone(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            protein: Some(recipe.protein_grams),
            carbs: Some(recipe.carb_grams),
            fat: Some(recipe.fat_grams),
            calories: Some(recipe.calories),
            cooking_time: Some(recipe.cooking_time_minutes),
            goals: Some(recipe.goals.clone()),
            image_url: recipe.image_url.clone(),
            is_favorited: Some(recipe.favorited),
            created_at: None,
        }
    }
}

impl From<SavedRecipeRow> for Recipe {
    fn from(row: SavedRecipeRow) -> Self {
        let amount = |value: Option<f64>| value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0);
        Recipe {
            name: row.recipe_name,
            ingredients: row.ingredients,
            instructions: row.instructions,
            protein_grams: amount(row.protein),
            carb_grams: amount(row.carbs),
            fat_grams: amount(row.fat),
            calories: amount(row.calories),
            cooking_time_minutes: row.cooking_time.unwrap_or(0),
            goals: row.goals.unwrap_or_default(),
            image_url: row.image_url,
            image_prompt: None,
            favorited: row.is_favorited.unwrap_or(false),
            id: row.id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct FavoritePatch {
    pub is_favorited: bool,
}

/// A row of the append-only searches collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub ingredients: String,
    /// Goal labels joined with ", ".
    pub goal: String,
    pub cooking_time: u32,
    pub recipe_name: String,
    #[serde(default)]
    pub recipe_details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SearchRow {
    pub fn for_insert(
        request: &RecipeRequest,
        recipe: &Recipe,
        user_id: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: None,
            user_id: Some(user_id.to_string()),
            ingredients: request.ingredients().to_string(),
            goal: request.goal_labels().join(", "),
            cooking_time: request.cooking_time_minutes(),
            recipe_name: recipe.name.clone(),
            recipe_details: serde_json::to_value(recipe)?,
            created_at: None,
        })
    }

    pub fn into_entry(self) -> SearchHistoryEntry {
        let mut recipe = recipe_from_value(&self.recipe_details);
        if !self.recipe_name.trim().is_empty() {
            recipe.name = self.recipe_name;
        }
        SearchHistoryEntry {
            id: self.id.unwrap_or_default(),
            ingredients: self.ingredients,
            goals: GoalTag::parse_joined(&self.goal),
            cooking_time_minutes: self.cooking_time,
            recipe,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_payload_uses_wire_names() {
        let request = RecipeRequest::new("rice", vec![GoalTag::Vegan, GoalTag::Kosher], 40).unwrap();
        let payload = GenerateRecipePayload::new(
            &request,
            GenerationOptions {
                different_idea: true,
                regeneration_count: 2,
            },
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "ingredients": "rice",
                "goals": ["Vegan", "Kosher"],
                "cookingTime": 40,
                "regenerationCount": 2,
                "differentIdea": true
            })
        );
    }

    #[test]
    fn email_recipe_always_has_an_image() {
        let recipe = Recipe::default();
        assert_eq!(EmailRecipe::from(&recipe).image_url, DEFAULT_EMAIL_IMAGE_URL);
    }

    #[test]
    fn saved_row_with_nulls_maps_to_defaults() {
        let row: SavedRecipeRow = serde_json::from_value(json!({
            "id": "r1",
            "recipe_name": "Soup",
            "ingredients": ["water"],
            "instructions": "Boil.",
            "protein": null,
            "is_favorited": null,
            "created_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        let recipe = Recipe::from(row);
        assert_eq!(recipe.id.as_deref(), Some("r1"));
        assert_eq!(recipe.protein_grams, 0.0);
        assert!(!recipe.favorited);
        assert!(recipe.goals.is_empty());
        assert!(recipe.created_at.is_some());
    }

    #[test]
    fn search_row_becomes_history_entry() {
        let row: SearchRow = serde_json::from_value(json!({
            "id": "s1",
            "ingredients": "eggs",
            "goal": "Build muscle, Lose fat",
            "cooking_time": 20,
            "recipe_name": "Egg Bites",
            "recipe_details": {"recipeName": "Egg Bites", "calories": 220}
        }))
        .unwrap();
        let entry = row.into_entry();
        assert_eq!(entry.goals, vec![GoalTag::BuildMuscle, GoalTag::LoseFat]);
        assert_eq!(entry.recipe.name, "Egg Bites");
        assert_eq!(entry.recipe.calories, 220.0);
    }
}
