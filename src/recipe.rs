use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Dietary or fitness objective the user can attach to a recipe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalTag {
    #[serde(rename = "Build muscle")]
    BuildMuscle,
    #[serde(rename = "Lose fat")]
    LoseFat,
    #[serde(rename = "Maintain weight")]
    MaintainWeight,
    #[serde(rename = "Cycle-based nutrition")]
    CycleBasedNutrition,
    #[serde(rename = "Vegan")]
    Vegan,
    #[serde(rename = "Gluten-free")]
    GlutenFree,
    #[serde(rename = "Kosher")]
    Kosher,
}

impl GoalTag {
    pub const ALL: [GoalTag; 7] = [
        GoalTag::BuildMuscle,
        GoalTag::LoseFat,
        GoalTag::MaintainWeight,
        GoalTag::CycleBasedNutrition,
        GoalTag::Vegan,
        GoalTag::GlutenFree,
        GoalTag::Kosher,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GoalTag::BuildMuscle => "Build muscle",
            GoalTag::LoseFat => "Lose fat",
            GoalTag::MaintainWeight => "Maintain weight",
            GoalTag::CycleBasedNutrition => "Cycle-based nutrition",
            GoalTag::Vegan => "Vegan",
            GoalTag::GlutenFree => "Gluten-free",
            GoalTag::Kosher => "Kosher",
        }
    }

    /// Parses a comma-joined label list as stored in search history rows.
    /// Unknown labels are skipped.
    pub fn parse_joined(joined: &str) -> Vec<GoalTag> {
        joined
            .split(',')
            .filter_map(|label| label.parse().ok())
            .collect()
    }
}

impl fmt::Display for GoalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown goal: {0}")]
pub struct UnknownGoal(pub String);

impl FromStr for GoalTag {
    type Err = UnknownGoal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        GoalTag::ALL
            .iter()
            .copied()
            .find(|goal| goal.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownGoal(wanted.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("ingredients must not be empty")]
    EmptyIngredients,
    #[error("at least one goal must be selected")]
    NoGoals,
    #[error("cooking time must be a positive number of minutes")]
    InvalidCookingTime,
}

/// Validated intake produced by the wizard and sent verbatim to the
/// generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRequest {
    ingredients: String,
    goals: Vec<GoalTag>,
    #[serde(rename = "cookingTime")]
    cooking_time_minutes: u32,
}

impl RecipeRequest {
    pub fn new(
        ingredients: impl Into<String>,
        goals: Vec<GoalTag>,
        cooking_time_minutes: u32,
    ) -> Result<Self, RequestError> {
        let ingredients = ingredients.into().trim().to_string();
        if ingredients.is_empty() {
            return Err(RequestError::EmptyIngredients);
        }
        if goals.is_empty() {
            return Err(RequestError::NoGoals);
        }
        if cooking_time_minutes == 0 {
            return Err(RequestError::InvalidCookingTime);
        }
        let mut ordered: Vec<GoalTag> = Vec::with_capacity(goals.len());
        for goal in goals {
            if !ordered.contains(&goal) {
                ordered.push(goal);
            }
        }
        Ok(Self {
            ingredients,
            goals: ordered,
            cooking_time_minutes,
        })
    }

    pub fn ingredients(&self) -> &str {
        &self.ingredients
    }

    /// Goals in the order the user selected them.
    pub fn goals(&self) -> &[GoalTag] {
        &self.goals
    }

    pub fn cooking_time_minutes(&self) -> u32 {
        self.cooking_time_minutes
    }

    pub fn goal_labels(&self) -> Vec<String> {
        self.goals.iter().map(|g| g.label().to_string()).collect()
    }
}

pub const PLACEHOLDER_RECIPE_NAME: &str = "Healthy Recipe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    #[serde(rename = "recipeName")]
    pub name: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    #[serde(rename = "protein")]
    pub protein_grams: f64,
    #[serde(rename = "carbs")]
    pub carb_grams: f64,
    #[serde(rename = "fat")]
    pub fat_grams: f64,
    pub calories: f64,
    #[serde(rename = "cookingTime")]
    pub cooking_time_minutes: u32,
    pub goals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(rename = "isFavorited")]
    pub favorited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            name: PLACEHOLDER_RECIPE_NAME.to_string(),
            ingredients: Vec::new(),
            instructions: String::new(),
            protein_grams: 0.0,
            carb_grams: 0.0,
            fat_grams: 0.0,
            calories: 0.0,
            cooking_time_minutes: 0,
            goals: Vec::new(),
            image_url: None,
            image_prompt: None,
            favorited: false,
            id: None,
            created_at: None,
        }
    }
}

impl Recipe {
    /// Instruction steps, one per non-empty line.
    pub fn steps(&self) -> Vec<&str> {
        self.instructions
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// The prompt used for image generation: the recipe's own prompt when
    /// it carries one, otherwise a description built from the name and the
    /// leading ingredients.
    pub fn image_prompt_or_default(&self) -> String {
        if let Some(prompt) = self.image_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            return prompt.to_string();
        }
        let leading: Vec<&str> = self
            .ingredients
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        if leading.is_empty() {
            format!("{}, freshly plated", self.name)
        } else {
            format!("{} made with {}, freshly plated", self.name, leading.join(", "))
        }
    }
}

/// A past request together with the recipe it produced. Owned by the
/// remote store and read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: String,
    pub ingredients: String,
    pub goals: Vec<GoalTag>,
    pub cooking_time_minutes: u32,
    pub recipe: Recipe,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_labels_round_trip_through_from_str() {
        for goal in GoalTag::ALL {
            assert_eq!(goal.label().parse::<GoalTag>(), Ok(goal));
        }
        assert_eq!("  vegan ".parse::<GoalTag>(), Ok(GoalTag::Vegan));
        assert!("Paleo".parse::<GoalTag>().is_err());
    }

    #[test]
    fn parse_joined_skips_unknown_labels() {
        let goals = GoalTag::parse_joined("Build muscle, Paleo, Kosher");
        assert_eq!(goals, vec![GoalTag::BuildMuscle, GoalTag::Kosher]);
    }

    #[test]
    fn request_rejects_invalid_intake() {
        assert_eq!(
            RecipeRequest::new("   ", vec![GoalTag::Vegan], 30),
            Err(RequestError::EmptyIngredients)
        );
        assert_eq!(
            RecipeRequest::new("eggs", vec![], 30),
            Err(RequestError::NoGoals)
        );
        assert_eq!(
            RecipeRequest::new("eggs", vec![GoalTag::Vegan], 0),
            Err(RequestError::InvalidCookingTime)
        );
    }

    #[test]
    fn request_keeps_selection_order_without_duplicates() {
        let request = RecipeRequest::new(
            " eggs, rice ",
            vec![GoalTag::Vegan, GoalTag::BuildMuscle, GoalTag::Vegan],
            20,
        )
        .unwrap();
        assert_eq!(request.ingredients(), "eggs, rice");
        assert_eq!(request.goals(), &[GoalTag::Vegan, GoalTag::BuildMuscle]);
    }

    #[test]
    fn request_serializes_with_wire_names() {
        let request = RecipeRequest::new("eggs", vec![GoalTag::LoseFat], 15).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["cookingTime"], 15);
        assert_eq!(value["goals"][0], "Lose fat");
    }

    #[test]
    fn default_image_prompt_uses_leading_ingredients() {
        let recipe = Recipe {
            name: "Omelette".to_string(),
            ingredients: vec!["2 eggs".into(), "salt".into(), "chives".into(), "butter".into()],
            ..Recipe::default()
        };
        assert_eq!(
            recipe.image_prompt_or_default(),
            "Omelette made with 2 eggs, salt, chives, freshly plated"
        );
    }
}
