use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::recipe::{Recipe, RecipeRequest};

/// Which strategy produced a parsed recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    FencedJson,
    Json,
    FreeText,
}

/// Labeled sections of the free-text response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Name,
    Ingredients,
    Instructions,
    Nutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    Protein,
    Carbs,
    Fat,
    Calories,
}

struct SectionRule {
    section: Section,
    anchor: Regex,
}

struct NutrientRule {
    nutrient: Nutrient,
    pattern: Regex,
}

// A heading line: optional markdown decoration, the label, an optional
// parenthetical like "(estimated)", then either a colon or end of line.
fn anchor(label: &str) -> Regex {
    let pattern = format!(
        r"(?im)^[ \t>#*_-]*(?:{label})[ \t]*(?:\([^)\n]*\))?[ \t*_]*(?::[ \t*_]*|\r?$)"
    );
    Regex::new(&pattern).expect("section anchor pattern is valid")
}

fn nutrient(label: &str) -> Regex {
    let pattern = format!(
        r"(?i)\b(?:{label})\b[ \t]*(?:\([^)\n]*\))?[ \t]*[:=\-]?[ \t]*~?[ \t]*(\d{{1,3}}(?:,\d{{3}})+(?:\.\d+)?|\d+(?:\.\d+)?)"
    );
    Regex::new(&pattern).expect("nutrient pattern is valid")
}

static SECTION_RULES: LazyLock<Vec<SectionRule>> = LazyLock::new(|| {
    vec![
        SectionRule {
            section: Section::Name,
            anchor: anchor(r"recipe[ \t]+name"),
        },
        SectionRule {
            section: Section::Ingredients,
            anchor: anchor(r"ingredients(?:[ \t]+list)?"),
        },
        SectionRule {
            section: Section::Instructions,
            anchor: anchor(r"(?:preparation[ \t]+)?instructions|directions"),
        },
        SectionRule {
            section: Section::Nutrition,
            anchor: anchor(r"nutritional[ \t]+information|nutrition"),
        },
    ]
});

static NUTRIENT_RULES: LazyLock<Vec<NutrientRule>> = LazyLock::new(|| {
    vec![
        NutrientRule {
            nutrient: Nutrient::Protein,
            pattern: nutrient("protein"),
        },
        NutrientRule {
            nutrient: Nutrient::Carbs,
            pattern: nutrient("carbs?|carbohydrates?"),
        },
        NutrientRule {
            nutrient: Nutrient::Fat,
            pattern: nutrient("fats?"),
        },
        NutrientRule {
            nutrient: Nutrient::Calories,
            pattern: nutrient("calories"),
        },
    ]
});

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]\s*|\d+[.)]\s+)").expect("bullet pattern is valid")
});

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*~?\s*(\d+(?:\.\d+)?)").expect("number pattern is valid")
});

/// Parses a raw generation response into a recipe. Never fails: every field
/// missing from the response falls back to its default.
pub fn parse_recipe_response(raw: &str) -> Recipe {
    parse_with_path(raw).0
}

/// Like [`parse_recipe_response`], also reporting which strategy matched.
pub fn parse_with_path(raw: &str) -> (Recipe, ParsePath) {
    let trimmed = raw.trim();

    for block in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(map) = json_object(&block[1]) {
            debug!("Parsed recipe from fenced JSON block");
            return (recipe_from_map(&map), ParsePath::FencedJson);
        }
    }

    if let Some(map) = json_object(trimmed) {
        debug!("Parsed recipe from JSON payload");
        return (recipe_from_map(&map), ParsePath::Json);
    }

    debug!("Falling back to free-text recipe extraction");
    (recipe_from_text(trimmed), ParsePath::FreeText)
}

/// Parses a response and fills the cooking time and goals from the
/// originating request when the response leaves them out.
pub fn parse_for_request(raw: &str, request: &RecipeRequest) -> Recipe {
    let mut recipe = parse_recipe_response(raw);
    if recipe.cooking_time_minutes == 0 {
        recipe.cooking_time_minutes = request.cooking_time_minutes();
    }
    if recipe.goals.is_empty() {
        recipe.goals = request.goal_labels();
    }
    recipe
}

/// Builds a recipe from an already-decoded JSON value, as stored in
/// search history rows. Non-object values yield the default recipe.
pub fn recipe_from_value(value: &Value) -> Recipe {
    match value {
        Value::Object(map) => recipe_from_map(map),
        Value::String(text) => parse_recipe_response(text),
        _ => Recipe::default(),
    }
}

fn json_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Splits free text into its labeled sections. Each anchor is taken at its
/// first occurrence and its section runs up to the next anchor or the end.
pub fn extract_sections(text: &str) -> Vec<(Section, &str)> {
    let mut found: Vec<(Section, usize, usize)> = SECTION_RULES
        .iter()
        .filter_map(|rule| {
            rule.anchor
                .find(text)
                .map(|m| (rule.section, m.start(), m.end()))
        })
        .collect();
    found.sort_by_key(|&(_, start, _)| start);

    found
        .iter()
        .map(|&(section, _, body_start)| {
            let body_end = found
                .iter()
                .map(|&(_, start, _)| start)
                .filter(|&start| start >= body_start)
                .min()
                .unwrap_or(text.len());
            (section, &text[body_start..body_end])
        })
        .collect()
}

/// First number adjacent to the nutrient's label, or 0 when the label is
/// absent.
pub fn extract_nutrient(text: &str, wanted: Nutrient) -> f64 {
    NUTRIENT_RULES
        .iter()
        .find(|rule| rule.nutrient == wanted)
        .and_then(|rule| rule.pattern.captures(text))
        .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Ingredient lines with bullet markers and ordinals removed.
pub fn extract_list_items(section: &str) -> Vec<String> {
    section
        .lines()
        .map(|line| BULLET.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn clean_heading(line: &str) -> String {
    line.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == '_' || c == '"')
        .trim()
        .to_string()
}

fn recipe_from_text(text: &str) -> Recipe {
    let mut recipe = Recipe::default();

    for (section, body) in extract_sections(text) {
        match section {
            Section::Name => {
                if let Some(name) = body
                    .lines()
                    .map(clean_heading)
                    .find(|line| !line.is_empty())
                {
                    recipe.name = name;
                }
            }
            Section::Ingredients => recipe.ingredients = extract_list_items(body),
            Section::Instructions => recipe.instructions = body.trim().to_string(),
            Section::Nutrition => {
                recipe.protein_grams = extract_nutrient(body, Nutrient::Protein);
                recipe.carb_grams = extract_nutrient(body, Nutrient::Carbs);
                recipe.fat_grams = extract_nutrient(body, Nutrient::Fat);
                recipe.calories = extract_nutrient(body, Nutrient::Calories);
            }
        }
    }

    recipe
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_amount(value: &Value) -> f64 {
    let amount = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => LEADING_NUMBER
            .captures(s)
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    };
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

fn as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => field(obj, &["name", "item", "raw_text", "text"]).and_then(as_text),
                other => as_text(other),
            })
            .filter(|item| !item.is_empty())
            .collect(),
        Value::String(s) => extract_list_items(s),
        _ => Vec::new(),
    }
}

fn recipe_from_map(map: &Map<String, Value>) -> Recipe {
    // Some responses wrap the payload as {"recipe": {...}}.
    if field(map, &["recipeName", "recipe_name", "name", "title"]).is_none() {
        if let Some(Value::Object(inner)) = map.get("recipe") {
            return recipe_from_map(inner);
        }
    }

    let mut recipe = Recipe::default();

    if let Some(name) = field(map, &["recipeName", "recipe_name", "name", "title"])
        .and_then(as_text)
        .filter(|name| !name.is_empty())
    {
        recipe.name = name;
    }
    if let Some(value) = field(map, &["ingredients"]) {
        recipe.ingredients = as_string_list(value);
    }
    if let Some(value) = field(map, &["instructions", "steps"]) {
        recipe.instructions = match value {
            Value::Array(_) => as_string_list(value).join("\n"),
            other => as_text(other).unwrap_or_default(),
        };
    }
    recipe.protein_grams = field(map, &["protein", "proteinGrams", "protein_grams"]).map_or(0.0, as_amount);
    recipe.carb_grams = field(map, &["carbs", "carbGrams", "carb_grams", "carbohydrates"]).map_or(0.0, as_amount);
    recipe.fat_grams = field(map, &["fat", "fatGrams", "fat_grams"]).map_or(0.0, as_amount);
    recipe.calories = field(map, &["calories", "kcal"]).map_or(0.0, as_amount);
    recipe.cooking_time_minutes = field(
        map,
        &["cookingTime", "cooking_time", "cookingTimeMinutes", "cooking_time_minutes"],
    )
    .map_or(0, |value| as_amount(value).round().min(u32::MAX as f64) as u32);
    if let Some(value) = field(map, &["goals"]) {
        recipe.goals = match value {
            Value::String(joined) => joined
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            other => as_string_list(other),
        };
    }
    recipe.image_url = field(map, &["imageUrl", "image_url"])
        .and_then(as_text)
        .filter(|url| !url.is_empty());
    recipe.image_prompt = field(map, &["imagePrompt", "image_prompt"])
        .and_then(as_text)
        .filter(|prompt| !prompt.is_empty());
    recipe.favorited = field(map, &["isFavorited", "is_favorited", "favorited"])
        .and_then(Value::as_bool)
        .unwrap_or(false);
    recipe.id = field(map, &["id"]).and_then(as_text);
    recipe.created_at = field(map, &["createdAt", "created_at"])
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    recipe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{GoalTag, PLACEHOLDER_RECIPE_NAME};

    const OMELETTE: &str = "Recipe Name:\nOmelette\nIngredients:\n- 2 eggs\n- salt\nInstructions:\n1. Whisk eggs\n2. Cook\nNutritional Information:\nProtein: ~12g\nCarbs: ~1g\nFat: ~10g\nCalories: ~150";

    #[test]
    fn free_text_block_yields_all_fields() {
        let (recipe, path) = parse_with_path(OMELETTE);
        assert_eq!(path, ParsePath::FreeText);
        assert_eq!(recipe.name, "Omelette");
        assert_eq!(recipe.ingredients, vec!["2 eggs", "salt"]);
        assert!(recipe.instructions.contains("1. Whisk eggs"));
        assert!(recipe.instructions.contains("2. Cook"));
        assert_eq!(recipe.protein_grams, 12.0);
        assert_eq!(recipe.carb_grams, 1.0);
        assert_eq!(recipe.fat_grams, 10.0);
        assert_eq!(recipe.calories, 150.0);
    }

    #[test]
    fn generation_prompt_format_with_decorations() {
        let text = "Recipe Name:  \nSpicy Chickpea Bowl\n\nIngredients:  \n- 1 can chickpeas  \n* 1 tsp paprika\n• 1 cup rice\n\nPreparation Instructions:  \n1. Rinse chickpeas.\n2. Toast paprika.\n\nNutritional Information (estimated):  \n- Protein: ~18g  \n- Carbs: ~62.5g  \n- Fat: ~7g  \n- Calories: ~1,200";
        let recipe = parse_recipe_response(text);
        assert_eq!(recipe.name, "Spicy Chickpea Bowl");
        assert_eq!(recipe.ingredients, vec!["1 can chickpeas", "1 tsp paprika", "1 cup rice"]);
        assert_eq!(recipe.instructions, "1. Rinse chickpeas.\n2. Toast paprika.");
        assert_eq!(recipe.carb_grams, 62.5);
        assert_eq!(recipe.calories, 1200.0);
    }

    #[test]
    fn inline_name_and_markdown_headings() {
        let text = "**Recipe Name:** Green Shakshuka\n## Ingredients\n1. 3 eggs\n2) spinach\n## Instructions\nSimmer everything.";
        let recipe = parse_recipe_response(text);
        assert_eq!(recipe.name, "Green Shakshuka");
        assert_eq!(recipe.ingredients, vec!["3 eggs", "spinach"]);
        assert_eq!(recipe.instructions, "Simmer everything.");
    }

    #[test]
    fn json_payload_accepts_snake_and_camel_names() {
        let camel = r#"{"recipeName": "Tofu Stir Fry", "ingredients": ["tofu"], "instructions": "Fry.", "protein": 20, "carbs": 10, "fat": 5, "calories": 300}"#;
        let snake = r#"{"recipe_name": "Tofu Stir Fry", "ingredients": ["tofu"], "instructions": "Fry.", "protein": "20g"}"#;
        let (from_camel, path) = parse_with_path(camel);
        assert_eq!(path, ParsePath::Json);
        assert_eq!(from_camel.name, "Tofu Stir Fry");
        assert_eq!(from_camel.calories, 300.0);
        let from_snake = parse_recipe_response(snake);
        assert_eq!(from_snake.name, "Tofu Stir Fry");
        assert_eq!(from_snake.protein_grams, 20.0);
    }

    #[test]
    fn fenced_json_takes_precedence_over_free_text() {
        let text = "Recipe Name:\nIgnored\n```json\n{\"recipeName\": \"Fenced\", \"calories\": 410}\n```\nNutritional Information:\nCalories: 99";
        let (recipe, path) = parse_with_path(text);
        assert_eq!(path, ParsePath::FencedJson);
        assert_eq!(recipe.name, "Fenced");
        assert_eq!(recipe.calories, 410.0);
    }

    #[test]
    fn fenced_block_that_is_not_json_falls_through() {
        let text = "```\nRecipe Name:\nPlain\n```";
        let (recipe, path) = parse_with_path(text);
        assert_eq!(path, ParsePath::FreeText);
        assert_eq!(recipe.name, "Plain");
    }

    #[test]
    fn json_snippet_inside_free_text_is_not_a_payload() {
        let text = format!("{}\n\nMacro summary: {{\"calories\": 150}}", OMELETTE);
        let (recipe, path) = parse_with_path(&text);
        assert_eq!(path, ParsePath::FreeText);
        assert_eq!(recipe.name, "Omelette");
        assert_eq!(recipe.ingredients, vec!["2 eggs", "salt"]);
        assert_eq!(recipe.protein_grams, 12.0);

        let (recipe, path) = parse_with_path("Here you go: {\"recipeName\": \"Soup\"}");
        assert_eq!(path, ParsePath::FreeText);
        assert_eq!(recipe.name, PLACEHOLDER_RECIPE_NAME);
    }

    #[test]
    fn first_anchor_occurrence_wins() {
        let text = "Recipe Name:\nFirst\nIngredients:\n- a\nRecipe Name:\nSecond";
        let sections = extract_sections(text);
        let names: Vec<_> = sections.iter().filter(|(s, _)| *s == Section::Name).collect();
        assert_eq!(names.len(), 1);
        assert_eq!(parse_recipe_response(text).name, "First");
    }

    #[test]
    fn nutrient_reads_the_number_next_to_its_label() {
        let line = "Serves 2 people, Protein: 25g from 3 sources, Fat 9 g";
        assert_eq!(extract_nutrient(line, Nutrient::Protein), 25.0);
        assert_eq!(extract_nutrient(line, Nutrient::Fat), 9.0);
        assert_eq!(extract_nutrient(line, Nutrient::Carbs), 0.0);
    }

    #[test]
    fn missing_labels_fall_back_to_zero() {
        let recipe = parse_recipe_response("Nutritional Information:\nProtein: 8g");
        assert_eq!(recipe.protein_grams, 8.0);
        assert_eq!(recipe.carb_grams, 0.0);
        assert_eq!(recipe.fat_grams, 0.0);
        assert_eq!(recipe.calories, 0.0);
    }

    #[test]
    fn parser_is_total_on_garbage() {
        for input in ["", "   ", "{not json", "[1, 2, 3]", "just some prose about dinner", "{\"protein\": -4}"] {
            let recipe = parse_recipe_response(input);
            assert_eq!(recipe.name, PLACEHOLDER_RECIPE_NAME);
            assert!(recipe.protein_grams >= 0.0);
            assert!(recipe.carb_grams >= 0.0);
            assert!(recipe.fat_grams >= 0.0);
            assert!(recipe.calories >= 0.0);
            assert_eq!(parse_recipe_response(input), recipe);
        }
    }

    #[test]
    fn request_fills_missing_time_and_goals() {
        let request = RecipeRequest::new("eggs", vec![GoalTag::BuildMuscle], 25).unwrap();
        let recipe = parse_for_request(OMELETTE, &request);
        assert_eq!(recipe.cooking_time_minutes, 25);
        assert_eq!(recipe.goals, vec!["Build muscle"]);
    }

    #[test]
    fn nested_recipe_object_is_unwrapped() {
        let value: Value = serde_json::json!({"recipe": {"recipe_name": "Nested", "steps": ["Boil", "Serve"]}});
        let recipe = recipe_from_value(&value);
        assert_eq!(recipe.name, "Nested");
        assert_eq!(recipe.instructions, "Boil\nServe");
    }
}
