use fime::api_connection::{FakeBackend, RecipeGenerationService};
use fime::conversation::{ConversationController, ConversationStep, Settled, Transition};
use fime::recipe::{GoalTag, Role};
use fime::view::RecipeView;

fn through_intake(chat: &mut ConversationController) {
    assert_eq!(
        chat.submit_ingredients("  chicken, rice, broccoli "),
        Transition::Advanced(ConversationStep::CollectingGoals)
    );
    chat.toggle_goal(GoalTag::BuildMuscle);
    chat.toggle_goal(GoalTag::GlutenFree);
    assert_eq!(
        chat.continue_with_goals(),
        Transition::Advanced(ConversationStep::CollectingTime)
    );
    assert_eq!(chat.set_cooking_time_input("25"), 25);
}

#[tokio::test]
async fn wizard_generates_and_records_history() {
    let backend = FakeBackend::new();
    let mut chat = ConversationController::default();
    through_intake(&mut chat);

    let ticket = chat.submit_cooking_time().unwrap();
    assert_eq!(ticket.request().ingredients(), "chicken, rice, broccoli");
    assert_eq!(
        ticket.request().goals(),
        &[GoalTag::BuildMuscle, GoalTag::GlutenFree]
    );
    assert_eq!(chat.run(&backend, ticket).await, Settled::Applied);
    assert_eq!(chat.step(), ConversationStep::Done);

    let recipe = chat.recipe().unwrap().clone();
    assert_eq!(recipe.name, "Chicken Skillet");
    assert_eq!(recipe.protein_grams, 25.0);
    assert_eq!(recipe.cooking_time_minutes, 25);
    assert_eq!(recipe.goals, vec!["Build muscle", "Gluten-free"]);

    // welcome, then two messages per intake step, then one for the result
    let roles: Vec<Role> = chat.transcript().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Assistant,
        ]
    );
    assert_eq!(chat.transcript()[5].text, "25 minutes");

    let view = RecipeView::new(recipe, chat.request().cloned());
    view.record_history(&backend, true).await;
    let searches = backend.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].recipe.name, "Chicken Skillet");
    assert_eq!(searches[0].cooking_time_minutes, 25);
}

#[tokio::test]
async fn different_idea_forwards_regeneration_count() {
    let backend = FakeBackend::new();
    let mut chat = ConversationController::default();
    through_intake(&mut chat);

    let ticket = chat.submit_cooking_time().unwrap();
    chat.run(&backend, ticket).await;
    let first = chat.recipe().unwrap().name.clone();

    let ticket = chat.retry(true).unwrap();
    assert!(chat.is_loading());
    chat.run(&backend, ticket).await;
    assert_ne!(chat.recipe().unwrap().name, first);
    assert_eq!(chat.recipe().unwrap().name, "Chicken Grain Bowl (take 2)");

    let calls = backend.generation_calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].1.different_idea);
    assert!(calls[1].1.different_idea);
    assert_eq!(calls[1].1.regeneration_count, 1);
    assert_eq!(calls[0].0, calls[1].0);
}

#[tokio::test]
async fn failure_then_retry_recovers() {
    let backend = FakeBackend::with_responses(vec![Err("model overloaded".to_string())]);
    let mut chat = ConversationController::default();
    through_intake(&mut chat);

    let ticket = chat.submit_cooking_time().unwrap();
    chat.run(&backend, ticket).await;
    assert_eq!(chat.step(), ConversationStep::Failed);
    assert!(chat.error().unwrap().contains("model overloaded"));
    assert!(chat.recipe().is_none());

    let ticket = chat.retry(false).unwrap();
    chat.run(&backend, ticket).await;
    assert_eq!(chat.step(), ConversationStep::Done);
    assert!(chat.error().is_none());
}

#[tokio::test]
async fn regenerate_while_in_flight_ignores_the_first_answer() {
    let backend = FakeBackend::with_responses(vec![
        Ok(r#"{"recipeName": "First Answer"}"#.to_string()),
        Ok(r#"{"recipeName": "Second Answer"}"#.to_string()),
    ]);
    let mut chat = ConversationController::default();
    through_intake(&mut chat);

    let first = chat.submit_cooking_time().unwrap();
    let second = chat.retry(false).unwrap();

    let first_raw = backend
        .generate_recipe(first.request(), first.options())
        .await;
    let second_raw = backend
        .generate_recipe(second.request(), second.options())
        .await;

    assert_eq!(chat.complete(&second, second_raw), Settled::Applied);
    assert_eq!(chat.complete(&first, first_raw), Settled::Stale);
    assert_eq!(chat.recipe().unwrap().name, "Second Answer");
}

#[tokio::test]
async fn malformed_answer_still_renders() {
    let backend = FakeBackend::with_responses(vec![Ok("Sorry, I can't help with that.".to_string())]);
    let mut chat = ConversationController::default();
    through_intake(&mut chat);

    let ticket = chat.submit_cooking_time().unwrap();
    chat.run(&backend, ticket).await;
    let recipe = chat.recipe().unwrap();
    assert_eq!(recipe.name, "Healthy Recipe");
    assert!(recipe.ingredients.is_empty());
    assert_eq!(recipe.calories, 0.0);
    assert_eq!(recipe.cooking_time_minutes, 25);
}
