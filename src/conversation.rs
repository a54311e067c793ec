//! The intake wizard.
//!
//! A linear dialog: ingredients, then goals, then cooking time, then a
//! generation round-trip. Every accepted answer is echoed into the transcript
//! followed by the assistant's next prompt. Rejected input changes nothing.
//!
//! Generation is tracked with tickets. Only the most recently issued ticket
//! may settle the conversation; results for older tickets, or for any ticket
//! after the conversation was abandoned, are discarded.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api_connection::{ApiConnectionError, GenerationOptions, RecipeGenerationService};
use crate::config::ConversationConfig;
use crate::recipe::{ChatMessage, GoalTag, Recipe, RecipeRequest};
use crate::recipe_parser::parse_for_request;

pub const WELCOME_PROMPT: &str =
    "Hi there! I'm FiMe, your friendly nutrition assistant. What ingredients do you currently have at home?";
pub const GOALS_PROMPT: &str =
    "Great! Now, what's your goal for this meal? You can select multiple options.";
pub const GENERATING_PROMPT: &str = "Perfect! I'm creating a delicious recipe for you now...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStep {
    CollectingIngredients,
    CollectingGoals,
    CollectingTime,
    Generating,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced(ConversationStep),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Applied,
    Stale,
}

/// Permission to run one generation call for the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
    request: RecipeRequest,
    options: GenerationOptions,
}

impl GenerationTicket {
    pub fn request(&self) -> &RecipeRequest {
        &self.request
    }

    pub fn options(&self) -> GenerationOptions {
        self.options
    }
}

/// Turns free-form minutes into a bounded value. Anything that is not a
/// positive integer falls back to the configured default.
pub fn normalize_minutes(input: &str, config: &ConversationConfig) -> u32 {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u64>() {
        Ok(0) | Err(_) => config.default_minutes,
        Ok(minutes) => minutes.clamp(config.min_minutes as u64, config.max_minutes as u64) as u32,
    }
}

#[derive(Debug, Clone)]
pub struct ConversationController {
    config: ConversationConfig,
    handoff_delay: Duration,
    step: ConversationStep,
    transcript: Vec<ChatMessage>,
    ingredients: String,
    goals: Vec<GoalTag>,
    cooking_time_minutes: u32,
    request: Option<RecipeRequest>,
    recipe: Option<Recipe>,
    error: Option<String>,
    epoch: u64,
    in_flight: Option<u64>,
    regeneration_count: u32,
    abandoned: bool,
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new(ConversationConfig::default())
    }
}

impl ConversationController {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            config,
            handoff_delay: Duration::ZERO,
            step: ConversationStep::CollectingIngredients,
            transcript: vec![ChatMessage::assistant(WELCOME_PROMPT)],
            ingredients: String::new(),
            goals: Vec::new(),
            cooking_time_minutes: config.default_minutes,
            request: None,
            recipe: None,
            error: None,
            epoch: 0,
            in_flight: None,
            regeneration_count: 0,
            abandoned: false,
        }
    }

    /// Pause inserted before each generation call is dispatched.
    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn step(&self) -> ConversationStep {
        self.step
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn ingredients(&self) -> &str {
        &self.ingredients
    }

    /// Goals in selection order.
    pub fn selected_goals(&self) -> &[GoalTag] {
        &self.goals
    }

    pub fn cooking_time_minutes(&self) -> u32 {
        self.cooking_time_minutes
    }

    pub fn request(&self) -> Option<&RecipeRequest> {
        self.request.as_ref()
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn regeneration_count(&self) -> u32 {
        self.regeneration_count
    }

    pub fn is_loading(&self) -> bool {
        self.step == ConversationStep::Generating
    }

    pub fn submit_ingredients(&mut self, text: &str) -> Transition {
        let trimmed = text.trim();
        if self.step != ConversationStep::CollectingIngredients || trimmed.is_empty() {
            return Transition::Ignored;
        }
        self.ingredients = trimmed.to_string();
        self.transcript.push(ChatMessage::user(trimmed));
        self.transcript.push(ChatMessage::assistant(GOALS_PROMPT));
        self.advance(ConversationStep::CollectingGoals)
    }

    /// Adds or removes a goal. Returns whether the goal is selected afterwards.
    pub fn toggle_goal(&mut self, goal: GoalTag) -> bool {
        if self.step != ConversationStep::CollectingGoals {
            return self.goals.contains(&goal);
        }
        if let Some(pos) = self.goals.iter().position(|g| *g == goal) {
            self.goals.remove(pos);
            false
        } else {
            self.goals.push(goal);
            true
        }
    }

    pub fn can_continue(&self) -> bool {
        self.step == ConversationStep::CollectingGoals && !self.goals.is_empty()
    }

    pub fn continue_with_goals(&mut self) -> Transition {
        if !self.can_continue() {
            return Transition::Ignored;
        }
        let labels: Vec<&str> = self.goals.iter().map(|g| g.label()).collect();
        let labels = labels.join(", ");
        self.transcript.push(ChatMessage::user(labels.clone()));
        self.transcript.push(ChatMessage::assistant(format!(
            "Thanks! You've selected: {}. How many minutes do you have to cook?",
            labels
        )));
        self.advance(ConversationStep::CollectingTime)
    }

    /// Stores the minutes typed so far and returns the value that will be used.
    pub fn set_cooking_time_input(&mut self, input: &str) -> u32 {
        self.cooking_time_minutes = normalize_minutes(input, &self.config);
        self.cooking_time_minutes
    }

    /// Finishes the intake and issues the first generation ticket.
    pub fn submit_cooking_time(&mut self) -> Option<GenerationTicket> {
        if self.step != ConversationStep::CollectingTime {
            return None;
        }
        let request = match RecipeRequest::new(
            self.ingredients.clone(),
            self.goals.clone(),
            self.cooking_time_minutes,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Intake incomplete, staying on cooking time");
                return None;
            }
        };
        self.transcript
            .push(ChatMessage::user(format!("{} minutes", self.cooking_time_minutes)));
        self.transcript.push(ChatMessage::assistant(GENERATING_PROMPT));
        self.request = Some(request.clone());
        self.advance(ConversationStep::Generating);
        Some(self.issue_ticket(request, false))
    }

    /// Regenerates with the collected request. Supersedes any call still in
    /// flight. `different_idea` asks the service to avoid repeating itself.
    pub fn retry(&mut self, different_idea: bool) -> Option<GenerationTicket> {
        if self.abandoned
            || !matches!(
                self.step,
                ConversationStep::Generating | ConversationStep::Done | ConversationStep::Failed
            )
        {
            return None;
        }
        let request = self.request.clone()?;
        self.regeneration_count += 1;
        self.error = None;
        self.transcript.push(ChatMessage::assistant(if different_idea {
            "Let me think of something different..."
        } else {
            "Let me try that again..."
        }));
        self.advance(ConversationStep::Generating);
        Some(self.issue_ticket(request, different_idea))
    }

    /// The user navigated away: every outstanding or future result is ignored.
    pub fn abandon(&mut self) {
        if self.in_flight.take().is_some() {
            debug!("Conversation abandoned with a generation in flight");
        }
        self.abandoned = true;
    }

    /// Settles a generation call. Results for superseded tickets are dropped.
    pub fn complete(
        &mut self,
        ticket: &GenerationTicket,
        result: Result<String, ApiConnectionError>,
    ) -> Settled {
        if self.abandoned || self.in_flight != Some(ticket.epoch) {
            info!(epoch = ticket.epoch, current = self.epoch, "Discarded stale generation result");
            return Settled::Stale;
        }
        self.in_flight = None;
        match result {
            Ok(raw) => {
                let recipe = parse_for_request(&raw, &ticket.request);
                self.transcript.push(ChatMessage::assistant(format!(
                    "Here's what I came up with: {}. Enjoy!",
                    recipe.name
                )));
                self.recipe = Some(recipe);
                self.advance(ConversationStep::Done);
            }
            Err(e) => {
                warn!(error = %e, "Recipe generation failed");
                self.transcript.push(ChatMessage::assistant(
                    "Sorry, I couldn't create a recipe this time. You can try again.",
                ));
                self.error = Some(e.to_string());
                self.advance(ConversationStep::Failed);
            }
        }
        Settled::Applied
    }

    /// Dispatches a ticket to the service after the handoff pause and settles
    /// the conversation with the result.
    pub async fn run<S>(&mut self, service: &S, ticket: GenerationTicket) -> Settled
    where
        S: RecipeGenerationService + ?Sized,
    {
        if !self.handoff_delay.is_zero() {
            tokio::time::sleep(self.handoff_delay).await;
        }
        let result = service.generate_recipe(&ticket.request, ticket.options).await;
        self.complete(&ticket, result)
    }

    fn issue_ticket(&mut self, request: RecipeRequest, different_idea: bool) -> GenerationTicket {
        self.epoch += 1;
        self.in_flight = Some(self.epoch);
        debug!(epoch = self.epoch, different_idea, "Issued generation ticket");
        GenerationTicket {
            epoch: self.epoch,
            request,
            options: GenerationOptions {
                different_idea,
                regeneration_count: self.regeneration_count,
            },
        }
    }

    fn advance(&mut self, step: ConversationStep) -> Transition {
        debug!(from = ?self.step, to = ?step, "Conversation advanced");
        self.step = step;
        Transition::Advanced(step)
    }
}
