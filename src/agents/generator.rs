//! Puzzle Generator Agent.
//!
//! Authors one candidate per call using the chain-of-thought contract: the
//! model returns a `thinking` trace (brainstorm, chosen concept, reasoning)
//! alongside the final `puzzle`. Both are kept; the trace is attached to the
//! accepted result for review.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::categories::{CategoryRegistry, PuzzleCategory};
use crate::llm::{GenerativeAdapter, ModelTier, StructuredOutput, StructuredRequest, DEFAULT_CALL_TIMEOUT};
use crate::puzzle::{Candidate, GenerationBrief, ThinkingTrace, MAX_DIFFICULTY, MIN_DIFFICULTY};

use super::error::{AgentError, AgentResult};

/// Schema name for the generation contract.
pub const GENERATION_SCHEMA: &str = "puzzle_generation";

const SYSTEM_PROMPT: &str = r#"You are a puzzle author for a daily emoji-rebus game.

Players see only the puzzle body (emoji, arrows, numbers and a few letters) and must name the answer.
Think before you write: brainstorm several concepts, pick the one with the cleanest visual encoding,
then explain how each element maps to the answer.

Rules:
1. The answer must be unambiguous once solved. No second answer may fit equally well.
2. Never spell the answer out in plain text inside the puzzle body.
3. Hints go from gentle to strong; the last hint must not give the answer away.
4. Rate difficulty honestly from 1 (instant) to 10 (expert).

Output ONLY the JSON object described by the schema."#;

const USER_PROMPT_TEMPLATE: &str = r#"Create one {category} puzzle whose answer is {answer_kind}.

Target difficulty: {difficulty}/10
Theme: {theme}

Category guidance:
{guidance}

Do not reuse any of these recent answers:
{avoid}

Respond with:
{
  "thinking": {"brainstorm": ["..."], "chosenConcept": "...", "reasoning": "..."},
  "puzzle": {"content": "...", "answer": "...", "category": "{category}", "explanation": "...", "hints": ["..."], "difficulty": <1-10>}
}"#;

/// JSON schema for [`GenerationContract`].
pub fn generation_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["thinking", "puzzle"],
        "properties": {
            "thinking": {
                "type": "object",
                "additionalProperties": false,
                "required": ["brainstorm", "chosenConcept", "reasoning"],
                "properties": {
                    "brainstorm": {"type": "array", "items": {"type": "string"}},
                    "chosenConcept": {"type": "string"},
                    "reasoning": {"type": "string"}
                }
            },
            "puzzle": {
                "type": "object",
                "additionalProperties": false,
                "required": ["content", "answer", "category", "explanation", "hints", "difficulty"],
                "properties": {
                    "content": {"type": "string"},
                    "answer": {"type": "string"},
                    "category": {"type": "string", "enum": PuzzleCategory::all_slugs()},
                    "explanation": {"type": "string"},
                    "hints": {"type": "array", "items": {"type": "string"}},
                    "difficulty": {"type": "integer", "minimum": MIN_DIFFICULTY, "maximum": MAX_DIFFICULTY}
                }
            }
        }
    })
}

/// The puzzle half of the generation contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzlePayload {
    pub content: String,
    pub answer: String,
    pub category: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub difficulty: i64,
}

/// Full generation response: reasoning trace plus the puzzle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationContract {
    #[serde(default)]
    pub thinking: ThinkingTrace,
    pub puzzle: PuzzlePayload,
}

impl StructuredOutput for GenerationContract {
    fn validate(&self) -> Result<(), String> {
        if self.puzzle.content.trim().is_empty() {
            return Err("puzzle.content is empty".to_string());
        }
        if self.puzzle.answer.trim().is_empty() {
            return Err("puzzle.answer is empty".to_string());
        }
        self.puzzle.category.parse::<PuzzleCategory>()?;
        let range = i64::from(MIN_DIFFICULTY)..=i64::from(MAX_DIFFICULTY);
        if !range.contains(&self.puzzle.difficulty) {
            return Err(format!(
                "puzzle.difficulty {} outside {}-{}",
                self.puzzle.difficulty, MIN_DIFFICULTY, MAX_DIFFICULTY
            ));
        }
        Ok(())
    }
}

/// A generated candidate with the reasoning that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPuzzle {
    pub candidate: Candidate,
    pub thinking: ThinkingTrace,
}

/// Configuration for the Puzzle Generator Agent.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Sampling temperature; authoring runs hot.
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub model_tier: ModelTier,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            max_tokens: 2000,
            timeout: DEFAULT_CALL_TIMEOUT,
            model_tier: ModelTier::Creative,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = tier;
        self
    }
}

/// Puzzle Generator Agent.
pub struct PuzzleGenerator {
    adapter: GenerativeAdapter,
    categories: Arc<CategoryRegistry>,
    config: GeneratorConfig,
}

impl std::fmt::Debug for PuzzleGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PuzzleGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PuzzleGenerator {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "puzzle_generator";

    pub fn new(
        adapter: GenerativeAdapter,
        categories: Arc<CategoryRegistry>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            adapter,
            categories,
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates one candidate for the brief.
    pub async fn generate(&self, brief: &GenerationBrief) -> AgentResult<GeneratedPuzzle> {
        let prompt = self.build_prompt(brief)?;
        let request = StructuredRequest::new(GENERATION_SCHEMA, prompt, generation_schema())
            .with_system_instructions(SYSTEM_PROMPT)
            .with_temperature(self.config.temperature)
            .with_model_tier(self.config.model_tier)
            .with_timeout(self.config.timeout)
            .with_max_tokens(self.config.max_tokens);

        let contract: GenerationContract = self.adapter.request(&request).await?;
        let generated = into_generated(contract, brief)?;

        debug!(
            agent = Self::AGENT_NAME,
            answer = %generated.candidate.answer(),
            proposed = generated.candidate.proposed_difficulty(),
            "Candidate generated"
        );
        Ok(generated)
    }

    fn build_prompt(&self, brief: &GenerationBrief) -> AgentResult<String> {
        let strategy = self.categories.get(brief.category).ok_or_else(|| {
            AgentError::ConfigurationError(format!(
                "no strategy registered for category '{}'",
                brief.category
            ))
        })?;

        let theme = brief
            .theme
            .clone()
            .unwrap_or_else(|| "any well-known subject".to_string());
        let avoid = if brief.avoid_answers.is_empty() {
            "(none)".to_string()
        } else {
            brief
                .avoid_answers
                .iter()
                .map(|a| format!("- {}", a))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(USER_PROMPT_TEMPLATE
            .replace("{category}", brief.category.slug())
            .replace("{answer_kind}", strategy.answer_kind())
            .replace("{difficulty}", &brief.target_difficulty.to_string())
            .replace("{theme}", &theme)
            .replace("{guidance}", strategy.generation_guidance())
            .replace("{avoid}", &avoid))
    }
}

/// Maps a validated contract into a candidate for `brief`.
fn into_generated(contract: GenerationContract, brief: &GenerationBrief) -> AgentResult<GeneratedPuzzle> {
    let category = contract
        .puzzle
        .category
        .parse::<PuzzleCategory>()
        .map_err(AgentError::ResponseParseError)?;
    if category != brief.category {
        return Err(AgentError::GenerationFailed(format!(
            "asked for a {} puzzle, got {}",
            brief.category, category
        )));
    }

    let difficulty = contract
        .puzzle
        .difficulty
        .clamp(i64::from(MIN_DIFFICULTY), i64::from(MAX_DIFFICULTY)) as u8;

    let candidate = Candidate::new(
        contract.puzzle.content.trim(),
        contract.puzzle.answer.trim(),
        category,
        contract.puzzle.explanation,
        contract.puzzle.hints,
        difficulty,
    );

    Ok(GeneratedPuzzle {
        candidate,
        thinking: contract.thinking,
    })
}
