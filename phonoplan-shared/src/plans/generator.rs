/// AI plan generation
///
/// [`PlanGenerator`] is the seam between the plan routes and the text
/// generation provider. [`OpenAiPlanGenerator`] speaks the OpenAI-compatible
/// chat-completions API: one system prompt describing the plan JSON, one user
/// prompt carrying the teacher's input, `response_format = json_object`.
///
/// The reply must be a JSON object that passes [`ActivityPlan`] validation.
///
/// # Configuration
///
/// - `OPENAI_API_KEY`: required
/// - `OPENAI_MODEL`: required
/// - `OPENAI_BASE_URL`: default `https://api.openai.com/v1`

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::schema::{ActivityPlan, PlanGenerationInput};
use crate::validation::FieldError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "Você é um assistente que gera planos de atividades pedagógicas inclusivas. \
Sempre responda apenas com JSON válido seguindo o schema: {targetIpa, ageOrGrade, objectives[], accessibilityNeeds[{area, support}], activities[{title, steps[{title, instructions, durationMinutes}], resources[]}]}. \
Assegure coerência com idade/série, objetivos e necessidades informadas. Mantenha português claro.";

/// Error type for plan generation
#[derive(Debug, thiserror::Error)]
pub enum PlanGenerationError {
    /// The provider could not be reached or answered with an error status
    #[error("AI provider request failed: {0}")]
    Upstream(String),

    /// The provider answered without content
    #[error("AI provider returned an empty response")]
    EmptyResponse,

    /// The content is not JSON
    #[error("AI provider returned invalid JSON: {0}")]
    InvalidJson(String),

    /// The JSON does not match the plan schema
    #[error("Generated plan does not match the expected schema ({} errors)", .0.len())]
    SchemaMismatch(Vec<FieldError>),
}

/// Produces an activity plan from a teacher's input
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, input: &PlanGenerationInput) -> Result<ActivityPlan, PlanGenerationError>;
}

/// OpenAI-compatible provider settings
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Reads the provider variables; `None` if the key or model is missing
    pub fn from_env() -> Option<Self> {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        Some(Self {
            api_key: non_empty("OPENAI_API_KEY")?,
            model: non_empty("OPENAI_MODEL")?,
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// Chat-completions request for `input`
fn build_request<'a>(
    model: &'a str,
    input: &PlanGenerationInput,
) -> Result<ChatCompletionRequest<'a>, PlanGenerationError> {
    let input_json = serde_json::to_string(input)
        .map_err(|e| PlanGenerationError::Upstream(format!("failed to encode input: {}", e)))?;

    Ok(ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(format!(
                    "Crie um plano completo com base nestes dados: {}",
                    input_json
                )),
            },
        ],
        response_format: ResponseFormat { kind: "json_object" },
        temperature: TEMPERATURE,
    })
}

/// Turns the first choice's content into a validated plan
fn parse_completion(content: Option<&str>) -> Result<ActivityPlan, PlanGenerationError> {
    let content = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(PlanGenerationError::EmptyResponse)?;

    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| PlanGenerationError::InvalidJson(e.to_string()))?;

    ActivityPlan::from_json(value).map_err(PlanGenerationError::SchemaMismatch)
}

/// Plan generator backed by an OpenAI-compatible API
pub struct OpenAiPlanGenerator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiPlanGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, PlanGenerationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlanGenerationError::Upstream(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl PlanGenerator for OpenAiPlanGenerator {
    async fn generate(&self, input: &PlanGenerationInput) -> Result<ActivityPlan, PlanGenerationError> {
        let request = build_request(&self.config.model, input)?;

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PlanGenerationError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PlanGenerationError::Upstream(format!(
                "provider answered {}",
                response.status()
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PlanGenerationError::Upstream(format!("unreadable response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        parse_completion(content.as_deref())
    }
}
