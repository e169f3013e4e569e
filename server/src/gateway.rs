use crate::config::ModelSettings;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const TEMPERATURE: f32 = 0.35;
const MAX_COMPLETION_TOKENS: usize = 600;

/// Text generated for one visitor message.
#[derive(Debug, Clone)]
pub struct ModelAnswer {
    pub text: String,
    pub model: String,
}

/// Anything that can turn a system prompt and a visitor message into a
/// reply. The HTTP layer only sees this trait.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<ModelAnswer, GatewayError>;
}

/// OpenAI-compatible chat-completions client with an optional second
/// model tried once when the first fails.
#[derive(Clone)]
pub struct ModelGateway {
    http: reqwest::Client,
    endpoint: String,
    api_key: Arc<String>,
    model: String,
    fallback_model: Option<String>,
}

impl ModelGateway {
    pub fn new(settings: &ModelSettings) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(BackendError::from)?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.api_base),
            api_key: Arc::new(settings.api_key.clone()),
            model: settings.model.clone(),
            fallback_model: settings.fallback_model.clone(),
        })
    }

    async fn ask_model(
        &self,
        model: &str,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, BackendError> {
        let payload = ChatRequest::new(model, system_prompt, user_text);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiFailure(status, detail));
        }

        let body: ChatResponse = response.json().await?;
        let answer = body
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content.map(|c| c.trim().to_string()))
            .filter(|value| !value.is_empty())
            .ok_or(BackendError::EmptyAnswer)?;

        info!(
            target: "gateway",
            model,
            chars = user_text.len(),
            msg = "completion generated"
        );
        Ok(answer)
    }
}

#[async_trait]
impl Completion for ModelGateway {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<ModelAnswer, GatewayError> {
        let mut failures = Vec::new();

        match self.ask_model(&self.model, system_prompt, user_text).await {
            Ok(text) => {
                return Ok(ModelAnswer {
                    text,
                    model: self.model.clone(),
                });
            }
            Err(error) => {
                warn!(
                    target: "gateway",
                    model = %self.model,
                    error = %error,
                    fallback = self.fallback_model.as_deref().unwrap_or("none"),
                    "primary model failed"
                );
                failures.push(AttemptFailure::new(&self.model, error));
            }
        }

        if let Some(fallback) = &self.fallback_model {
            match self.ask_model(fallback, system_prompt, user_text).await {
                Ok(text) => {
                    return Ok(ModelAnswer {
                        text,
                        model: fallback.clone(),
                    });
                }
                Err(error) => {
                    warn!(
                        target: "gateway",
                        model = %fallback,
                        error = %error,
                        "fallback model failed"
                    );
                    failures.push(AttemptFailure::new(fallback, error));
                }
            }
        }

        Err(GatewayError::all_attempts_failed(failures))
    }
}

#[derive(Debug)]
struct AttemptFailure {
    model: String,
    error: BackendError,
}

impl AttemptFailure {
    fn new(model: &str, error: BackendError) -> Self {
        Self {
            model: model.to_string(),
            error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("api failure ({0}): {1}")]
    ApiFailure(StatusCode, String),
    #[error("model response did not contain any answer")]
    EmptyAnswer,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP client setup failed: {0}")]
    Setup(#[from] BackendError),
    #[error("All model attempts failed: {0}")]
    AllAttemptsFailed(String),
}

impl GatewayError {
    fn all_attempts_failed(failures: Vec<AttemptFailure>) -> Self {
        let summary = failures
            .into_iter()
            .map(|failure| format!("{} failed: {}", failure.model, failure.error))
            .collect::<Vec<_>>()
            .join("; ");
        GatewayError::AllAttemptsFailed(summary)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, system_prompt: &'a str, user_text: &'a str) -> Self {
        Self {
            model,
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
