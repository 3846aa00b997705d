use std::time::Duration;

use async_trait::async_trait;
use pagecraft_core::GenerationContext;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::types::*;
use crate::error::{OrchestratorError, Result};
use crate::generator::ContentGenerator;
use crate::prompts::SectionPrompts;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";
const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per-request timeout
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            temperature: Some(0.7),
            max_tokens: Some(4096),
            timeout: Duration::from_secs(120),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("OpenRouter API error{}: {message}", status_suffix(.status_code))]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code.map(|c| format!(" ({c})")).unwrap_or_default()
}

/// [`ContentGenerator`] that asks an OpenRouter chat model for each section.
#[derive(Clone)]
pub struct OpenRouterGenerator {
    client: Client,
    settings: GeneratorSettings,
}

/// How long to wait before retrying `err`, or `None` when it is not retryable.
///
/// Server-supplied `Retry-After` seconds are honored up to the backoff ceiling.
fn retry_delay_ms(err: &ApiError, backoff_ms: u64) -> Option<u64> {
    match err {
        ApiError::RateLimited { retry_after } => Some(
            retry_after
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(backoff_ms)
                .min(MAX_BACKOFF_MS),
        ),
        ApiError::Api {
            status_code: Some(code),
            ..
        } if *code >= 500 => Some(backoff_ms),
        _ => None,
    }
}

impl OpenRouterGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "OpenRouter API key is not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| OrchestratorError::InvalidInput(format!("HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    async fn with_retry<T, F, Fut>(&self, operation: F, operation_name: &str) -> std::result::Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ApiError>>,
    {
        let max_retries = self.settings.max_retries;
        let mut retries = 0;
        let mut backoff_ms = self.settings.initial_backoff.as_millis() as u64;

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            let Some(wait_ms) = retry_delay_ms(&err, backoff_ms) else {
                if retries > 0 {
                    info!("{} failed after {} retries: {}", operation_name, retries, err);
                }
                return Err(err);
            };

            if retries >= max_retries {
                error!("{} failed after {} retries: {}", operation_name, retries, err);
                return Err(err);
            }

            warn!(
                "{} failed ({}), retrying in {}ms (attempt {}/{})",
                operation_name,
                err,
                wait_ms,
                retries + 1,
                max_retries
            );

            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            retries += 1;
            backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
        }
    }

    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> std::result::Result<String, ApiError> {
        self.with_retry(
            || async { self.chat_completion_inner(messages.clone()).await },
            "chat_completion",
        )
        .await
    }

    async fn chat_completion_inner(
        &self,
        messages: Vec<ChatMessage>,
    ) -> std::result::Result<String, ApiError> {
        debug!(
            "Creating chat completion with {} messages, model {}",
            messages.len(),
            self.settings.model
        );

        let request = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.settings.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                warn!("Rate limited by OpenRouter");
                return Err(ApiError::RateLimited { retry_after });
            }

            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OpenRouterError>(&error_text) {
                Ok(error_resp) => {
                    error!(
                        "OpenRouter API error: {} (type: {:?})",
                        error_resp.error.message, error_resp.error.error_type
                    );
                    error_resp.error.message
                }
                Err(_) => error_text,
            };
            return Err(ApiError::Api {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ApiError::Api {
                message: "No completion returned".to_string(),
                status_code: None,
            })
    }

    async fn complete_section(&self, section_name: &str, prompt: String) -> Result<String> {
        let messages = vec![
            ChatMessage::system(SectionPrompts::system()),
            ChatMessage::user(prompt),
        ];
        let raw = self
            .chat_completion(messages)
            .await
            .map_err(|e| OrchestratorError::generation(section_name, e))?;

        let html = extract_html(&raw);
        if html.is_empty() {
            return Err(OrchestratorError::generation(
                section_name,
                "model returned an empty completion",
            ));
        }
        Ok(html)
    }
}

/// Strip a surrounding Markdown code fence, if the model added one.
pub fn extract_html(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (`html`, `HTML`, ...) on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[async_trait]
impl ContentGenerator for OpenRouterGenerator {
    async fn generate(&self, section_name: &str, context: &GenerationContext) -> Result<String> {
        self.complete_section(section_name, SectionPrompts::generate(section_name, context))
            .await
    }

    async fn regenerate(
        &self,
        section_name: &str,
        context: &GenerationContext,
        feedback: &str,
        previous_content: &str,
    ) -> Result<String> {
        self.complete_section(
            section_name,
            SectionPrompts::regenerate(section_name, context, feedback, previous_content),
        )
        .await
    }
}
