//! LLM client for OpenAI-compatible chat-completions endpoints.
//!
//! Epistemic foundation:
//! - K_i: OpenAI API schema is the de facto standard
//! - K_i: Hosted and on-prem servers (vLLM, Ollama) both speak it
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//! - I^B: Network availability unknowable → retry with backoff

use crate::client::RateLimiter;
use crate::content::ContentGenerator;
use crate::models::{LessonError, LlmApiError, LlmConfig, ModelSpec, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// System prompt framing every lesson request.
pub const TUTOR_SYSTEM_PROMPT: &str = "You are an experienced chess coach writing \
    clear, accurate lesson material. Refer to moves exactly as given and never \
    invent variations that are not in the position.";

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Model used (may differ from requested)
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub cost_usd: f64,
    pub duration: Duration,
}

/// Client for one OpenAI-compatible endpoint and model.
///
/// Features:
/// - Adaptive rate limiting from response headers and 429s
/// - Retry with exponential backoff
/// - Token and cost tracking
pub struct LLMClient {
    client: reqwest::Client,
    /// API key (None for local endpoints without auth)
    api_key: Option<String>,
    base_url: String,
    model: ModelSpec,
    timeout: Duration,
    max_retries: u32,
    rate_limiter: Arc<RateLimiter>,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
    total_cost_micros: AtomicU64, // Store as microdollars for atomic ops
}

impl LLMClient {
    /// Create a client from the `[llm]` config section.
    ///
    /// `api_key` is `None` for unauthenticated local endpoints.
    pub fn new(
        config: &LlmConfig,
        api_key: Option<String>,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LessonError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            max_retries: config.max_retries.max(1),
            rate_limiter: rate_limiter.unwrap_or_else(|| Arc::new(RateLimiter::new())),
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
            total_cost_micros: AtomicU64::new(0),
        })
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| LessonError::InvalidInput("API key is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.model.input_price_per_1m;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.model.output_price_per_1m;
        input_cost + output_cost
    }

    /// Complete a chat request.
    ///
    /// B_i(API available) → Result
    /// B_i(valid response) → Result
    /// I^B(rate limits) → adaptive backoff
    pub async fn complete(&self, messages: Vec<Message>) -> Result<CompletionResponse> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.model.id,
            messages,
            max_tokens: self.model.max_tokens,
            temperature: self.model.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let headers = self.headers()?;
        let mut last_error: Option<LessonError> = None;

        for attempt in 0..self.max_retries {
            self.rate_limiter.wait_if_needed(&self.model.id).await;

            let response = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        LessonError::Timeout(self.timeout)
                    } else {
                        LessonError::Network(e)
                    });
                    if attempt + 1 < self.max_retries {
                        let backoff = Duration::from_secs(2u64.pow(attempt));
                        debug!(
                            attempt = attempt,
                            backoff_secs = backoff.as_secs(),
                            "Retrying after network error"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status().as_u16();
            let response_headers = response.headers().clone();
            self.rate_limiter
                .record_request(&self.model.id, status, &response_headers);

            if status == 429 {
                let retry_after = response_headers
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(1.0);
                last_error = Some(LessonError::RateLimited {
                    retry_after_secs: retry_after,
                });
                if attempt + 1 < self.max_retries {
                    debug!(
                        attempt = attempt,
                        retry_after_secs = retry_after,
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                }
                continue;
            }

            if !response.status().is_success() {
                let error_body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                    .map(|e| e.error.message)
                    .unwrap_or(error_body);
                let error = match status {
                    401 => LlmApiError::AuthenticationFailed,
                    404 => LlmApiError::ModelNotFound(self.model.id.clone()),
                    _ => LlmApiError::ApiError { status, message },
                };
                last_error = Some(LessonError::LlmApi(error));

                // Auth and unknown-model errors will not fix themselves
                if status == 401 || status == 404 {
                    break;
                }
                if attempt + 1 < self.max_retries {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
                continue;
            }

            let body: ChatCompletionResponse = response.json().await.map_err(|e| {
                LessonError::LlmApi(LlmApiError::InvalidResponse(format!(
                    "Failed to parse response: {e}"
                )))
            })?;

            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| {
                    LessonError::LlmApi(LlmApiError::InvalidResponse(
                        "No content in response".to_string(),
                    ))
                })?;

            let usage = body.usage.unwrap_or_default();
            let cost = self.calculate_cost(usage.prompt_tokens, usage.completion_tokens);
            self.total_input_tokens
                .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
            self.total_output_tokens
                .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);
            self.total_cost_micros
                .fetch_add((cost * 1_000_000.0) as u64, Ordering::Relaxed);

            return Ok(CompletionResponse {
                content,
                model: body.model.unwrap_or_else(|| self.model.id.clone()),
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cost_usd: cost,
                duration: start.elapsed(),
            });
        }

        Err(last_error.unwrap_or_else(|| {
            LessonError::LlmApi(LlmApiError::MaxRetriesExceeded {
                attempts: self.max_retries,
                last_error: "Unknown error".to_string(),
            })
        }))
    }

    /// Complete with system and user prompts.
    pub async fn complete_with_system(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<CompletionResponse> {
        let messages = vec![Message::system(system_prompt), Message::user(user_prompt)];
        self.complete(messages).await
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// (input, output) tokens so far.
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl ContentGenerator for LLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.complete_with_system(TUTOR_SYSTEM_PROMPT, prompt).await?;
        debug!(
            model = %response.model,
            output_tokens = response.output_tokens,
            duration_ms = response.duration.as_millis() as u64,
            "Content generated"
        );
        Ok(response.content)
    }
}
