//! Direct Claude invocation through Bedrock `InvokeModel`.

use crate::config::toml_config::ModelConfig;
use crate::domain::model::{ModelInfo, ModelResponse, TokenUsage};
use crate::domain::ports::ModelInvoker;
use crate::utils::error::{AnalysisError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_bedrockruntime::primitives::Blob;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Debug, Serialize)]
pub struct ClaudeRequest<'a> {
    pub anthropic_version: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ClaudeMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl<'a> ClaudeRequest<'a> {
    pub fn new(prompt: &'a str, system: Option<&'a str>, config: &ModelConfig) -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system,
            messages: vec![ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

pub fn parse_response(body: &[u8], model_id: &str) -> Result<ModelResponse> {
    let response: ClaudeResponse = serde_json::from_slice(body)?;
    let text = response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| AnalysisError::model("EmptyResponse", "Response contained no text content"))?;

    Ok(ModelResponse {
        text,
        usage: response.usage,
        stop_reason: response.stop_reason,
        model_id: model_id.to_string(),
    })
}

/// Human readable model name for report metadata.
pub fn model_display_name(model_id: &str) -> &'static str {
    let id = model_id.to_lowercase();
    if id.contains("sonnet") {
        "Claude 3 Sonnet"
    } else if id.contains("3-5-haiku") || id.contains("3.5-haiku") {
        "Claude 3.5 Haiku"
    } else if id.contains("haiku") {
        "Claude 3 Haiku"
    } else {
        "Claude"
    }
}

pub fn model_info(model_id: &str, region: &str) -> ModelInfo {
    ModelInfo {
        model_id: model_id.to_string(),
        model_name: model_display_name(model_id).to_string(),
        provider: "Anthropic".to_string(),
        region: region.to_string(),
    }
}

/// Runs `operation` up to `max_attempts` times, sleeping `base_delay * 2^attempt`
/// after each throttling or availability error.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, base_delay: Duration, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(e) if e.is_retryable_model_error() && attempt + 1 < max_attempts => {
                let wait = base_delay * 2u32.pow(attempt);
                tracing::warn!("Retrying after {:?} due to {}", wait, e);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

pub struct BedrockClient {
    client: aws_sdk_bedrockruntime::Client,
    config: ModelConfig,
    region: String,
}

impl BedrockClient {
    pub fn new(client: aws_sdk_bedrockruntime::Client, config: ModelConfig, region: impl Into<String>) -> Self {
        let region = region.into();
        tracing::info!("Bedrock client initialized with model: {}", config.model_id);
        Self {
            client,
            config,
            region,
        }
    }

    async fn invoke_once(&self, prompt: &str, system_prompt: Option<&str>) -> Result<ModelResponse> {
        let request = ClaudeRequest::new(prompt, system_prompt, &self.config);
        let body = serde_json::to_vec(&request)?;

        tracing::info!("Invoking Claude model: {}", self.config.model_id);
        tracing::debug!("Prompt length: {} characters", prompt.len());

        let output = self
            .client
            .invoke_model()
            .model_id(&self.config.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                let code = e.code().unwrap_or("Unknown").to_string();
                let message = e
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&e).to_string());
                tracing::error!("Bedrock API error ({}): {}", code, message);
                AnalysisError::model(code, message)
            })?;

        let response = parse_response(output.body().as_ref(), &self.config.model_id)?;
        tracing::info!("Claude response received: {} characters", response.text.len());
        tracing::debug!("Stop reason: {:?}", response.stop_reason);
        Ok(response)
    }
}

#[async_trait]
impl ModelInvoker for BedrockClient {
    async fn invoke(&self, prompt: &str, system_prompt: Option<&str>) -> Result<ModelResponse> {
        with_retry(
            self.config.max_retries,
            Duration::from_millis(self.config.retry_base_delay_ms),
            || self.invoke_once(prompt, system_prompt),
        )
        .await
    }

    fn model_info(&self) -> ModelInfo {
        model_info(&self.config.model_id, &self.region)
    }
}
