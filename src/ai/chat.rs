use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::PrimaryProviderConfig;
use crate::error::{AppError, Result};

use super::AnalysisProvider;

const PROVIDER_NAME: &str = "primary";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Remote OpenAI-compatible chat completion endpoint. Requests are single-turn
/// and deterministic (temperature 0).
pub struct ChatCompletionProvider {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionProvider {
    pub fn new(config: &PrimaryProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl AnalysisProvider for ChatCompletionProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn analyze(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::MissingApiKey {
            provider: PROVIDER_NAME.to_string(),
        })?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, error_text));
        }

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::MalformedResponse {
                    provider: PROVIDER_NAME.to_string(),
                    message: e.to_string(),
                })?;

        chat_response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::MalformedResponse {
                provider: PROVIDER_NAME.to_string(),
                message: "no completion text returned".to_string(),
            })
    }
}

fn classify_failure(status: StatusCode, message: String) -> AppError {
    let lowered = message.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
        || lowered.contains("quota")
    {
        AppError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            message,
        }
    } else {
        AppError::ProviderStatus {
            provider: PROVIDER_NAME.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}
