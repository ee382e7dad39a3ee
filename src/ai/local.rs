use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SecondaryProviderConfig;
use crate::error::{AppError, Result};

use super::AnalysisProvider;

const PROVIDER_NAME: &str = "secondary";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Local Ollama-style `/api/generate` endpoint, used when the remote provider
/// is unavailable.
pub struct LocalProvider {
    client: Client,
    url: String,
    model: String,
}

impl LocalProvider {
    pub fn new(config: &SecondaryProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }

    fn malformed(message: impl Into<String>) -> AppError {
        AppError::MalformedResponse {
            provider: PROVIDER_NAME.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl AnalysisProvider for LocalProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn analyze(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderStatus {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.text().await?;
        let generated: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| Self::malformed(e.to_string()))?;

        generated
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Self::malformed("empty response field"))
    }
}
