//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::LlmError;
use super::{GenerativeModel, ModelResponse};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API client. One HTTP request per call, no retries.
pub struct GeminiClient {
    client: Client,
    api_base: String,
}

impl GeminiClient {
    /// Create a client against the public Gemini endpoint.
    pub fn new() -> Self {
        Self::with_api_base(GEMINI_API_BASE)
    }

    /// Create a client against a custom base URL (proxies, test servers).
    pub fn with_api_base(api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client with a request timeout.
    pub fn with_timeout(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Pass a success body through; turn anything else into a classified error.
    fn check_status(
        status: StatusCode,
        headers: &HeaderMap,
        body: String,
    ) -> Result<String, LlmError> {
        if status.is_success() {
            return Ok(body);
        }
        let retry_after = Self::parse_retry_after(headers);
        Err(LlmError::from_status(status.as_u16(), body, retry_after))
    }

    async fn execute_request(
        &self,
        credential: &str,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<ModelResponse, LlmError> {
        let response = match self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", credential)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(LlmError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let body = Self::check_status(status, &headers, body)?;

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        Ok(parsed.into_model_response())
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(
        &self,
        credential: &str,
        model: &str,
        prompt: &str,
    ) -> anyhow::Result<ModelResponse> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        tracing::debug!(
            "Sending request to Gemini: model={}, prompt_chars={}",
            model,
            prompt.len()
        );

        self.execute_request(credential, model, &request)
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                anyhow::Error::new(e)
            })
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_model_response(self) -> ModelResponse {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        // Text parts of the first candidate, concatenated.
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());

        ModelResponse { text, block_reason }
    }
}
