//! Generative model client module.
//!
//! This module provides a trait-based abstraction over the text generation
//! service, with Google Gemini as the production implementation, plus the
//! rate gate every outbound call goes through.

mod error;
mod gemini;
mod rate_gate;

pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use gemini::{GeminiClient, GEMINI_API_BASE};
pub use rate_gate::{RateGate, MIN_CALL_INTERVAL};

use async_trait::async_trait;

/// Result of a single generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    /// Generated text, if the model produced any.
    pub text: Option<String>,
    /// Set when the prompt was withheld by the provider's safety policy.
    pub block_reason: Option<String>,
}

impl ModelResponse {
    /// A plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            block_reason: None,
        }
    }

    /// A response blocked for the given reason.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            text: None,
            block_reason: Some(reason.into()),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.block_reason.is_some()
    }
}

/// Trait for generative model clients.
///
/// Implementations perform exactly one request per call: no retries, no
/// pacing. Pacing is the caller's job (see [`RateGate`]).
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate content for a single prompt.
    async fn generate_content(
        &self,
        credential: &str,
        model: &str,
        prompt: &str,
    ) -> anyhow::Result<ModelResponse>;
}
