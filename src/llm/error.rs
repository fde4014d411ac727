//! Classification of failures from the generative model endpoint.

use std::fmt;
use std::time::Duration;

/// Broad category of a model call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Could not reach the service (DNS, connect, timeout).
    Network,
    /// 429 from upstream.
    RateLimited,
    /// 401/403: the API key was rejected.
    Unauthorized,
    /// Other 4xx.
    ClientError,
    /// 5xx.
    ServerError,
    /// The service answered but the envelope could not be read.
    Parse,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network error",
            Self::RateLimited => "rate limited",
            Self::Unauthorized => "unauthorized",
            Self::ClientError => "client error",
            Self::ServerError => "server error",
            Self::Parse => "parse error",
        };
        f.write_str(s)
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        401 | 403 => LlmErrorKind::Unauthorized,
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// A failed model call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}{}: {message}", status_suffix(.status))]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status: Option<u16>,
    pub message: String,
    /// Server-provided `Retry-After`. Reported to the user; never acted on locally.
    pub retry_after: Option<Duration>,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl LlmError {
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            status: None,
            message,
            retry_after: None,
        }
    }

    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::Parse,
            status: None,
            message,
            retry_after: None,
        }
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: classify_http_status(status),
            status: Some(status),
            message,
            retry_after,
        }
    }

    /// A next step for the user, for the failures they can act on.
    pub fn hint(&self) -> Option<String> {
        match self.kind {
            LlmErrorKind::Unauthorized => {
                Some("The API key was rejected. Run `cubit-connect set-key <KEY>`.".to_string())
            }
            LlmErrorKind::RateLimited => Some(match self.retry_after {
                Some(wait) => format!("Rate limited. Retry in {}s.", wait.as_secs()),
                None => "Rate limited. Wait a minute and retry.".to_string(),
            }),
            LlmErrorKind::Network => Some("Could not reach the model service.".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_http_status() {
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(401), LlmErrorKind::Unauthorized);
        assert_eq!(classify_http_status(403), LlmErrorKind::Unauthorized);
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
    }

    #[test]
    fn test_display() {
        let err = LlmError::from_status(429, "slow down".to_string(), None);
        assert_eq!(err.to_string(), "rate limited (429): slow down");

        let err = LlmError::network_error("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn test_hint() {
        let err = LlmError::from_status(429, String::new(), Some(Duration::from_secs(12)));
        assert_eq!(err.hint().as_deref(), Some("Rate limited. Retry in 12s."));

        let err = LlmError::from_status(429, String::new(), None);
        assert_eq!(
            err.hint().as_deref(),
            Some("Rate limited. Wait a minute and retry.")
        );

        let err = LlmError::from_status(403, String::new(), None);
        assert!(err.hint().unwrap().contains("set-key"));

        assert!(LlmError::from_status(500, String::new(), None).hint().is_none());
        assert!(LlmError::parse_error("bad".to_string()).hint().is_none());
    }
}
