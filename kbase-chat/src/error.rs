//! Error types for answer generation and chat sessions

use kbase_retriever::RetrieverError;
use std::time::Duration;

/// Failure of a single call to the text-generation service.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator is misconfigured (e.g. no API key); retrying won't help
    #[error("Generation service is misconfigured: {0}")]
    Config(String),

    /// No answer arrived within the allowed time
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The request never got a response (connection refused, DNS, TLS, ...)
    #[error("Could not reach the generation service: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("Generation service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered 2xx but the body wasn't a usable completion
    #[error("Malformed response from generation service: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether the same request may succeed if sent again later.
    ///
    /// Rejected credentials and malformed requests (400, 401, 403) will fail
    /// the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Api { status, .. } => !matches!(*status, 400 | 401 | 403),
            Self::Timeout(_) | Self::Transport { .. } | Self::MalformedResponse(_) => true,
        }
    }
}

/// Error type for a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Invalid service configuration, detected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// The query was empty or whitespace only
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrieverError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ChatError {
    /// Whether the user can simply ask again; the session is unchanged either way.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GenerationError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(
            GenerationError::Api {
                status: 429,
                body: "rate limited".into()
            }
            .is_retryable()
        );
        assert!(GenerationError::MalformedResponse("no choices".into()).is_retryable());
        assert!(!GenerationError::Config("missing key".into()).is_retryable());
        assert!(
            GenerationError::Api {
                status: 503,
                body: "overloaded".into()
            }
            .is_retryable()
        );

        assert!(ChatError::from(GenerationError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(!ChatError::EmptyQuery.is_retryable());
        assert!(!ChatError::from(RetrieverError::config("k must be at least 1")).is_retryable());
    }

    #[test]
    fn test_rejected_credentials_are_not_retryable() {
        for status in [400, 401, 403] {
            let err = GenerationError::Api {
                status,
                body: "invalid api key".into(),
            };
            assert!(!err.is_retryable(), "status {status}");
            assert!(!ChatError::from(err).is_retryable());
        }
    }
}
