//! Error types for tactica.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (invalid input, nothing found)
//! - I^B materialized: Infrastructure failures (engine, network, timeout, disk)
//! - K_i violated: Internal invariant violations (bugs)

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for tactica.
#[derive(Debug, Error)]
pub enum LessonError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid position '{fen}': {reason}")]
    InvalidPosition { fen: String, reason: String },

    #[error("Unknown tag: '{0}'")]
    UnknownTag(String),

    #[error("Unknown difficulty tier: '{0}'")]
    UnknownTier(String),

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("No examples found for tag '{tag}' at tier '{tier}'")]
    NoExamplesFound { tag: String, tier: String },

    #[error("Practice item not found: {0}")]
    ItemNotFound(String),

    #[error("Lesson validation failed: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("LLM API error: {0}")]
    LlmApi(#[from] LlmApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine unavailable at {path}: {source}")]
    EngineUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Content endpoint specific errors.
#[derive(Debug, Error)]
pub enum LlmApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited by endpoint: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<f64>,
    },

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl LessonError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid-position error.
    pub fn invalid_position(fen: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPosition {
            fen: fen.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the InvalidInput family (never retried).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidPosition { .. }
                | Self::UnknownTag(_)
                | Self::UnknownTier(_)
                | Self::InvalidWeights(_)
        )
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::RateLimited { .. }
                | Self::Network(_)
                | Self::LlmApi(LlmApiError::RateLimited { .. })
        )
    }

    /// Get retry delay hint in seconds, if applicable.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::LlmApi(LlmApiError::RateLimited {
                retry_after_secs, ..
            }) => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for tactica.
pub type Result<T> = std::result::Result<T, LessonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(LessonError::UnknownTag("pinn".into()).is_invalid_input());
        assert!(LessonError::invalid_position("bad", "too few fields").is_invalid_input());
        assert!(!LessonError::Engine("crashed".into()).is_invalid_input());

        assert!(LessonError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!LessonError::Validation("no steps".into()).is_retryable());

        let err = LessonError::LlmApi(LlmApiError::RateLimited {
            message: "slow down".into(),
            retry_after_secs: Some(2.5),
        });
        assert_eq!(err.retry_after(), Some(2.5));
    }
}
