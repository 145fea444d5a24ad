use thiserror::Error;

/// Main error type for the swap client
#[derive(Error, Debug)]
pub enum SwapError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors (transport/HTTP failure, retryable)
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Semantic rejections from the exchange (not retryable without new input)
    #[error("Quote rejected: {0}")]
    Quote(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // Fixed-rate quote id expired; caller must re-estimate before retrying
    #[error("Stale rate quote: {0}")]
    StaleQuote(String),

    // Order creation rejected; one attempt per user action, never auto-retried
    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    // Transport failed mid-creation: the order may or may not exist upstream
    #[error("Order creation outcome unknown: {0}")]
    OrderOutcomeUnknown(String),

    #[error("Unsupported pair: {from} -> {to}")]
    UnsupportedPair { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SwapError
pub type Result<T> = std::result::Result<T, SwapError>;

impl SwapError {
    /// True for transport-level failures that may succeed on a later attempt
    /// with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::Http(_) | SwapError::RateLimited(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_rejections_are_not_retryable() {
        assert!(!SwapError::Quote("amount too small".into()).is_retryable());
        assert!(!SwapError::Validation("bad address".into()).is_retryable());
        assert!(!SwapError::StaleQuote("rate expired".into()).is_retryable());
        assert!(!SwapError::OrderCreation("rejected".into()).is_retryable());
        assert!(SwapError::RateLimited("slow down".into()).is_retryable());
    }
}
