//! Error types for comparison data operations

use thiserror::Error;

/// Errors raised by market-data clients and configuration
#[derive(Debug, Error)]
pub enum StockError {
    /// Backend answered with a failure status
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Unknown or malformed ticker
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Range selector outside the supported horizons
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StockError {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status >= 500,
            Self::RateLimitExceeded { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for comparison operations
pub type Result<T> = std::result::Result<T, StockError>;

impl From<url::ParseError> for StockError {
    fn from(err: url::ParseError) -> Self {
        StockError::ConfigError(format!("invalid URL: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::InvalidSymbol("INVALID".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: INVALID");

        let err = StockError::DataUnavailable {
            symbol: "NDA-FI.HE".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data not available for NDA-FI.HE: No data found"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let server = StockError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        };
        let client = StockError::ApiError {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(
            StockError::RateLimitExceeded {
                provider: "backend".to_string()
            }
            .is_retryable()
        );
        assert!(!StockError::InvalidSymbol("X".to_string()).is_retryable());
    }

    #[test]
    fn test_url_error_conversion() {
        let err: StockError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, StockError::ConfigError(msg) if msg.starts_with("invalid URL")));
    }
}
