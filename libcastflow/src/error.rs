//! Error types for Cast Flow

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CastFlowError>;

#[derive(Error, Debug)]
pub enum CastFlowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CastFlowError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CastFlowError::InvalidInput(_) => 3,
            CastFlowError::Publish(PublishError::Authentication(_)) => 2,
            CastFlowError::Publish(_) => 1,
            CastFlowError::Config(_) => 1,
            CastFlowError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Reasons a single post could not be published
///
/// None of these abort a batch: the publisher records them on the post and
/// moves on to the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Signer lookup failed: {0}")]
    SignerLookup(String),

    #[error("No signer found for FID {0}")]
    MissingCredential(u64),

    #[error("Cast has no content")]
    EmptyContent,

    #[error("Cast has {count} images; at most {max} are allowed")]
    TooManyImages { count: usize, max: usize },

    #[error("Post could not be decoded: {0}")]
    Undecodable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = CastFlowError::InvalidInput("Unknown post".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = CastFlowError::Publish(PublishError::Authentication("bad key".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let posting = CastFlowError::Publish(PublishError::Posting("500".to_string()));
        assert_eq!(posting.exit_code(), 1);

        let config = CastFlowError::Config(ConfigError::MissingField("neynar.api_key".to_string()));
        assert_eq!(config.exit_code(), 1);

        let db = CastFlowError::Database(DbError::Corrupt("bad status".to_string()));
        assert_eq!(db.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = CastFlowError::Publish(PublishError::Posting("HTTP 400: invalid embed".to_string()));
        assert_eq!(
            error.to_string(),
            "Publish error: Posting failed: HTTP 400: invalid embed"
        );

        let config = CastFlowError::Config(ConfigError::MissingField("neynar.api_key".to_string()));
        assert_eq!(
            config.to_string(),
            "Configuration error: Missing required field: neynar.api_key"
        );
    }

    #[test]
    fn test_per_post_error_messages() {
        assert_eq!(
            PublishError::MissingCredential(1234).to_string(),
            "No signer found for FID 1234"
        );
        assert_eq!(
            PublishError::Timeout(Duration::from_secs(30)).to_string(),
            "Request timed out after 30s"
        );
        assert_eq!(PublishError::EmptyContent.to_string(), "Cast has no content");
        assert_eq!(
            PublishError::TooManyImages { count: 5, max: 4 }.to_string(),
            "Cast has 5 images; at most 4 are allowed"
        );
    }

    #[test]
    fn test_error_conversion_from_publish_error() {
        let error: CastFlowError = PublishError::Network("refused".to_string()).into();
        match error {
            CastFlowError::Publish(PublishError::Network(msg)) => assert_eq!(msg, "refused"),
            _ => panic!("Expected CastFlowError::Publish"),
        }
    }
}
