//! Error types for Latercast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LatercastError>;

#[derive(Error, Debug)]
pub enum LatercastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media store error: {0}")]
    Media(#[from] MediaError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LatercastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LatercastError::InvalidInput(_) => 3,
            LatercastError::Platform(PlatformError::Authentication(_)) => 2,
            LatercastError::Credential(_) => 2,
            LatercastError::Platform(_) => 1,
            LatercastError::Config(_) => 1,
            LatercastError::Store(_) => 1,
            LatercastError::Media(_) => 1,
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
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Media object not found: {0}")]
    NotFound(String),

    #[error("Invalid media key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Errors raised at the publishing-platform boundary.
///
/// The variant carries the retry classification: `Quota`, `Network`, and
/// `Authentication` failures are worth another attempt on a later tick,
/// while `Rejected` and `Validation` mean the platform (or local checks)
/// will never accept this content as-is.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl PlatformError {
    /// Whether a later attempt could plausibly succeed without the content
    /// changing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Authentication(_) | PlatformError::Quota(_) | PlatformError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = LatercastError::InvalidInput("Empty title".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = LatercastError::Platform(PlatformError::Authentication("401".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        let network = LatercastError::Platform(PlatformError::Network("timeout".to_string()));
        assert_eq!(network.exit_code(), 1);

        let rejected = LatercastError::Platform(PlatformError::Rejected("bad metadata".to_string()));
        assert_eq!(rejected.exit_code(), 1);

        let quota = LatercastError::Platform(PlatformError::Quota("daily limit".to_string()));
        assert_eq!(quota.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = LatercastError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PlatformError::Network("reset".to_string()).is_retryable());
        assert!(PlatformError::Quota("quotaExceeded".to_string()).is_retryable());
        assert!(PlatformError::Authentication("expired".to_string()).is_retryable());
        assert!(!PlatformError::Rejected("invalid category".to_string()).is_retryable());
        assert!(!PlatformError::Validation("empty title".to_string()).is_retryable());
    }

    #[test]
    fn test_error_message_formatting() {
        let error = LatercastError::Platform(PlatformError::Quota("daily upload limit".to_string()));
        assert_eq!(
            format!("{}", error),
            "Platform error: Quota exceeded: daily upload limit"
        );

        let error = LatercastError::InvalidInput("title must not be empty".to_string());
        assert_eq!(format!("{}", error), "Invalid input: title must not be empty");
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Rejected("test".to_string());
        let error: LatercastError = platform_error.into();

        assert!(matches!(error, LatercastError::Platform(_)));
    }

    #[test]
    fn test_error_conversion_from_store_error() {
        let store_error = StoreError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let error: LatercastError = store_error.into();

        assert!(matches!(error, LatercastError::Store(_)));
    }
}
