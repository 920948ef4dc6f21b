//! Error types for lumen.

use thiserror::Error;

/// Result type alias using lumen's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lumen operations.
///
/// Field-level reconciliation rejections are never errors; they surface as
/// `accepted == false` on [`crate::reconcile::Reconciled`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Media record not found
    #[error("Record not found: {0}")]
    RecordNotFound(uuid::Uuid),

    /// Update attempted on a record that was never persisted
    #[error("Missing identity: {0}")]
    MissingIdentity(String),

    /// Keyword indexing attempted without loaded details
    #[error("Details not loaded: {0}")]
    DetailsNotLoaded(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Precondition violations abort the cycle and must not be retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::MissingIdentity(_) | Error::DetailsNotLoaded(_) | Error::InvalidInput(_)
        )
    }

    /// Collaborator failures where re-running the whole cycle is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("keyword".to_string());
        assert_eq!(err.to_string(), "Not found: keyword");
    }

    #[test]
    fn test_error_display_record_not_found() {
        let id = Uuid::nil();
        let err = Error::RecordNotFound(id);
        assert_eq!(err.to_string(), format!("Record not found: {}", id));
    }

    #[test]
    fn test_error_display_details_not_loaded() {
        let err = Error::DetailsNotLoaded("can't index keywords".to_string());
        assert_eq!(err.to_string(), "Details not loaded: can't index keywords");
    }

    #[test]
    fn test_precondition_classification() {
        assert!(Error::MissingIdentity("x".into()).is_precondition());
        assert!(Error::DetailsNotLoaded("x".into()).is_precondition());
        assert!(!Error::Internal("x".into()).is_precondition());
        assert!(!Error::MissingIdentity("x".into()).is_retryable());
    }

    #[test]
    fn test_database_error_is_retryable() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
