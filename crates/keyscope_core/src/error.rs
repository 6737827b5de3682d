use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    ObjectNotFound(String),

    #[error("Query timed out")]
    Timeout,

    #[error("Query cancelled")]
    Cancelled,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DbError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    pub fn object_not_found(message: impl Into<String>) -> Self {
        Self::ObjectNotFound(message.into())
    }
}

/// Rejected user input, caught before anything is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} should be a number")]
    NotANumber { field: &'static str },

    #[error("{field} should be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{0}")]
    Invalid(String),
}
