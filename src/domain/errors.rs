use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Retryable failure of a collaborator (messenger 5xx, network, persistence timeout).
    #[error("Upstream unavailable: {0}")]
    UpstreamTransient(String),
    /// Non-retryable rejection by a collaborator (messenger 4xx, revoked bot token).
    #[error("Upstream rejected request: {0}")]
    UpstreamPermanent(String),
}

impl DomainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::UpstreamTransient(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE") || message.contains("unique") {
                    DomainError::Conflict(format!("Duplicate record: {}", message))
                } else if message.contains("database is locked") {
                    DomainError::UpstreamTransient(format!("Database busy: {}", message))
                } else {
                    DomainError::Internal(format!("Database error: {}", message))
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DomainError::UpstreamTransient(format!("Database unavailable: {}", err))
            }
            other => DomainError::Internal(format!("Database error: {}", other)),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
