use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid TaskId: {0}")]
    InvalidTaskId(String),

    #[error("Invalid UserId: {0}")]
    InvalidUserId(String),

    #[error("Invalid task title: {0}")]
    InvalidTitle(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
