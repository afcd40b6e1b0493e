//! Error types for enrollment

use thiserror::Error;

/// Result type for enrollment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Enrollment errors
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (student, course, college, enrollment, ...)
        entity: &'static str,
        /// Id that was looked up
        id: String,
    },

    /// Uniqueness invariant violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not valid for the current entity state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Enrollment blocked by an unsatisfied prerequisite
    #[error("Prerequisites not met for course {course_id}")]
    PrerequisiteUnmet {
        /// Course the student asked to join
        course_id: String,
    },

    /// Directory or store backend could not be reached
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `NotFound` for an entity kind and id
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable code for this error kind, for mapping onto transport responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Conflict(_) => "conflict",
            Error::InvalidState(_) => "invalid_state",
            Error::PrerequisiteUnmet { .. } => "prerequisite_unmet",
            Error::Unavailable(_) => "unavailable",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    /// Whether the caller may safely retry the same request
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}
