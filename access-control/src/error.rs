//! Error types for access control

use thiserror::Error;

/// Result type for gated operations
pub type Result<T> = std::result::Result<T, Error>;

/// Access-control errors
#[derive(Error, Debug)]
pub enum Error {
    /// The actor's scope does not cover the resource
    #[error("Forbidden: {required_scope} required on {resource}")]
    Forbidden {
        /// Resource the actor tried to reach (kind and id only)
        resource: String,
        /// Scope that would have allowed it
        required_scope: &'static str,
    },

    /// Error from the guarded operation or its lookups
    #[error(transparent)]
    Enrollment(#[from] enrollment_core::Error),
}

impl Error {
    /// Stable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::Forbidden { .. } => "forbidden",
            Error::Enrollment(e) => e.code(),
        }
    }
}
