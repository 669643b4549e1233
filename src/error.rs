//! Error types for the Minio operator

use thiserror::Error;

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid input that cannot succeed without a change
    #[error("validation error: {0}")]
    Validation(String),

    /// Optimistic-concurrency conflict: the object changed since it was read
    #[error("conflict: {0}")]
    Conflict(String),

    /// The dependent object is already controlled by a different owner
    #[error("{kind} {name} is already owned by another controller: {owner}")]
    AlreadyOwned {
        /// Kind of the dependent object
        kind: String,
        /// Name of the dependent object
        name: String,
        /// Name of the controller that currently owns it
        owner: String,
    },

    /// Malformed baseline template
    #[error("template error: {0}")]
    Template(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A store call did not finish before the reconcile deadline
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Several failures from the same reconcile
    #[error("[{}]", join_messages(.0))]
    Aggregate(Vec<Error>),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a conflict error with the given message
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a template error with the given message
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a deadline error naming the operation that ran out of time
    pub fn deadline_exceeded(operation: impl Into<String>) -> Self {
        Self::DeadlineExceeded(operation.into())
    }

    /// Check if this error is worth retrying
    ///
    /// Client errors from the API server (4xx) are permanent except for
    /// conflicts (409) and throttling (429). Template and serialization errors
    /// require a fix before anything can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => {
                ae.code == 409 || ae.code == 429 || !(400..500).contains(&ae.code)
            }
            Error::Kube(_) => true,
            Error::Validation(_) => false,
            Error::Conflict(_) => true,
            Error::AlreadyOwned { .. } => false,
            Error::Template(_) => false,
            Error::Serialization(_) => false,
            Error::DeadlineExceeded(_) => true,
            Error::Aggregate(errors) => errors.iter().any(Error::is_retryable),
        }
    }

    /// Check if this error reports an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::Kube(kube::Error::Api(ae)) => ae.code == 409,
            Error::Aggregate(errors) => errors.iter().any(Error::is_conflict),
            _ => false,
        }
    }
}

/// Combine the failures of one reconcile into a single result
///
/// No errors is success, a single error is returned as-is, and more than one
/// is wrapped in [`Error::Aggregate`] so that none of them is dropped.
pub fn aggregate(errors: impl IntoIterator<Item = Error>) -> Result<(), Error> {
    let mut errors: Vec<Error> = errors.into_iter().collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(Error::Aggregate(errors)),
    }
}

/// Combine a primary failure with an optional follow-up failure
///
/// Same shape as [`aggregate`] for a list that is known to be non-empty.
pub fn with_secondary(primary: Error, secondary: Option<Error>) -> Error {
    match secondary {
        None => primary,
        Some(secondary) => Error::Aggregate(vec![primary, secondary]),
    }
}
