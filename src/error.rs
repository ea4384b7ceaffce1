//! Error types for the object-store adapter boundary.

use std::fmt;

use anyhow::Error;

/// The error taxonomy an [`crate::store::ObjectStore`] implementation must
/// sort its failures into.
///
/// This mirrors the three-way split a cloud storage client needs to make on
/// every call: "the object genuinely doesn't exist", "this is probably
/// transient and worth retrying", and "this call cannot succeed no matter how
/// many times we try it".
#[derive(Debug)]
pub enum AdapterError {
    /// The named object does not exist in the bucket.
    NotFound {
        /// The bucket that was queried.
        bucket: String,
        /// The object name that was not found.
        name: String,
    },
    /// A transient failure (network error, server 5xx, rate limiting).
    /// Callers may retry.
    Transient(Error),
    /// A failure that will not go away on retry (bad request, permission
    /// denied, malformed response).
    Fatal(Error),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::NotFound { bucket, name } => {
                write!(f, "object not found: gs://{}/{}", bucket, name)
            }
            AdapterError::Transient(err) => write!(f, "transient storage error: {}", err),
            AdapterError::Fatal(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdapterError::NotFound { .. } => None,
            AdapterError::Transient(err) | AdapterError::Fatal(err) => err.source(),
        }
    }
}

impl From<Error> for AdapterError {
    fn from(err: Error) -> Self {
        AdapterError::Fatal(err)
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Fatal(err.into())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AdapterError::Transient(err.into())
        } else {
            AdapterError::Fatal(err.into())
        }
    }
}

/// A group was handed to the composer with more sources than the server
/// allows in a single compose call.
#[derive(Debug)]
pub struct TooManySources {
    /// How many sources were supplied.
    pub count: usize,
    /// The maximum allowed (see [`crate::model::MAX_COMPOSE`]).
    pub max: usize,
}

impl fmt::Display for TooManySources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot compose {} objects in one call, maximum is {}",
            self.count, self.max
        )
    }
}

impl std::error::Error for TooManySources {}
