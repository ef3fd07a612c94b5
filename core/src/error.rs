//! Error types for the Jenkins client.
//!
//! # Design
//! Routine absence is not an error: lookups that hit a non-matching status
//! return [`Outcome::NotMatched`](crate::Outcome) instead. The variants here
//! cover the business cases that must stop the caller (missing items,
//! conflicts on create, cross-folder renames) plus the failures that leave
//! no HTTP response to inspect.

use thiserror::Error;

/// Network-level failure: the server never produced an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established or was dropped mid-request.
    #[error("request to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// A response arrived but its body could not be read.
    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Errors returned by [`Jenkins`](crate::Jenkins) operations.
#[derive(Debug, Error)]
pub enum JenkinsError {
    /// A required item, job, node, view or build does not exist.
    #[error("{0} does not exist")]
    NotFound(String),

    /// A create operation hit an item that is already present.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The caller asked for something the server cannot do.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No HTTP response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A URL template was resolved without one of its placeholders.
    #[error("template {template} is missing placeholder {{{placeholder}}}")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: String,
    },

    /// The response body lacks a field the operation needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Triggering a build produced no response at all.
    #[error("build of {job} failed, check whether the job needs parameters or a token")]
    BuildFailed {
        job: String,
        #[source]
        source: TransportError,
    },

    /// A request payload could not be encoded.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, JenkinsError>;
