//! Error types for the Nexus client.

use thiserror::Error;

/// Result type for Nexus operations.
pub type NexusResult<T> = Result<T, NexusError>;

/// Errors that can occur when interacting with Nexus.
#[derive(Debug, Error)]
pub enum NexusError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session is missing, expired, or was rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource could not be read.
    #[error("Failed to fetch resource with status code: {status}, message: {message}")]
    ResourceFetchFailed { status: u16, message: String },

    /// A resource could not be created.
    #[error("Failed to create resource with status code: {status}, message: {message}")]
    ResourceCreateFailed { status: u16, message: String },

    /// A resource could not be updated.
    #[error("Failed to update resource with status code: {status}, message: {message}")]
    ResourceUpdateFailed { status: u16, message: String },

    /// A resource could not be deleted.
    #[error("Failed to delete resource with status code: {status}, message: {message}")]
    ResourceDeleteFailed { status: u16, message: String },

    /// A lookup expected one match and found none.
    #[error("No {0} matched the supplied filters")]
    ZeroMatches(String),

    /// A lookup expected one match and found several.
    #[error("Found {count} {resource} matches, expected exactly one")]
    NoUniqueMatch { resource: String, count: u64 },

    /// The job reached the ERROR state.
    #[error("Job errored with detail: {detail}")]
    JobFailed { detail: String },

    /// A wait exceeded its deadline.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    /// The status channel closed or failed mid-stream.
    #[error("Status channel closed: {0}")]
    ChannelClosed(String),

    /// A status payload could not be interpreted.
    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    /// A stored reference carried an unrecognised `type` tag.
    #[error("Unknown reference type: {0}")]
    UnknownReference(String),

    /// Configuration value could not be parsed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller-supplied value was unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation needed an active project and none was set.
    #[error("No project specified and no active project set")]
    NoActiveProject,
}

impl NexusError {
    /// Whether this error came from the server rejecting our credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, NexusError::Authentication(_))
    }

    /// HTTP status code carried by a resource failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NexusError::ResourceFetchFailed { status, .. }
            | NexusError::ResourceCreateFailed { status, .. }
            | NexusError::ResourceUpdateFailed { status, .. }
            | NexusError::ResourceDeleteFailed { status, .. } => Some(*status),
            NexusError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failed_display() {
        let err = NexusError::ResourceFetchFailed {
            status: 503,
            message: "Service unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("Service unavailable"));
        assert_eq!(err.status_code(), Some(503));
    }

    #[test]
    fn test_create_failed_display() {
        let err = NexusError::ResourceCreateFailed {
            status: 409,
            message: "name taken".into(),
        };
        assert!(err.to_string().starts_with("Failed to create resource"));
        assert!(err.to_string().contains("name taken"));
    }

    #[test]
    fn test_job_failed_keeps_detail() {
        let err = NexusError::JobFailed {
            detail: "Circuit too deep for device".into(),
        };
        assert_eq!(
            err.to_string(),
            "Job errored with detail: Circuit too deep for device"
        );
    }

    #[test]
    fn test_no_unique_match_display() {
        let err = NexusError::NoUniqueMatch {
            resource: "project".into(),
            count: 2,
        };
        assert!(err.to_string().contains("Found 2 project matches"));
    }

    #[test]
    fn test_authentication_predicate() {
        assert!(NexusError::Authentication("expired".into()).is_authentication());
        assert!(!NexusError::NoActiveProject.is_authentication());
        assert_eq!(NexusError::Timeout("j1".into()).status_code(), None);
    }
}
