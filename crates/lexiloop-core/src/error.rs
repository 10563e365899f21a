//! Error taxonomy for the review engine.
//!
//! Every failure the core surfaces carries an [`ErrorKind`] tag so request
//! handlers can pick a status and a safe default without string matching.

use thiserror::Error;

use crate::model::GradeEvent;

/// Coarse classification of a [`ReviewError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Internal => "internal",
        };
        f.write_str(tag)
    }
}

/// Errors returned by the review engine.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Bad rating token, out-of-range level/length, or bad calendar input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing review state, item, deck, or artifact.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was hit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The content generator or scheduler procedure failed.
    #[error("upstream failure: {0:#}")]
    Upstream(anyhow::Error),

    /// The store failed.
    #[error("internal error: {0}")]
    Internal(String),

    /// The review state was written but its grade event could not be appended.
    #[error("review state updated but grade event {} was not recorded: {source}", .event.id)]
    EventAppend {
        event: GradeEvent,
        #[source]
        source: StoreError,
    },
}

impl ReviewError {
    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ReviewError::NotFound(_) => ErrorKind::NotFound,
            ReviewError::Conflict(_) => ErrorKind::Conflict,
            ReviewError::Upstream(_) => ErrorKind::Upstream,
            ReviewError::Internal(_) | ReviewError::EventAppend { .. } => ErrorKind::Internal,
        }
    }

    /// The grade event still waiting to be appended, if this is a partial write.
    pub fn pending_event(&self) -> Option<&GradeEvent> {
        match self {
            ReviewError::EventAppend { event, .. } => Some(event),
            _ => None,
        }
    }
}

/// Errors reported by store and event-log collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique key already exists.
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    /// The backend failed for any other reason.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ReviewError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation(msg) => ReviewError::Conflict(msg),
            StoreError::Backend(msg) => ReviewError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let conflict: ReviewError = StoreError::ConstraintViolation("dup".into()).into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let internal: ReviewError = StoreError::Backend("disk".into()).into();
        assert_eq!(internal.kind(), ErrorKind::Internal);
    }

    #[test]
    fn upstream_keeps_source_chain() {
        let err = ReviewError::Upstream(anyhow::anyhow!("timeout").context("generator"));
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn kind_display_tags() {
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "invalid_argument");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
