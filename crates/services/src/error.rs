//! Shared error types for the services crate.

use thiserror::Error;

use lms_core::model::{AssignmentId, CourseId, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the read-only aggregation services.
///
/// Empty denominators never show up here; they degrade to zero or `None`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error("reporting window falls outside the representable calendar")]
    WindowOutOfRange,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted when a user asks for a course-scoped view.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccessError {
    #[error("user {user} is not enrolled in course {course}")]
    NotEnrolled { user: UserId, course: CourseId },
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SubmissionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("assignment {0} does not exist")]
    AssignmentNotFound(AssignmentId),
    #[error("user {user} is not enrolled in the course of assignment {assignment}")]
    NotEnrolled {
        user: UserId,
        assignment: AssignmentId,
    },
    #[error("user {user} has not submitted assignment {assignment}")]
    NotSubmitted {
        user: UserId,
        assignment: AssignmentId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
