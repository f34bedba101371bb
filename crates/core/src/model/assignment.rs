use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{AssignmentId, CourseId};

/// Divisor used when an assignment carries no total score.
pub const DEFAULT_TOTAL_SCORE: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error("assignment title cannot be empty")]
    EmptyTitle,
}

/// Homework belonging to exactly one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    id: AssignmentId,
    course_id: CourseId,
    title: String,
    due_at: Option<DateTime<Utc>>,
    total_score: Option<u32>,
}

impl Assignment {
    /// # Errors
    ///
    /// Returns `AssignmentError::EmptyTitle` if the trimmed title is empty.
    pub fn new(
        id: AssignmentId,
        course_id: CourseId,
        title: impl Into<String>,
        due_at: Option<DateTime<Utc>>,
        total_score: Option<u32>,
    ) -> Result<Self, AssignmentError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(AssignmentError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id,
            title,
            due_at,
            total_score,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    /// Raw stored total, `None` when unset.
    #[must_use]
    pub fn total_score(&self) -> Option<u32> {
        self.total_score
    }

    /// Divisor for percentage math; falls back to 100 when unset or zero.
    #[must_use]
    pub fn effective_total_score(&self) -> u32 {
        effective_total_score(self.total_score)
    }
}

/// Resolves a stored total score to the divisor used for percentages.
#[must_use]
pub fn effective_total_score(total_score: Option<u32>) -> u32 {
    match total_score {
        Some(total) if total > 0 => total,
        _ => DEFAULT_TOTAL_SCORE,
    }
}
