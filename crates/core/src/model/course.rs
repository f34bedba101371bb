use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,
}

/// A learning unit. Exists independently of any enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    id: CourseId,
    title: String,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the trimmed title is empty.
    pub fn new(id: CourseId, title: impl Into<String>) -> Result<Self, CourseError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        Ok(Self { id, title })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// A (user, course) pair. Unique per pair in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
}

impl Enrollment {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self { user_id, course_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_title_is_trimmed() {
        let course = Course::new(CourseId::new(1), "  Web Basics ").unwrap();
        assert_eq!(course.title(), "Web Basics");
    }

    #[test]
    fn course_rejects_empty_title() {
        assert_eq!(
            Course::new(CourseId::new(1), "").unwrap_err(),
            CourseError::EmptyTitle
        );
    }
}
