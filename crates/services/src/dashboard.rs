use std::sync::Arc;

use serde::Serialize;

use lms_core::model::{CourseId, Role, UserId};
use storage::repository::{
    AggregateQueries, CourseRepository, EnrollmentRepository, StorageError, UserRepository,
};

use crate::error::{AccessError, AnalyticsError};
use crate::grades::{GradeRow, GradeService};
use crate::progress::{CourseCard, ProgressService, ProgressSummary};

/// A student's landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub user_id: UserId,
    pub course_count: u32,
    pub progress: ProgressSummary,
    pub average_score: Option<f64>,
    pub courses: Vec<CourseCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub enrolled_courses: u32,
    pub submitted_count: u32,
    pub average_score: Option<f64>,
}

/// One course as seen by an enrolled user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOverview {
    pub course_id: CourseId,
    pub title: String,
    pub progress: ProgressSummary,
    pub assignments: Vec<GradeRow>,
}

/// User-scoped views. Every call names the user explicitly.
#[derive(Clone)]
pub struct DashboardService {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    aggregates: Arc<dyn AggregateQueries>,
    progress: Arc<ProgressService>,
    grades: Arc<GradeService>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        aggregates: Arc<dyn AggregateQueries>,
        progress: Arc<ProgressService>,
        grades: Arc<GradeService>,
    ) -> Self {
        Self {
            users,
            courses,
            enrollments,
            aggregates,
            progress,
            grades,
        }
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn dashboard(&self, user: UserId) -> Result<Dashboard, AnalyticsError> {
        Ok(Dashboard {
            user_id: user,
            course_count: self.enrollments.count_enrollments_for_user(user).await?,
            progress: self.progress.user_progress(user).await?,
            average_score: self.grades.overall_average(user).await?,
            courses: self.progress.course_cards(user, None).await?,
        })
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` with `StorageError::NotFound` for an
    /// unknown user, or on repository failures.
    pub async fn profile(&self, user: UserId) -> Result<ProfileSummary, AnalyticsError> {
        let record = self
            .users
            .get_user(user)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(ProfileSummary {
            user_id: user,
            name: record.name().to_owned(),
            email: record.email().to_owned(),
            role: record.role(),
            enrolled_courses: self.enrollments.count_enrollments_for_user(user).await?,
            submitted_count: self.aggregates.submitted_count_for_user(user).await?,
            average_score: self.grades.overall_average(user).await?,
        })
    }

    /// Progress and assignment table for a course the user is enrolled in.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NotEnrolled` when the user is not enrolled,
    /// `AccessError::Storage` with `StorageError::NotFound` for an unknown
    /// course, or other repository failures.
    pub async fn course_overview(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<CourseOverview, AccessError> {
        let record = self
            .courses
            .get_course(course)
            .await?
            .ok_or(StorageError::NotFound)?;
        if !self.enrollments.is_enrolled(user, course).await? {
            return Err(AccessError::NotEnrolled { user, course });
        }

        Ok(CourseOverview {
            course_id: course,
            title: record.title().to_owned(),
            progress: self.progress.course_progress(user, course).await?,
            assignments: self.grades.assignment_rows(user, course).await?,
        })
    }
}
