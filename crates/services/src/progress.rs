use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use lms_core::metrics::percent;
use lms_core::model::{CourseId, UserId};
use storage::repository::{AggregateQueries, CourseProgressRow, CourseRepository};

use crate::error::AnalyticsError;

/// Submitted vs. expected assignments for a user, overall or in one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSummary {
    pub percentage: u32,
    pub submitted_count: u32,
    pub total_count: u32,
}

impl ProgressSummary {
    #[must_use]
    pub fn new(submitted_count: u32, total_count: u32) -> Self {
        Self {
            percentage: percent(submitted_count, total_count),
            submitted_count,
            total_count,
        }
    }

    /// Sums per-course rows into a user-wide summary.
    #[must_use]
    pub fn from_rows(rows: &[CourseProgressRow]) -> Self {
        let (submitted, total) = rows.iter().fold((0_u32, 0_u32), |(s, t), row| {
            (
                s.saturating_add(row.submitted_assignments),
                t.saturating_add(row.total_assignments),
            )
        });
        Self::new(submitted, total)
    }
}

impl From<&CourseProgressRow> for ProgressSummary {
    fn from(row: &CourseProgressRow) -> Self {
        Self::new(row.submitted_assignments, row.total_assignments)
    }
}

/// One enrolled course with its progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseCard {
    pub course_id: CourseId,
    pub title: String,
    pub total_assignments: u32,
    pub submitted_count: u32,
    pub progress_percentage: u32,
}

/// Per-user progress over enrolled courses.
#[derive(Clone)]
pub struct ProgressService {
    courses: Arc<dyn CourseRepository>,
    aggregates: Arc<dyn AggregateQueries>,
}

impl ProgressService {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, aggregates: Arc<dyn AggregateQueries>) -> Self {
        Self {
            courses,
            aggregates,
        }
    }

    /// Progress across every course the user is enrolled in.
    ///
    /// A user without enrollments gets `(0, 0, 0)`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn user_progress(&self, user: UserId) -> Result<ProgressSummary, AnalyticsError> {
        let rows = self.aggregates.enrolled_progress_by_course(user).await?;
        Ok(ProgressSummary::from_rows(&rows))
    }

    /// Progress in one course; zeros when the user is not enrolled there.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<ProgressSummary, AnalyticsError> {
        let rows = self.aggregates.enrolled_progress_by_course(user).await?;
        Ok(rows
            .iter()
            .find(|row| row.course_id == course)
            .map(ProgressSummary::from)
            .unwrap_or_default())
    }

    /// Cards for the user's courses ordered by title, optionally filtered by a
    /// case-insensitive title substring.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn course_cards(
        &self,
        user: UserId,
        title_filter: Option<&str>,
    ) -> Result<Vec<CourseCard>, AnalyticsError> {
        let courses = self.courses.list_courses_for_user(user, title_filter).await?;
        let rows: HashMap<CourseId, CourseProgressRow> = self
            .aggregates
            .enrolled_progress_by_course(user)
            .await?
            .into_iter()
            .map(|row| (row.course_id, row))
            .collect();

        let cards = courses
            .into_iter()
            .map(|course| {
                let summary = rows
                    .get(&course.id())
                    .map(ProgressSummary::from)
                    .unwrap_or_default();
                CourseCard {
                    course_id: course.id(),
                    title: course.title().to_owned(),
                    total_assignments: summary.total_count,
                    submitted_count: summary.submitted_count,
                    progress_percentage: summary.percentage,
                }
            })
            .collect::<Vec<_>>();
        log::debug!("built {} course cards for user {user}", cards.len());
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, submit};

    #[tokio::test]
    async fn no_enrollments_yield_zero_progress() {
        let fx = Fixture::new().await;
        let svc = ProgressService::new(fx.storage.courses.clone(), fx.storage.aggregates.clone());
        let progress = svc.user_progress(fx.outsider).await.unwrap();
        assert_eq!(progress, ProgressSummary::new(0, 0));
        assert_eq!(progress.percentage, 0);
    }

    #[tokio::test]
    async fn resubmitting_counts_once() {
        let fx = Fixture::new().await;
        submit(&fx, 1, fx.student).await;
        submit(&fx, 1, fx.student).await;
        submit(&fx, 2, fx.student).await;
        submit(&fx, 3, fx.student).await;

        let svc = ProgressService::new(fx.storage.courses.clone(), fx.storage.aggregates.clone());
        let progress = svc.user_progress(fx.student).await.unwrap();
        assert_eq!(progress.submitted_count, 3);
        assert_eq!(progress.total_count, 4);
        assert_eq!(progress.percentage, 75);
    }

    #[tokio::test]
    async fn course_cards_follow_title_filter() {
        let fx = Fixture::new().await;
        submit(&fx, 1, fx.student).await;

        let svc = ProgressService::new(fx.storage.courses.clone(), fx.storage.aggregates.clone());
        let cards = svc.course_cards(fx.student, None).await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "Empty Seminar");
        assert_eq!(cards[1].progress_percentage, 25);

        let filtered = svc.course_cards(fx.student, Some("WEB")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].course_id, fx.course);

        let single = svc.course_progress(fx.student, fx.course).await.unwrap();
        assert_eq!(single, ProgressSummary::new(1, 4));
    }
}
