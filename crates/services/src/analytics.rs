use std::sync::Arc;

use serde::Serialize;

use storage::repository::{AggregateQueries, UserRepository};

use crate::completion::{CompletionService, CourseDetail, CoursePerformance};
use crate::error::AnalyticsError;
use crate::risk::{RiskEntry, RiskService};
use crate::trend::{TrendPoint, TrendService};

/// Headline figures of the analytics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverviewMetrics {
    /// Every registered user, whatever the role.
    pub student_count: u32,
    pub active_courses: u32,
    /// Progress of the most recent trend month.
    pub avg_progress: u32,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsOverview {
    pub metrics: OverviewMetrics,
    pub course_performance: Vec<CoursePerformance>,
    pub trend: Vec<TrendPoint>,
    pub course_details: Vec<CourseDetail>,
    pub risk_students: Vec<RiskEntry>,
}

/// Composes the engine's outputs into one report.
#[derive(Clone)]
pub struct AnalyticsService {
    users: Arc<dyn UserRepository>,
    aggregates: Arc<dyn AggregateQueries>,
    completion: Arc<CompletionService>,
    trend: Arc<TrendService>,
    risk: Arc<RiskService>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        aggregates: Arc<dyn AggregateQueries>,
        completion: Arc<CompletionService>,
        trend: Arc<TrendService>,
        risk: Arc<RiskService>,
    ) -> Self {
        Self {
            users,
            aggregates,
            completion,
            trend,
            risk,
        }
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError` if any underlying aggregation fails.
    pub async fn overview(&self) -> Result<AnalyticsOverview, AnalyticsError> {
        let student_count = self.users.count_users().await?;
        let active_courses = self.aggregates.active_course_count().await?;

        let inputs = self.completion.inputs().await?;
        let course_performance = self.completion.performance_from(&inputs).await?;
        let course_details = self.completion.details_from(&inputs).await?;
        let trend = self.trend.monthly_trend().await?;
        let risk_students = self.risk.at_risk_students().await?;

        let metrics = OverviewMetrics {
            student_count,
            active_courses,
            avg_progress: trend.last().map_or(0, |p| p.avg_progress_percentage),
            completion_rate: inputs.global_rate(),
        };

        Ok(AnalyticsOverview {
            metrics,
            course_performance,
            trend,
            course_details,
            risk_students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, grade, submit};
    use lms_core::time::fixed_clock;

    fn service(fx: &Fixture) -> AnalyticsService {
        let s = &fx.storage;
        AnalyticsService::new(
            s.users.clone(),
            s.aggregates.clone(),
            Arc::new(CompletionService::new(s.courses.clone(), s.aggregates.clone())),
            Arc::new(TrendService::new(fixed_clock(), s.aggregates.clone())),
            Arc::new(RiskService::new(s.users.clone(), s.aggregates.clone())),
        )
    }

    #[tokio::test]
    async fn overview_combines_every_section() {
        let fx = Fixture::new().await;
        for id in 1..=3 {
            submit(&fx, id, fx.student).await;
        }
        grade(&fx, 1, fx.student, 80).await;
        grade(&fx, 2, fx.student, 45).await;

        let report = service(&fx).overview().await.unwrap();
        assert_eq!(report.metrics.student_count, 3);
        assert_eq!(report.metrics.active_courses, 2);
        assert_eq!(report.metrics.avg_progress, 75);
        assert_eq!(report.metrics.completion_rate, 0);
        assert_eq!(report.trend.len(), 5);
        assert_eq!(report.course_performance.len(), 2);
        assert_eq!(report.course_details.len(), 2);
        // Mina has 75% progress and a 62.5 average, so only the unenrolled user is flagged.
        assert_eq!(report.risk_students.len(), 1);
        assert_eq!(report.risk_students[0].user_id, fx.outsider);
    }

    #[tokio::test]
    async fn empty_store_reports_zeros() {
        let storage = storage::repository::Storage::in_memory();
        let svc = AnalyticsService::new(
            storage.users.clone(),
            storage.aggregates.clone(),
            Arc::new(CompletionService::new(
                storage.courses.clone(),
                storage.aggregates.clone(),
            )),
            Arc::new(TrendService::new(fixed_clock(), storage.aggregates.clone())),
            Arc::new(RiskService::new(
                storage.users.clone(),
                storage.aggregates.clone(),
            )),
        );
        let report = svc.overview().await.unwrap();
        assert_eq!(
            report.metrics,
            OverviewMetrics {
                student_count: 0,
                active_courses: 0,
                avg_progress: 0,
                completion_rate: 0,
            }
        );
        assert!(report.trend.iter().all(|p| p.submission_count == 0));
        assert!(report.risk_students.is_empty());
    }
}
