use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use lms_core::Clock;
use lms_core::metrics::{MonthBucket, percent};
use lms_core::model::CourseId;
use storage::repository::AggregateQueries;

use crate::error::AnalyticsError;

/// Number of calendar months in the trend window, current month included.
pub const TREND_MONTHS: u32 = 5;

/// Submission activity for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub month: u32,
    pub month_label: &'static str,
    pub avg_progress_percentage: u32,
    pub submission_count: u32,
}

/// Σ over courses of assignments × enrolled students.
#[must_use]
pub fn expected_submissions(
    assignment_counts: &HashMap<CourseId, u32>,
    enrollment_counts: &HashMap<CourseId, u32>,
) -> u32 {
    assignment_counts
        .iter()
        .map(|(course, n)| n.saturating_mul(enrollment_counts.get(course).copied().unwrap_or(0)))
        .fold(0_u32, u32::saturating_add)
}

/// Lays out `TREND_MONTHS` buckets from `start`.
///
/// Every bucket shares the same `expected` denominator; it is not a per-month rate.
#[must_use]
pub fn build_trend(
    start: MonthBucket,
    counts: &HashMap<MonthBucket, u32>,
    expected: u32,
) -> Vec<TrendPoint> {
    std::iter::successors(Some(start), |m| Some(m.next()))
        .take(TREND_MONTHS as usize)
        .map(|bucket| {
            let submission_count = counts.get(&bucket).copied().unwrap_or(0);
            TrendPoint {
                year: bucket.year(),
                month: bucket.month(),
                month_label: bucket.label(),
                avg_progress_percentage: percent(submission_count, expected),
                submission_count,
            }
        })
        .collect()
}

/// Rolling monthly submission trend ending at the clock's current month.
#[derive(Clone)]
pub struct TrendService {
    clock: Clock,
    aggregates: Arc<dyn AggregateQueries>,
}

impl TrendService {
    #[must_use]
    pub fn new(clock: Clock, aggregates: Arc<dyn AggregateQueries>) -> Self {
        Self { clock, aggregates }
    }

    /// Exactly five points, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::WindowOutOfRange` if the window cannot be
    /// expressed as timestamps, or `AnalyticsError::Storage` on repository failures.
    pub async fn monthly_trend(&self) -> Result<Vec<TrendPoint>, AnalyticsError> {
        let current = self.clock.current_month();
        let start = current.back(TREND_MONTHS - 1);
        let from = start.start().ok_or(AnalyticsError::WindowOutOfRange)?;
        let until = current
            .next()
            .start()
            .ok_or(AnalyticsError::WindowOutOfRange)?;

        let counts = self
            .aggregates
            .monthly_submission_counts(from, until)
            .await?;
        let expected = expected_submissions(
            &self.aggregates.assignment_counts_by_course().await?,
            &self.aggregates.enrollment_counts_by_course().await?,
        );
        log::debug!(
            "trend window {}-{:02}..{}-{:02}, expected submissions {expected}",
            start.year(),
            start.month(),
            current.year(),
            current.month()
        );

        Ok(build_trend(start, &counts, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, submit};
    use lms_core::time::fixed_clock;

    #[test]
    fn window_wraps_into_next_year() {
        let start = MonthBucket::new(2024, 10).unwrap();
        let counts = HashMap::from([(MonthBucket::new(2025, 1).unwrap(), 3)]);
        let trend = build_trend(start, &counts, 12);

        let months: Vec<(i32, u32)> = trend.iter().map(|p| (p.year, p.month)).collect();
        assert_eq!(
            months,
            vec![(2024, 10), (2024, 11), (2024, 12), (2025, 1), (2025, 2)]
        );
        assert_eq!(trend[3].submission_count, 3);
        assert_eq!(trend[3].avg_progress_percentage, 25);
        assert_eq!(trend[3].month_label, "January");
    }

    #[test]
    fn zero_expected_submissions_gives_zero_progress() {
        let start = MonthBucket::new(2025, 1).unwrap();
        let counts = HashMap::from([(start, 9)]);
        let trend = build_trend(start, &counts, 0);
        assert_eq!(trend.len(), 5);
        assert!(trend.iter().all(|p| p.avg_progress_percentage == 0));
        assert_eq!(trend[0].submission_count, 9);
    }

    #[test]
    fn expected_multiplies_per_course() {
        let a = CourseId::new(1);
        let b = CourseId::new(2);
        let assignments = HashMap::from([(a, 4), (b, 2)]);
        let enrollments = HashMap::from([(a, 3)]);
        assert_eq!(expected_submissions(&assignments, &enrollments), 12);
    }

    #[tokio::test]
    async fn trend_ends_at_current_month() {
        let fx = Fixture::new().await;
        submit(&fx, 1, fx.student).await;
        submit(&fx, 2, fx.student).await;

        let svc = TrendService::new(fixed_clock(), fx.storage.aggregates.clone());
        let trend = svc.monthly_trend().await.unwrap();
        assert_eq!(trend.len(), 5);
        assert_eq!((trend[0].year, trend[0].month), (2024, 11));
        let last = trend.last().unwrap();
        assert_eq!((last.year, last.month), (2025, 3));
        assert_eq!(last.submission_count, 2);
        assert_eq!(last.avg_progress_percentage, 50);
    }
}
