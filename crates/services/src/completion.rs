//! Enrollment-pair completion: a pair is complete once the user has handed in
//! at least as many distinct assignments as the course has.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use lms_core::metrics::{mean, normalized_percentage, percent};
use lms_core::model::{CourseId, Enrollment, UserId};
use storage::repository::{AggregateQueries, CourseRepository, GradedScore};

use crate::error::AnalyticsError;

/// Enrolled vs. completed students of one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoursePerformance {
    pub course_id: CourseId,
    pub title: String,
    pub enrolled: u32,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseDetail {
    pub course_id: CourseId,
    pub title: String,
    pub students: u32,
    /// Whole-number mean of graded percentages, `None` when nothing is graded.
    pub avg_score: Option<u32>,
    pub completion_percentage: u32,
}

/// Lookup maps loaded in bulk, then walked in memory.
#[derive(Debug, Clone, Default)]
pub struct CompletionInputs {
    pub assignment_counts: HashMap<CourseId, u32>,
    pub enrollment_counts: HashMap<CourseId, u32>,
    pub pairs: Vec<Enrollment>,
    pub submitted: HashMap<(UserId, CourseId), u32>,
}

impl CompletionInputs {
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn load(aggregates: &dyn AggregateQueries) -> Result<Self, AnalyticsError> {
        let inputs = Self {
            assignment_counts: aggregates.assignment_counts_by_course().await?,
            enrollment_counts: aggregates.enrollment_counts_by_course().await?,
            pairs: aggregates.enrollment_pairs().await?,
            submitted: aggregates.submitted_counts_by_user_course().await?,
        };
        log::debug!(
            "completion inputs: {} courses with assignments, {} enrollment pairs",
            inputs.assignment_counts.len(),
            inputs.pairs.len()
        );
        Ok(inputs)
    }

    fn required(&self, course: CourseId) -> u32 {
        self.assignment_counts.get(&course).copied().unwrap_or(0)
    }

    /// Courses without assignments are never complete.
    #[must_use]
    pub fn is_complete(&self, pair: &Enrollment) -> bool {
        let required = self.required(pair.course_id);
        required > 0
            && self
                .submitted
                .get(&(pair.user_id, pair.course_id))
                .copied()
                .unwrap_or(0)
                >= required
    }

    /// Percentage of finished pairs among pairs whose course has assignments.
    #[must_use]
    pub fn global_rate(&self) -> u32 {
        let (finished, total) = self
            .pairs
            .iter()
            .filter(|pair| self.required(pair.course_id) > 0)
            .fold((0_u32, 0_u32), |(finished, total), pair| {
                (finished + u32::from(self.is_complete(pair)), total + 1)
            });
        percent(finished, total)
    }

    /// `{course → completed students}`.
    #[must_use]
    pub fn completed_by_course(&self) -> HashMap<CourseId, u32> {
        let mut out = HashMap::new();
        for pair in self.pairs.iter().filter(|p| self.is_complete(p)) {
            *out.entry(pair.course_id).or_insert(0) += 1;
        }
        out
    }

    #[must_use]
    pub fn enrolled(&self, course: CourseId) -> u32 {
        self.enrollment_counts.get(&course).copied().unwrap_or(0)
    }

    /// Completed share of one course's students; 0 without students.
    #[must_use]
    pub fn course_rate(&self, course: CourseId) -> u32 {
        let completed = self.completed_by_course().get(&course).copied().unwrap_or(0);
        percent(completed, self.enrolled(course))
    }
}

/// `{course → whole-number mean of normalized percentages}`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn average_score_by_course(graded: &[GradedScore]) -> HashMap<CourseId, u32> {
    let mut per_course: HashMap<CourseId, Vec<f64>> = HashMap::new();
    for g in graded {
        per_course
            .entry(g.course_id)
            .or_default()
            .push(normalized_percentage(g.score, g.total_score));
    }
    per_course
        .into_iter()
        .filter_map(|(course, values)| mean(&values).map(|avg| (course, avg.round() as u32)))
        .collect()
}

/// Global and per-course completion figures.
#[derive(Clone)]
pub struct CompletionService {
    courses: Arc<dyn CourseRepository>,
    aggregates: Arc<dyn AggregateQueries>,
}

impl CompletionService {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, aggregates: Arc<dyn AggregateQueries>) -> Self {
        Self {
            courses,
            aggregates,
        }
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn inputs(&self) -> Result<CompletionInputs, AnalyticsError> {
        CompletionInputs::load(self.aggregates.as_ref()).await
    }

    /// Share of enrollment pairs (in courses with assignments) that are complete.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn completion_rate(&self) -> Result<u32, AnalyticsError> {
        Ok(self.inputs().await?.global_rate())
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn course_completion(&self, course: CourseId) -> Result<u32, AnalyticsError> {
        Ok(self.inputs().await?.course_rate(course))
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn course_performance(&self) -> Result<Vec<CoursePerformance>, AnalyticsError> {
        let inputs = self.inputs().await?;
        self.performance_from(&inputs).await
    }

    pub(crate) async fn performance_from(
        &self,
        inputs: &CompletionInputs,
    ) -> Result<Vec<CoursePerformance>, AnalyticsError> {
        let completed = inputs.completed_by_course();
        let courses = self.courses.list_courses().await?;
        Ok(courses
            .into_iter()
            .map(|course| CoursePerformance {
                course_id: course.id(),
                enrolled: inputs.enrolled(course.id()),
                completed: completed.get(&course.id()).copied().unwrap_or(0),
                title: course.title().to_owned(),
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn course_details(&self) -> Result<Vec<CourseDetail>, AnalyticsError> {
        let inputs = self.inputs().await?;
        self.details_from(&inputs).await
    }

    pub(crate) async fn details_from(
        &self,
        inputs: &CompletionInputs,
    ) -> Result<Vec<CourseDetail>, AnalyticsError> {
        let completed = inputs.completed_by_course();
        let averages = average_score_by_course(&self.aggregates.graded_scores().await?);
        let courses = self.courses.list_courses().await?;
        Ok(courses
            .into_iter()
            .map(|course| {
                let students = inputs.enrolled(course.id());
                let done = completed.get(&course.id()).copied().unwrap_or(0);
                CourseDetail {
                    course_id: course.id(),
                    students,
                    avg_score: averages.get(&course.id()).copied(),
                    completion_percentage: percent(done, students),
                    title: course.title().to_owned(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, grade, submit};
    use lms_core::model::AssignmentId;

    fn service(fx: &Fixture) -> CompletionService {
        CompletionService::new(fx.storage.courses.clone(), fx.storage.aggregates.clone())
    }

    #[test]
    fn assignment_free_courses_never_count() {
        let c1 = CourseId::new(1);
        let c2 = CourseId::new(2);
        let u = UserId::new(1);
        let inputs = CompletionInputs {
            assignment_counts: HashMap::from([(c1, 2)]),
            enrollment_counts: HashMap::from([(c1, 1), (c2, 1)]),
            pairs: vec![Enrollment::new(u, c1), Enrollment::new(u, c2)],
            submitted: HashMap::from([((u, c1), 2)]),
        };
        assert!(!inputs.is_complete(&Enrollment::new(u, c2)));
        assert_eq!(inputs.global_rate(), 100);
        assert_eq!(inputs.course_rate(c2), 0);
    }

    #[test]
    fn empty_inputs_degrade_to_zero() {
        let inputs = CompletionInputs::default();
        assert_eq!(inputs.global_rate(), 0);
        assert_eq!(inputs.course_rate(CourseId::new(7)), 0);
    }

    #[tokio::test]
    async fn partial_submission_is_not_complete() {
        let fx = Fixture::new().await;
        for id in 1..=3 {
            submit(&fx, id, fx.student).await;
        }
        let svc = service(&fx);
        assert_eq!(svc.completion_rate().await.unwrap(), 0);

        submit(&fx, 4, fx.student).await;
        assert_eq!(svc.completion_rate().await.unwrap(), 100);
        assert_eq!(svc.course_completion(fx.course).await.unwrap(), 100);

        // Grading or resubmitting after completion keeps the pair complete.
        grade(&fx, 4, fx.student, 10).await;
        submit(&fx, 4, fx.student).await;
        assert_eq!(svc.completion_rate().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn withdrawing_a_submission_breaks_completion() {
        let fx = Fixture::new().await;
        for id in 1..=4 {
            submit(&fx, id, fx.student).await;
        }
        let svc = service(&fx);
        assert_eq!(svc.course_completion(fx.course).await.unwrap(), 100);

        let mut row = fx
            .storage
            .submissions
            .get_submission(AssignmentId::new(2), fx.student)
            .await
            .unwrap()
            .unwrap();
        row.submission.submitted_at = None;
        fx.storage
            .submissions
            .upsert_submission(&row.submission)
            .await
            .unwrap();
        assert_eq!(svc.course_completion(fx.course).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn details_average_normalized_scores() {
        let fx = Fixture::new().await;
        let other = fx.add_student(2, "Sara").await;
        for id in 1..=4 {
            submit(&fx, id, fx.student).await;
        }
        submit(&fx, 1, other).await;
        grade(&fx, 1, fx.student, 80).await;
        grade(&fx, 1, other, 45).await;

        let details = service(&fx).course_details().await.unwrap();
        let web = details.iter().find(|d| d.course_id == fx.course).unwrap();
        assert_eq!(web.students, 2);
        assert_eq!(web.completion_percentage, 50);
        assert_eq!(web.avg_score, Some(63)); // 62.5 rounds half up

        let empty = details
            .iter()
            .find(|d| d.course_id == fx.empty_course)
            .unwrap();
        assert_eq!(empty.students, 1);
        assert_eq!(empty.avg_score, None);
        assert_eq!(empty.completion_percentage, 0);

        let perf = service(&fx).course_performance().await.unwrap();
        let web = perf.iter().find(|p| p.course_id == fx.course).unwrap();
        assert_eq!((web.enrolled, web.completed), (2, 1));
    }
}
