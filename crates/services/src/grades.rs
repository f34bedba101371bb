use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use lms_core::metrics::{
    LetterGrade, average_percentage, letter_label, mean, normalized_percentage, percent, round1,
};
use lms_core::model::{Assignment, AssignmentId, Course, CourseId, Submission, UserId};
use storage::repository::{
    AggregateQueries, AssignmentRepository, CourseRepository, StorageError, SubmissionRepository,
};

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Missing,
}

/// One assignment of a course as seen by one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub assignment_id: AssignmentId,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub total_score: u32,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<u32>,
    /// `None` until graded.
    pub percentage: Option<f64>,
    pub late: bool,
}

/// Summary card for one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseGradeSummary {
    pub total: u32,
    pub submitted: u32,
    pub graded: u32,
    pub on_time: u32,
    pub late: u32,
    pub missing: u32,
    pub average: Option<f64>,
    pub letter: Option<LetterGrade>,
    pub letter_label: &'static str,
    pub completion: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseGrades {
    pub course_id: CourseId,
    pub title: String,
    pub summary: CourseGradeSummary,
    pub rows: Vec<GradeRow>,
}

/// Every enrolled course of a user, ordered by title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeBook {
    pub courses: Vec<CourseGrades>,
    /// Mean of the defined course averages.
    pub overall_average: Option<f64>,
}

/// Builds the grade table from a course's assignments (already in display
/// order) and the user's submissions in that course.
#[must_use]
pub fn grade_rows(
    assignments: &[Assignment],
    submissions: &[Submission],
) -> Vec<GradeRow> {
    let by_assignment: HashMap<AssignmentId, &Submission> =
        submissions.iter().map(|s| (s.assignment_id, s)).collect();

    assignments
        .iter()
        .map(|a| {
            let sub = by_assignment.get(&a.id()).copied();
            let handed_in = sub.is_some_and(Submission::is_submitted);
            let score = sub.and_then(|s| s.score);
            GradeRow {
                assignment_id: a.id(),
                title: a.title().to_owned(),
                due_at: a.due_at(),
                total_score: a.effective_total_score(),
                status: if handed_in {
                    SubmissionStatus::Submitted
                } else {
                    SubmissionStatus::Missing
                },
                submitted_at: sub.and_then(|s| s.submitted_at),
                score,
                percentage: score.map(|s| normalized_percentage(s, a.total_score())),
                late: sub.is_some_and(|s| s.is_late_for(a)),
            }
        })
        .collect()
}

/// Rolls a grade table up into the course summary card.
#[must_use]
pub fn summarize(rows: &[GradeRow]) -> CourseGradeSummary {
    let mut submitted = 0_u32;
    let mut graded = 0_u32;
    let mut late = 0_u32;
    for row in rows {
        if row.status == SubmissionStatus::Submitted {
            submitted += 1;
        }
        if row.score.is_some() {
            graded += 1;
            if row.late {
                late += 1;
            }
        }
    }
    let total = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let average = average_percentage(
        rows.iter()
            .filter_map(|r| r.score.map(|s| (s, Some(r.total_score)))),
    );
    let letter = LetterGrade::from_average(average);

    CourseGradeSummary {
        total,
        submitted,
        graded,
        on_time: graded - late,
        late,
        missing: total.saturating_sub(submitted),
        average,
        letter,
        letter_label: letter_label(letter),
        completion: percent(submitted, total),
    }
}

/// Per-course grade tables and averages for one user.
#[derive(Clone)]
pub struct GradeService {
    courses: Arc<dyn CourseRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    aggregates: Arc<dyn AggregateQueries>,
}

impl GradeService {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        aggregates: Arc<dyn AggregateQueries>,
    ) -> Self {
        Self {
            courses,
            assignments,
            submissions,
            aggregates,
        }
    }

    /// Assignment table for a user in one course.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn assignment_rows(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<GradeRow>, AnalyticsError> {
        let assignments = self.assignments.list_assignments_for_course(course).await?;
        let submissions: Vec<Submission> = self
            .submissions
            .list_submissions_for_user_in_course(user, course)
            .await?
            .into_iter()
            .map(|row| row.submission)
            .collect();
        Ok(grade_rows(&assignments, &submissions))
    }

    /// Grade table and summary card for one course.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` with `StorageError::NotFound` when the
    /// course does not exist, or on repository failures.
    pub async fn course_grades(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<CourseGrades, AnalyticsError> {
        let course = self
            .courses
            .get_course(course)
            .await?
            .ok_or(StorageError::NotFound)?;
        self.grades_for(user, &course).await
    }

    async fn grades_for(&self, user: UserId, course: &Course) -> Result<CourseGrades, AnalyticsError> {
        let rows = self.assignment_rows(user, course.id()).await?;
        Ok(CourseGrades {
            course_id: course.id(),
            title: course.title().to_owned(),
            summary: summarize(&rows),
            rows,
        })
    }

    /// Grades for every enrolled course.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn grade_book(&self, user: UserId) -> Result<GradeBook, AnalyticsError> {
        let courses = self.courses.list_courses_for_user(user, None).await?;
        let mut out = Vec::with_capacity(courses.len());
        for course in &courses {
            out.push(self.grades_for(user, course).await?);
        }

        let averages: Vec<f64> = out.iter().filter_map(|c| c.summary.average).collect();
        Ok(GradeBook {
            overall_average: mean(&averages).map(round1),
            courses: out,
        })
    }

    /// Mean normalized percentage over all of the user's graded work,
    /// regardless of course. `None` when nothing is graded.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if repository access fails.
    pub async fn overall_average(&self, user: UserId) -> Result<Option<f64>, AnalyticsError> {
        let graded = self.aggregates.graded_scores_for_user(user).await?;
        Ok(average_percentage(
            graded.iter().map(|g| (g.score, g.total_score)),
        ))
    }
}
