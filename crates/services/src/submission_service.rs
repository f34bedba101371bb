use std::sync::Arc;

use serde::Serialize;

use lms_core::Clock;
use lms_core::model::{AssignmentId, SubmissionId, UserId, is_late};
use storage::repository::{AssignmentRepository, EnrollmentRepository, SubmissionRepository};

use crate::error::SubmissionError;

/// Outcome of a hand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub submission_id: SubmissionId,
    pub late: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Hand-in and grading writes. One row per (assignment, user).
#[derive(Clone)]
pub struct SubmissionService {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        enrollments: Arc<dyn EnrollmentRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            clock,
            enrollments,
            assignments,
            submissions,
        }
    }

    /// Hand in (or re-hand in) an assignment.
    ///
    /// A resubmission updates the existing row in a single write and restamps
    /// `submitted_at`. Blank `file_url` or `comment` keep whatever was stored
    /// before; the grade columns are never written here.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::AssignmentNotFound` for an unknown assignment,
    /// `SubmissionError::NotEnrolled` when the user is not in its course, or
    /// `SubmissionError::Storage` on repository failures.
    pub async fn submit(
        &self,
        user: UserId,
        assignment: AssignmentId,
        file_url: Option<String>,
        comment: Option<String>,
    ) -> Result<SubmitReceipt, SubmissionError> {
        let record = self
            .assignments
            .get_assignment(assignment)
            .await?
            .ok_or(SubmissionError::AssignmentNotFound(assignment))?;
        if !self
            .enrollments
            .is_enrolled(user, record.course_id())
            .await?
        {
            return Err(SubmissionError::NotEnrolled { user, assignment });
        }

        let now = self.clock.now();
        let submission_id = self
            .submissions
            .record_hand_in(
                assignment,
                user,
                now,
                non_blank(file_url).as_deref(),
                non_blank(comment).as_deref(),
            )
            .await?;
        let late = is_late(Some(now), record.due_at());
        log::info!("user {user} submitted assignment {assignment} (late: {late})");
        Ok(SubmitReceipt {
            submission_id,
            late,
        })
    }

    /// Record a score on a handed-in submission.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::NotSubmitted` when there is nothing handed in
    /// to grade, or `SubmissionError::Storage` on repository failures.
    pub async fn grade(
        &self,
        user: UserId,
        assignment: AssignmentId,
        score: u32,
    ) -> Result<(), SubmissionError> {
        let handed_in = self
            .submissions
            .get_submission(assignment, user)
            .await?
            .is_some_and(|row| row.submission.is_submitted());
        if !handed_in {
            return Err(SubmissionError::NotSubmitted { user, assignment });
        }

        self.submissions
            .set_score(assignment, user, score, self.clock.now())
            .await?;
        log::info!("graded assignment {assignment} for user {user}: {score}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use chrono::{DateTime, Duration, Utc};
    use lms_core::model::CourseId;
    use lms_core::time::{fixed_clock, fixed_now};
    use storage::repository::{StorageError, SubmissionRow};

    fn service(fx: &Fixture, clock: Clock) -> SubmissionService {
        SubmissionService::new(
            clock,
            fx.storage.enrollments.clone(),
            fx.storage.assignments.clone(),
            fx.storage.submissions.clone(),
        )
    }

    #[tokio::test]
    async fn resubmit_keeps_one_row_and_old_fields() {
        let fx = Fixture::new().await;
        let a = AssignmentId::new(4);
        let svc = service(&fx, Clock::fixed(fixed_now() - Duration::hours(3)));
        let first = svc
            .submit(
                fx.student,
                a,
                Some("/uploads/draft.pdf".into()),
                Some("first pass".into()),
            )
            .await
            .unwrap();

        let later = service(&fx, fixed_clock());
        let second = later
            .submit(fx.student, a, Some("/uploads/final.pdf".into()), Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(first.submission_id, second.submission_id);

        let row = fx
            .storage
            .submissions
            .get_submission(a, fx.student)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.submission.file_url.as_deref(), Some("/uploads/final.pdf"));
        assert_eq!(row.submission.comment.as_deref(), Some("first pass"));
        assert_eq!(row.submission.submitted_at, Some(fixed_now()));

        let counts = fx
            .storage
            .aggregates
            .submitted_counts_by_user_course()
            .await
            .unwrap();
        assert_eq!(counts.get(&(fx.student, fx.course)), Some(&1));
    }

    #[tokio::test]
    async fn submission_after_due_is_late() {
        let fx = Fixture::new().await;
        let svc = service(&fx, fixed_clock());
        // Assignment 1 was due a day before the fixed clock; 4 has no due date.
        let late = svc
            .submit(fx.student, AssignmentId::new(1), None, None)
            .await
            .unwrap();
        assert!(late.late);
        let undated = svc
            .submit(fx.student, AssignmentId::new(4), None, None)
            .await
            .unwrap();
        assert!(!undated.late);
    }

    #[tokio::test]
    async fn outsiders_cannot_submit() {
        let fx = Fixture::new().await;
        let svc = service(&fx, fixed_clock());
        let err = svc
            .submit(fx.outsider, AssignmentId::new(1), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NotEnrolled { .. }));

        let err = svc
            .submit(fx.student, AssignmentId::new(99), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::AssignmentNotFound(_)));
    }

    #[tokio::test]
    async fn grading_requires_a_hand_in_and_keeps_score_on_resubmit() {
        let fx = Fixture::new().await;
        let svc = service(&fx, fixed_clock());
        let a = AssignmentId::new(2);

        let err = svc.grade(fx.student, a, 70).await.unwrap_err();
        assert!(matches!(err, SubmissionError::NotSubmitted { .. }));

        svc.submit(fx.student, a, None, None).await.unwrap();
        svc.grade(fx.student, a, 70).await.unwrap();
        svc.submit(fx.student, a, None, Some("typo fix".into()))
            .await
            .unwrap();

        let row = fx
            .storage
            .submissions
            .get_submission(a, fx.student)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.submission.score, Some(70));
        assert_eq!(row.submission.graded_at, Some(fixed_now()));
    }

    /// Lets a grader write land right before every hand-in write.
    struct GraderFirst {
        inner: Arc<dyn SubmissionRepository>,
        score: u32,
    }

    #[async_trait::async_trait]
    impl SubmissionRepository for GraderFirst {
        async fn upsert_submission(
            &self,
            submission: &lms_core::model::Submission,
        ) -> Result<SubmissionId, StorageError> {
            self.inner.upsert_submission(submission).await
        }

        async fn record_hand_in(
            &self,
            assignment: AssignmentId,
            user: UserId,
            submitted_at: DateTime<Utc>,
            file_url: Option<&str>,
            comment: Option<&str>,
        ) -> Result<SubmissionId, StorageError> {
            self.inner
                .set_score(assignment, user, self.score, fixed_now())
                .await?;
            self.inner
                .record_hand_in(assignment, user, submitted_at, file_url, comment)
                .await
        }

        async fn get_submission(
            &self,
            assignment: AssignmentId,
            user: UserId,
        ) -> Result<Option<SubmissionRow>, StorageError> {
            self.inner.get_submission(assignment, user).await
        }

        async fn list_submissions_for_user_in_course(
            &self,
            user: UserId,
            course: CourseId,
        ) -> Result<Vec<SubmissionRow>, StorageError> {
            self.inner
                .list_submissions_for_user_in_course(user, course)
                .await
        }

        async fn set_score(
            &self,
            assignment: AssignmentId,
            user: UserId,
            score: u32,
            graded_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.inner
                .set_score(assignment, user, score, graded_at)
                .await
        }
    }

    #[tokio::test]
    async fn resubmit_never_drops_a_grade_written_alongside() {
        let fx = Fixture::new().await;
        let a = AssignmentId::new(2);
        service(&fx, fixed_clock())
            .submit(fx.student, a, Some("/uploads/v1.pdf".into()), None)
            .await
            .unwrap();

        let racing = SubmissionService::new(
            fixed_clock(),
            fx.storage.enrollments.clone(),
            fx.storage.assignments.clone(),
            Arc::new(GraderFirst {
                inner: fx.storage.submissions.clone(),
                score: 88,
            }),
        );
        racing
            .submit(fx.student, a, Some("/uploads/v2.pdf".into()), None)
            .await
            .unwrap();

        let row = fx
            .storage
            .submissions
            .get_submission(a, fx.student)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.submission.score, Some(88));
        assert_eq!(row.submission.file_url.as_deref(), Some("/uploads/v2.pdf"));
    }
}
