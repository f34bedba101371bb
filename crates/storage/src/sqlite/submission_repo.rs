use chrono::{DateTime, Utc};
use lms_core::model::{AssignmentId, CourseId, Submission, SubmissionId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_submission_row, submission_id_from_i64};
use crate::repository::{StorageError, SubmissionRepository, SubmissionRow};

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn upsert_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionId, StorageError> {
        let now = Utc::now();
        // The unique (user_id, assignment_id) index makes this atomic under concurrent writers.
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO submissions (
                assignment_id, user_id, submitted_at, score,
                file_url, comment, graded_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, assignment_id) DO UPDATE SET
                submitted_at = excluded.submitted_at,
                score = excluded.score,
                file_url = excluded.file_url,
                comment = excluded.comment,
                graded_at = excluded.graded_at,
                updated_at = excluded.created_at
            RETURNING id
            ",
        )
        .bind(id_i64("assignment_id", submission.assignment_id.value())?)
        .bind(id_i64("user_id", submission.user_id.value())?)
        .bind(submission.submitted_at)
        .bind(submission.score.map(i64::from))
        .bind(submission.file_url.as_deref())
        .bind(submission.comment.as_deref())
        .bind(submission.graded_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        submission_id_from_i64(id)
    }

    async fn record_hand_in(
        &self,
        assignment: AssignmentId,
        user: UserId,
        submitted_at: DateTime<Utc>,
        file_url: Option<&str>,
        comment: Option<&str>,
    ) -> Result<SubmissionId, StorageError> {
        // score and graded_at are left out so a concurrent grade is never overwritten.
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO submissions (
                assignment_id, user_id, submitted_at, file_url, comment, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, assignment_id) DO UPDATE SET
                submitted_at = excluded.submitted_at,
                file_url = COALESCE(excluded.file_url, file_url),
                comment = COALESCE(excluded.comment, comment),
                updated_at = excluded.created_at
            RETURNING id
            ",
        )
        .bind(id_i64("assignment_id", assignment.value())?)
        .bind(id_i64("user_id", user.value())?)
        .bind(submitted_at)
        .bind(file_url)
        .bind(comment)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        submission_id_from_i64(id)
    }

    async fn get_submission(
        &self,
        assignment: AssignmentId,
        user: UserId,
    ) -> Result<Option<SubmissionRow>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, assignment_id, user_id, submitted_at, score, file_url, comment, graded_at
            FROM submissions
            WHERE assignment_id = ?1 AND user_id = ?2
            ",
        )
        .bind(id_i64("assignment_id", assignment.value())?)
        .bind(id_i64("user_id", user.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_submission_row).transpose()
    }

    async fn list_submissions_for_user_in_course(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT s.id, s.assignment_id, s.user_id, s.submitted_at, s.score,
                   s.file_url, s.comment, s.graded_at
            FROM submissions s
            JOIN assignments a ON a.id = s.assignment_id
            WHERE s.user_id = ?1 AND a.course_id = ?2
            ORDER BY s.assignment_id ASC
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("course_id", course.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_submission_row).collect()
    }

    async fn set_score(
        &self,
        assignment: AssignmentId,
        user: UserId,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE submissions
            SET score = ?3, graded_at = ?4, updated_at = ?4
            WHERE assignment_id = ?1 AND user_id = ?2
            ",
        )
        .bind(id_i64("assignment_id", assignment.value())?)
        .bind(id_i64("user_id", user.value())?)
        .bind(i64::from(score))
        .bind(graded_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
