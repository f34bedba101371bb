use lms_core::model::{Assignment, AssignmentId, CourseId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_assignment_row};
use crate::repository::{AssignmentRepository, StorageError};

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO assignments (id, course_id, title, due_at, total_score)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                due_at = excluded.due_at,
                total_score = excluded.total_score
            ",
        )
        .bind(id_i64("assignment_id", assignment.id().value())?)
        .bind(id_i64("course_id", assignment.course_id().value())?)
        .bind(assignment.title())
        .bind(assignment.due_at())
        .bind(assignment.total_score().map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        let row = sqlx::query(
            "SELECT id, course_id, title, due_at, total_score FROM assignments WHERE id = ?1",
        )
        .bind(id_i64("assignment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_assignment_row).transpose()
    }

    async fn list_assignments_for_course(
        &self,
        course: CourseId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, due_at, total_score
            FROM assignments
            WHERE course_id = ?1
            ORDER BY due_at IS NULL, due_at ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", course.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_assignment_row).collect()
    }
}
