use chrono::Utc;
use lms_core::model::{Course, CourseId, Enrollment, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_course_row, u32_from_i64};
use crate::repository::{CourseRepository, EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, title, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(id_i64("course_id", course.id().value())?)
        .bind(course.title())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query("SELECT id, title FROM courses WHERE id = ?1")
            .bind(id_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query("SELECT id, title FROM courses ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_course_row).collect()
    }

    async fn list_courses_for_user(
        &self,
        user: UserId,
        title_filter: Option<&str>,
    ) -> Result<Vec<Course>, StorageError> {
        let needle = title_filter.map(str::trim).filter(|s| !s.is_empty());

        let mut sql = String::from(
            r"
                SELECT c.id, c.title
                FROM courses c
                JOIN enrollments e ON e.course_id = c.id
                WHERE e.user_id = ?1
            ",
        );
        if needle.is_some() {
            // Literal match: `%` and `_` in the needle are not wildcards.
            sql.push_str(" AND instr(lower(c.title), lower(?2)) > 0");
        }
        sql.push_str(" ORDER BY c.title ASC, c.id ASC");

        let mut query = sqlx::query(&sql).bind(id_i64("user_id", user.value())?);
        if let Some(needle) = needle {
            query = query.bind(needle);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_course_row).collect()
    }
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", enrollment.user_id.value())?)
        .bind(id_i64("course_id", enrollment.course_id.value())?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn is_enrolled(&self, user: UserId, course: CourseId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM enrollments WHERE user_id = ?1 AND course_id = ?2")
            .bind(id_i64("user_id", user.value())?)
            .bind(id_i64("course_id", course.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn count_enrollments_for_user(&self, user: UserId) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = ?1")
            .bind(id_i64("user_id", user.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u32_from_i64("enrollment count", n)
    }
}
