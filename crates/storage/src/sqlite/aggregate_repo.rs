use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lms_core::metrics::MonthBucket;
use lms_core::model::{CourseId, Enrollment, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    assignment_id_from_i64, conn, course_id_from_i64, id_i64, opt_u32, ser, u32_from_i64,
    user_id_from_i64,
};
use crate::repository::{AggregateQueries, CourseProgressRow, GradedScore, StorageError};

const GRADED_SELECT: &str = r"
    SELECT s.user_id, a.course_id, s.assignment_id, s.score, a.total_score
    FROM submissions s
    JOIN assignments a ON a.id = s.assignment_id
    WHERE s.score IS NOT NULL
";

fn map_graded_row(row: &SqliteRow) -> Result<GradedScore, StorageError> {
    let score: i64 = row.try_get("score").map_err(ser)?;
    Ok(GradedScore {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        assignment_id: assignment_id_from_i64(row.try_get("assignment_id").map_err(ser)?)?,
        score: u32_from_i64("score", score)?,
        total_score: opt_u32("total_score", row.try_get("total_score").map_err(ser)?)?,
    })
}

fn count_from_row(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get("n").map_err(ser)?)
}

impl SqliteRepository {
    async fn course_counts(&self, sql: &str) -> Result<HashMap<CourseId, u32>, StorageError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let course = course_id_from_i64(row.try_get("course_id").map_err(ser)?)?;
            out.insert(course, count_from_row(&row, "count")?);
        }
        Ok(out)
    }

    async fn user_counts(&self, sql: &str) -> Result<HashMap<UserId, u32>, StorageError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let user = user_id_from_i64(row.try_get("user_id").map_err(ser)?)?;
            out.insert(user, count_from_row(&row, "count")?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl AggregateQueries for SqliteRepository {
    async fn assignment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
        self.course_counts(
            "SELECT course_id, COUNT(*) AS n FROM assignments GROUP BY course_id",
        )
        .await
    }

    async fn enrollment_counts_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
        self.course_counts(
            "SELECT course_id, COUNT(*) AS n FROM enrollments GROUP BY course_id",
        )
        .await
    }

    async fn enrollment_pairs(&self) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            "SELECT user_id, course_id FROM enrollments ORDER BY user_id ASC, course_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Enrollment::new(
                user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
                course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
            ));
        }
        Ok(out)
    }

    async fn submitted_counts_by_user_course(
        &self,
    ) -> Result<HashMap<(UserId, CourseId), u32>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT s.user_id, a.course_id, COUNT(DISTINCT s.assignment_id) AS n
            FROM submissions s
            JOIN assignments a ON a.id = s.assignment_id
            WHERE s.submitted_at IS NOT NULL
            GROUP BY s.user_id, a.course_id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let user = user_id_from_i64(row.try_get("user_id").map_err(ser)?)?;
            let course = course_id_from_i64(row.try_get("course_id").map_err(ser)?)?;
            out.insert((user, course), count_from_row(&row, "submission count")?);
        }
        Ok(out)
    }

    async fn enrolled_progress_by_course(
        &self,
        user: UserId,
    ) -> Result<Vec<CourseProgressRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                e.course_id,
                (SELECT COUNT(*) FROM assignments a WHERE a.course_id = e.course_id) AS total,
                (
                    SELECT COUNT(DISTINCT s.assignment_id)
                    FROM submissions s
                    JOIN assignments a ON a.id = s.assignment_id
                    WHERE a.course_id = e.course_id
                      AND s.user_id = e.user_id
                      AND s.submitted_at IS NOT NULL
                ) AS submitted
            FROM enrollments e
            WHERE e.user_id = ?1
            ORDER BY e.course_id ASC
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(CourseProgressRow {
                course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
                total_assignments: u32_from_i64("total", row.try_get("total").map_err(ser)?)?,
                submitted_assignments: u32_from_i64(
                    "submitted",
                    row.try_get("submitted").map_err(ser)?,
                )?,
            });
        }
        Ok(out)
    }

    async fn expected_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError> {
        self.user_counts(
            r"
            SELECT e.user_id, COUNT(a.id) AS n
            FROM enrollments e
            JOIN assignments a ON a.course_id = e.course_id
            GROUP BY e.user_id
            ",
        )
        .await
    }

    async fn submitted_by_user(&self) -> Result<HashMap<UserId, u32>, StorageError> {
        self.user_counts(
            r"
            SELECT user_id, COUNT(*) AS n
            FROM submissions
            WHERE submitted_at IS NOT NULL
            GROUP BY user_id
            ",
        )
        .await
    }

    async fn graded_scores(&self) -> Result<Vec<GradedScore>, StorageError> {
        let sql = format!("{GRADED_SELECT} ORDER BY s.id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_graded_row).collect()
    }

    async fn graded_scores_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<GradedScore>, StorageError> {
        let sql = format!("{GRADED_SELECT} AND s.user_id = ?1 ORDER BY s.id ASC");
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_graded_row).collect()
    }

    async fn monthly_submission_counts(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<MonthBucket, u32>, StorageError> {
        // Timestamps are stored as RFC 3339 text, so filter on parsed values.
        let rows = sqlx::query(
            r"
            SELECT
                CAST(strftime('%Y', submitted_at) AS INTEGER) AS year,
                CAST(strftime('%m', submitted_at) AS INTEGER) AS month,
                COUNT(*) AS n
            FROM submissions
            WHERE submitted_at IS NOT NULL
              AND julianday(submitted_at) >= julianday(?1)
              AND julianday(submitted_at) < julianday(?2)
            GROUP BY year, month
            ",
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let year: i64 = row.try_get("year").map_err(ser)?;
            let month: i64 = row.try_get("month").map_err(ser)?;
            let bucket = i32::try_from(year)
                .ok()
                .zip(u32::try_from(month).ok())
                .and_then(|(y, m)| MonthBucket::new(y, m))
                .ok_or_else(|| StorageError::Serialization(format!("invalid month {year}-{month}")))?;
            out.insert(bucket, count_from_row(&row, "monthly count")?);
        }
        Ok(out)
    }

    async fn submitted_count_for_user(&self, user: UserId) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions WHERE user_id = ?1 AND submitted_at IS NOT NULL",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;
        u32_from_i64("submission count", n)
    }

    async fn active_course_count(&self) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT course_id) FROM enrollments")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u32_from_i64("course count", n)
    }
}
