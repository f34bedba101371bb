use chrono::{DateTime, Utc};
use lms_core::model::{
    Assignment, AssignmentId, Course, CourseId, Role, Submission, SubmissionId, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, SubmissionRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn assignment_id_from_i64(v: i64) -> Result<AssignmentId, StorageError> {
    Ok(AssignmentId::new(i64_to_u64("assignment_id", v)?))
}

pub(crate) fn submission_id_from_i64(v: i64) -> Result<SubmissionId, StorageError> {
    Ok(SubmissionId::new(i64_to_u64("submission_id", v)?))
}

pub(crate) fn opt_u32(field: &'static str, v: Option<i64>) -> Result<Option<u32>, StorageError> {
    v.map(|n| u32_from_i64(field, n)).transpose()
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    User::new(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
        Role::parse(&role).map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Course::new(
        course_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_assignment_row(row: &SqliteRow) -> Result<Assignment, StorageError> {
    Assignment::new(
        assignment_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("due_at")
            .map_err(ser)?,
        opt_u32("total_score", row.try_get("total_score").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_submission_row(row: &SqliteRow) -> Result<SubmissionRow, StorageError> {
    Ok(SubmissionRow {
        id: submission_id_from_i64(row.try_get("id").map_err(ser)?)?,
        submission: Submission {
            assignment_id: assignment_id_from_i64(row.try_get("assignment_id").map_err(ser)?)?,
            user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
            submitted_at: row.try_get("submitted_at").map_err(ser)?,
            score: opt_u32("score", row.try_get("score").map_err(ser)?)?,
            file_url: row.try_get("file_url").map_err(ser)?,
            comment: row.try_get("comment").map_err(ser)?,
            graded_at: row.try_get("graded_at").map_err(ser)?,
        },
    })
}
