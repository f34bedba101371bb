use chrono::Utc;
use lms_core::model::{Role, User, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_user_row, ser, u32_from_i64, user_id_from_i64};
use crate::repository::{StorageError, UserIdentity, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (id, name, email, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role
            ",
        )
        .bind(id_i64("user_id", user.id().value())?)
        .bind(user.name())
        .bind(user.email())
        .bind(user.role().as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE id = ?1")
            .bind(id_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, email, role FROM users WHERE role = ?1 ORDER BY id ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_user_row(&row)?);
        }
        Ok(out)
    }

    async fn list_enrolled_users(&self) -> Result<Vec<UserIdentity>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT u.id, u.name, u.email
            FROM users u
            JOIN enrollments e ON e.user_id = u.id
            GROUP BY u.id, u.name, u.email
            ORDER BY u.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(UserIdentity {
                id: user_id_from_i64(row.try_get("id").map_err(ser)?)?,
                name: row.try_get("name").map_err(ser)?,
                email: row.try_get("email").map_err(ser)?,
            });
        }
        Ok(out)
    }

    async fn count_users(&self) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u32_from_i64("user count", n)
    }
}
