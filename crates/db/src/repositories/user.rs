use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use salonbook_core::domain::user::{AccountRole, User, UserId};
use salonbook_core::errors::RepositoryError;
use salonbook_core::repository::UserRepository;

use super::{column, format_timestamp, parse_timestamp, storage};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role: String = column(row, "role")?;
    let role = AccountRole::parse(&role)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown account role `{role}`")))?;

    Ok(User {
        id: UserId(column(row, "id")?),
        name: column(row, "name")?,
        email: column(row, "email")?,
        role,
        created_at: parse_timestamp("created_at", column(row, "created_at")?)?,
    })
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role, created_at FROM user_account WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, role, created_at FROM user_account
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(row_to_user).collect()
    }

    async fn find_earliest_admin(&self) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, role, created_at FROM user_account
             WHERE role = 'admin'
             ORDER BY created_at ASC, id ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_account (id, name, email, role, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(format_timestamp(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}
