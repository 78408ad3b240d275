use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, query, query_as, sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{
    error::StoreError,
    model::{User, UserId},
};

/// A user aggregate together with the version it was read at.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub version: i64,
}

/// Whole-aggregate persistence. There are no operations on a single list or
/// task; callers always write back the complete user.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, id: &UserId) -> Result<Option<StoredUser>, StoreError>;

    /// Returns `false` when a user with the same id already exists.
    async fn insert(&self, user: &User) -> Result<bool, StoreError>;

    /// Returns `false` when the stored version no longer matches
    /// `expected_version`, in which case nothing was written.
    async fn update(&self, user: &User, expected_version: i64) -> Result<bool, StoreError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    task_lists: String,
    version: i64,
}

impl TryFrom<UserRow> for StoredUser {
    type Error = serde_json::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: UserId::new(row.id),
                display_name: row.display_name,
                task_lists: serde_json::from_str(&row.task_lists)?,
            },
            version: row.version,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Opens (creating it if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            tracing::info!(database_url, "creating database");
            Sqlite::create_database(database_url).await?;
        } else {
            tracing::debug!(database_url, "database already exists");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        tracing::info!("connection to the database is successful");

        Ok(Self::new(pool))
    }

    /// Creates the `users` table if it doesn't exist.
    pub async fn init(&self) -> Result<(), StoreError> {
        query(
            r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            display_name TEXT NOT NULL,
            task_lists TEXT NOT NULL DEFAULT '[]',
            version INTEGER NOT NULL DEFAULT 0
        );"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Waits for open connections to be returned and closes them. Any call
    /// made afterwards fails with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find(&self, id: &UserId) -> Result<Option<StoredUser>, StoreError> {
        let row = query_as::<_, UserRow>(
            "SELECT id, display_name, task_lists, version FROM users WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(StoredUser::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, user: &User) -> Result<bool, StoreError> {
        let task_lists = serde_json::to_string(&user.task_lists)?;
        let rows_affected = query(
            "INSERT INTO users (id, display_name, task_lists, version) VALUES (?, ?, ?, 0) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(user.id.as_str())
        .bind(user.display_name.as_str())
        .bind(task_lists)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected == 1)
    }

    async fn update(&self, user: &User, expected_version: i64) -> Result<bool, StoreError> {
        let task_lists = serde_json::to_string(&user.task_lists)?;
        let rows_affected = query(
            "UPDATE users SET display_name = ?, task_lists = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(user.display_name.as_str())
        .bind(task_lists)
        .bind(user.id.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected == 1)
    }
}
