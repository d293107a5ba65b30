mod model;

use std::str::FromStr;

use async_trait::async_trait;
use model::ReminderStorageModel;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::reminder::{NewReminder, Reminder, ReminderId};

use super::ReminderStorage;

#[derive(Debug, Error)]
pub enum SqliteReminderError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Reminder does not exist {0}")]
    NotFound(ReminderId),
}

pub struct SqliteReminderStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteReminderStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database at `database_url`, creating the file and the
    /// `emailReminders` table when they do not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteReminderError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let storage = Self::new(pool);
        storage.create_schema().await?;

        log::info!("Connected to reminder database {}", database_url);
        Ok(storage)
    }

    pub async fn create_schema(&self) -> Result<(), SqliteReminderError> {
        sqlx::query(
            "
CREATE TABLE IF NOT EXISTS emailReminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL,
    assignment_title TEXT NOT NULL,
    due_date TEXT NOT NULL,
    reminder_time TEXT NOT NULL,
    sent BOOLEAN NOT NULL DEFAULT 0,
    sent_at TEXT
)
",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_email_reminders_due ON emailReminders (sent, reminder_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_sent_row(&self, id: ReminderId) -> Result<(), SqliteReminderError> {
        let result = sqlx::query(
            "
UPDATE emailReminders
SET sent = 1,
    sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
WHERE id = ?
",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SqliteReminderError::NotFound(id));
        }

        Ok(())
    }
}

#[async_trait]
impl ReminderStorage for SqliteReminderStorage {
    async fn get_due_reminders(&self, now: &str) -> anyhow::Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, ReminderStorageModel>(
            "SELECT * FROM emailReminders WHERE sent = 0 AND reminder_time <= ? ORDER BY id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(SqliteReminderError::from)?;

        Ok(reminders.into_iter().map(Into::into).collect())
    }

    async fn mark_sent(&self, id: ReminderId) -> anyhow::Result<()> {
        self.mark_sent_row(id).await?;
        Ok(())
    }

    async fn insert(&self, reminder: NewReminder) -> anyhow::Result<Reminder> {
        let NewReminder {
            email,
            assignment_title,
            due_date,
            reminder_time,
        } = reminder;

        let created_reminder = sqlx::query_as::<_, ReminderStorageModel>(
            "INSERT INTO emailReminders (email, assignment_title, due_date, reminder_time)
VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(email)
        .bind(assignment_title)
        .bind(due_date)
        .bind(reminder_time)
        .fetch_one(&self.pool)
        .await
        .map_err(SqliteReminderError::from)?;

        Ok(created_reminder.into())
    }

    async fn get(&self, id: ReminderId) -> anyhow::Result<Option<Reminder>> {
        let reminder = sqlx::query_as::<_, ReminderStorageModel>(
            "SELECT * FROM emailReminders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(SqliteReminderError::from)?;

        Ok(reminder.map(Into::into))
    }
}
