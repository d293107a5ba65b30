mod reminder_storage;
pub mod sqlite;

pub use reminder_storage::{InMemoryReminderError, InMemoryReminderStorage, ReminderStorage};
pub use sqlite::{SqliteReminderError, SqliteReminderStorage};
