use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    clock::Clock,
    reminder::{NewReminder, Reminder, ReminderId, format_timestamp},
};

#[async_trait]
pub trait ReminderStorage: Send + Sync {
    /// Returns every reminder with `sent == false` and `reminder_time <= now`.
    async fn get_due_reminders(&self, now: &str) -> anyhow::Result<Vec<Reminder>>;
    /// Sets `sent` and stamps `sent_at` with the storage's own clock.
    async fn mark_sent(&self, id: ReminderId) -> anyhow::Result<()>;
    async fn insert(&self, reminder: NewReminder) -> anyhow::Result<Reminder>;
    async fn get(&self, id: ReminderId) -> anyhow::Result<Option<Reminder>>;
}

#[derive(Debug, Error)]
pub enum InMemoryReminderError {
    #[error("Reminder does not exist {0}")]
    NotFound(ReminderId),
}

struct InMemoryReminderStore {
    next_id: ReminderId,
    reminders: BTreeMap<ReminderId, Reminder>,
}

pub struct InMemoryReminderStorage {
    store: RwLock<InMemoryReminderStore>,
    clock: Arc<dyn Clock>,
}

impl InMemoryReminderStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        InMemoryReminderStorage {
            store: RwLock::new(InMemoryReminderStore {
                next_id: 1,
                reminders: BTreeMap::new(),
            }),
            clock,
        }
    }
}

#[async_trait]
impl ReminderStorage for InMemoryReminderStorage {
    async fn get_due_reminders(&self, now: &str) -> anyhow::Result<Vec<Reminder>> {
        let store = self.store.read().await;
        let due = store
            .reminders
            .values()
            .filter(|reminder| reminder.is_due(now))
            .cloned()
            .collect();

        Ok(due)
    }

    async fn mark_sent(&self, id: ReminderId) -> anyhow::Result<()> {
        let sent_at = format_timestamp(self.clock.now());
        let mut store = self.store.write().await;
        let reminder = store
            .reminders
            .get_mut(&id)
            .ok_or(InMemoryReminderError::NotFound(id))?;

        reminder.sent = true;
        reminder.sent_at = Some(sent_at);
        Ok(())
    }

    async fn insert(&self, reminder: NewReminder) -> anyhow::Result<Reminder> {
        let mut store = self.store.write().await;
        let id = store.next_id;
        let NewReminder {
            email,
            assignment_title,
            due_date,
            reminder_time,
        } = reminder;
        let created = Reminder {
            id,
            email,
            assignment_title,
            due_date,
            reminder_time,
            sent: false,
            sent_at: None,
        };

        store.reminders.insert(id, created.clone());
        store.next_id += 1;
        log::debug!("Inserted reminder {}", id);
        Ok(created)
    }

    async fn get(&self, id: ReminderId) -> anyhow::Result<Option<Reminder>> {
        let store = self.store.read().await;
        Ok(store.reminders.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::FixedClock;

    fn storage() -> InMemoryReminderStorage {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 9, 0, 5, 0).unwrap());
        InMemoryReminderStorage::new(Arc::new(clock))
    }

    fn new_reminder(reminder_time: &str) -> NewReminder {
        NewReminder {
            email: "a@x.com".to_owned(),
            assignment_title: "HW1".to_owned(),
            due_date: "2024-01-10".to_owned(),
            reminder_time: reminder_time.to_owned(),
        }
    }

    #[tokio::test]
    async fn inserted_reminders_start_unsent_with_sequential_ids() {
        let storage = storage();

        let first = storage.insert(new_reminder("2024-01-09T00:00:00Z")).await.unwrap();
        let second = storage.insert(new_reminder("2024-01-09T00:00:00Z")).await.unwrap();

        assert_eq!(first.id + 1, second.id);
        assert!(!first.sent);
        assert_eq!(first.sent_at, None);
    }

    #[tokio::test]
    async fn due_query_skips_future_and_sent_reminders() {
        let storage = storage();
        let due = storage.insert(new_reminder("2024-01-09T00:00:00Z")).await.unwrap();
        storage.insert(new_reminder("2024-01-10T00:00:00Z")).await.unwrap();
        let sent = storage.insert(new_reminder("2024-01-08T00:00:00Z")).await.unwrap();
        storage.mark_sent(sent.id).await.unwrap();

        let result = storage
            .get_due_reminders("2024-01-09T00:05:00.000Z")
            .await
            .unwrap();

        assert_eq!(result, vec![due]);
    }

    #[tokio::test]
    async fn mark_sent_stamps_sent_at_from_storage_clock() {
        let storage = storage();
        let reminder = storage.insert(new_reminder("2024-01-09T00:00:00Z")).await.unwrap();

        storage.mark_sent(reminder.id).await.unwrap();

        let stored = storage.get(reminder.id).await.unwrap().unwrap();
        assert!(stored.sent);
        assert_eq!(stored.sent_at.as_deref(), Some("2024-01-09T00:05:00.000Z"));
        assert_eq!(stored.reminder_time, reminder.reminder_time);
    }

    #[tokio::test]
    async fn mark_sent_fails_for_unknown_reminder() {
        let storage = storage();

        let error = storage.mark_sent(42).await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<InMemoryReminderError>(),
            Some(InMemoryReminderError::NotFound(42))
        ));
    }
}
