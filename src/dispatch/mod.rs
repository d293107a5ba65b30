use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tokio::task::{self, JoinError, JoinSet};

use crate::{
    clock::Clock,
    mail::{ReminderEmail, ReminderMailer},
    reminder::{Reminder, ReminderId, format_timestamp},
    storage::ReminderStorage,
};

const DEFAULT_MAX_IN_FLIGHT: usize = 16;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to query due reminders: {0:#}")]
    Query(#[source] anyhow::Error),

    #[error("{failed} of {total} due reminders were not dispatched")]
    Incomplete { failed: usize, total: usize },
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Email sent and reminder marked as sent.
    Sent,
    /// Email was not sent; the reminder is left untouched for the next tick.
    SendFailed(anyhow::Error),
    /// Email was sent but the reminder is still unsent in storage, so the next
    /// tick sends it again.
    MarkFailed(anyhow::Error),
    TaskFailed(JoinError),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

#[derive(Debug)]
pub struct DispatchedReminder {
    pub id: ReminderId,
    pub outcome: DispatchOutcome,
}

#[derive(Debug)]
pub struct DispatchReport {
    /// The "now" the due query was run with.
    pub now: String,
    pub reminders: Vec<DispatchedReminder>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn sent_count(&self) -> usize {
        self.reminders.iter().filter(|r| r.outcome.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.reminders.len() - self.sent_count()
    }

    /// Fails the whole tick if any reminder was not dispatched, even though the
    /// other reminders are already marked as sent.
    pub fn into_result(self) -> Result<Self, DispatchError> {
        let failed = self.failed_count();
        if failed > 0 {
            return Err(DispatchError::Incomplete {
                failed,
                total: self.reminders.len(),
            });
        }

        Ok(self)
    }
}

pub struct ReminderDispatcher {
    storage: Arc<dyn ReminderStorage>,
    mailer: Arc<dyn ReminderMailer>,
    clock: Arc<dyn Clock>,
    max_in_flight: usize,
}

impl ReminderDispatcher {
    pub fn new(
        storage: Arc<dyn ReminderStorage>,
        mailer: Arc<dyn ReminderMailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            mailer,
            clock,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Runs one dispatch tick: sends an email for every due reminder and marks
    /// each successfully mailed reminder as sent.
    ///
    /// Reminders are processed concurrently and independently. The call
    /// returns once every reminder has settled.
    pub async fn run(&self) -> Result<DispatchReport, DispatchError> {
        let now = format_timestamp(self.clock.now());
        let due = self
            .storage
            .get_due_reminders(&now)
            .await
            .map_err(DispatchError::Query)?;

        log::debug!("Found {} due reminders. [now = {}]", due.len(), now);

        let mut tasks = JoinSet::new();
        let mut task_reminders = HashMap::with_capacity(due.len());
        let mut reminders = Vec::with_capacity(due.len());

        for reminder in due {
            if tasks.len() >= self.max_in_flight {
                if let Some(result) = tasks.join_next_with_id().await {
                    reminders.push(settle(result, &task_reminders));
                }
            }

            let id = reminder.id;
            let storage = Arc::clone(&self.storage);
            let mailer = Arc::clone(&self.mailer);
            let handle = tasks.spawn(async move {
                dispatch_reminder(reminder, storage.as_ref(), mailer.as_ref()).await
            });
            task_reminders.insert(handle.id(), id);
        }

        while let Some(result) = tasks.join_next_with_id().await {
            reminders.push(settle(result, &task_reminders));
        }

        reminders.sort_by_key(|r| r.id);
        Ok(DispatchReport { now, reminders })
    }
}

async fn dispatch_reminder(
    reminder: Reminder,
    storage: &dyn ReminderStorage,
    mailer: &dyn ReminderMailer,
) -> DispatchOutcome {
    let email = ReminderEmail::for_reminder(&reminder);

    if let Err(error) = mailer.send(&email).await {
        log::warn!(
            "Failed to send reminder email. [reminder_id = {}, error = {:#}]",
            reminder.id,
            error
        );
        return DispatchOutcome::SendFailed(error);
    }

    if let Err(error) = storage.mark_sent(reminder.id).await {
        log::error!(
            "Reminder email was sent but the reminder was not marked as sent. [reminder_id = {}, error = {:#}]",
            reminder.id,
            error
        );
        return DispatchOutcome::MarkFailed(error);
    }

    log::info!("Sent reminder email. [reminder_id = {}]", reminder.id);
    DispatchOutcome::Sent
}

fn settle(
    result: Result<(task::Id, DispatchOutcome), JoinError>,
    task_reminders: &HashMap<task::Id, ReminderId>,
) -> DispatchedReminder {
    match result {
        Ok((task_id, outcome)) => DispatchedReminder {
            id: task_reminders[&task_id],
            outcome,
        },
        Err(error) => {
            let id = task_reminders[&error.id()];
            log::error!(
                "Reminder task failed. [reminder_id = {}, error = {}]",
                id,
                error
            );
            DispatchedReminder {
                id,
                outcome: DispatchOutcome::TaskFailed(error),
            }
        }
    }
}
