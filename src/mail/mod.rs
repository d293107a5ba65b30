mod smtp;

pub use smtp::{SmtpMailerError, SmtpReminderMailer};

use async_trait::async_trait;

use crate::reminder::Reminder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReminderEmail {
    pub fn for_reminder(reminder: &Reminder) -> Self {
        Self {
            to: reminder.email.clone(),
            subject: format!("Assignment Reminder: {}", reminder.assignment_title),
            body: format!(
                "Your assignment \"{}\" is due on {}. This is your reminder!",
                reminder.assignment_title, reminder.due_date
            ),
        }
    }
}

#[async_trait]
pub trait ReminderMailer: Send + Sync {
    async fn send(&self, email: &ReminderEmail) -> anyhow::Result<()>;
}
