use chrono::{DateTime, SecondsFormat, Utc};

pub type ReminderId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub email: String,
    pub assignment_title: String,
    pub due_date: String,
    pub reminder_time: String,
    pub sent: bool,
    pub sent_at: Option<String>,
}

impl Reminder {
    /// A reminder is due once its time is reached and it has not been sent yet.
    ///
    /// Timestamps are compared as strings, which only orders them
    /// chronologically when every stored value uses the same fixed-width
    /// RFC 3339 format.
    pub fn is_due(&self, now: &str) -> bool {
        !self.sent && self.reminder_time.as_str() <= now
    }
}

pub struct NewReminder {
    pub email: String,
    pub assignment_title: String,
    pub due_date: String,
    pub reminder_time: String,
}

/// Renders a point in time the same way reminder times are stored,
/// e.g. `2024-01-09T00:05:00.000Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
