use crate::reminder::Reminder;

#[derive(sqlx::FromRow)]
pub struct ReminderStorageModel {
    pub id: i64,
    pub email: String,
    pub assignment_title: String,
    pub due_date: String,
    pub reminder_time: String,
    pub sent: bool,
    pub sent_at: Option<String>,
}

impl From<ReminderStorageModel> for Reminder {
    fn from(value: ReminderStorageModel) -> Self {
        Self {
            id: value.id,
            email: value.email,
            assignment_title: value.assignment_title,
            due_date: value.due_date,
            reminder_time: value.reminder_time,
            sent: value.sent,
            sent_at: value.sent_at,
        }
    }
}
