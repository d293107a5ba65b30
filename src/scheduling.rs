use std::{sync::Arc, time::Duration};

use tokio::{
    task::{self, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchError, ReminderDispatcher};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs the dispatcher on a fixed cadence until cancelled.
///
/// The first tick fires immediately. Ticks never overlap: a slow tick pushes
/// the next one back and missed ticks are skipped.
pub struct DispatchSchedule {
    dispatcher: Arc<ReminderDispatcher>,
    interval: Duration,
}

impl DispatchSchedule {
    pub fn new(dispatcher: Arc<ReminderDispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        task::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        log::info!("Dispatching reminders every {:?}", self.interval);
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("Dispatch schedule shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            };
        }
    }

    async fn tick(&self) {
        let result = self
            .dispatcher
            .run()
            .await
            .and_then(|report| report.into_result());

        match result {
            Ok(report) if report.is_empty() => {
                log::debug!("No reminders due. [now = {}]", report.now)
            }
            Ok(report) => log::info!(
                "Dispatched {} reminders. [now = {}]",
                report.sent_count(),
                report.now
            ),
            Err(error @ DispatchError::Query(_)) => {
                log::error!("Dispatch tick aborted. {}", error)
            }
            Err(error) => log::error!("Dispatch tick failed. {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        clock::FixedClock,
        mail::{ReminderEmail, ReminderMailer},
        reminder::NewReminder,
        storage::{InMemoryReminderStorage, ReminderStorage},
    };

    #[derive(Clone, Default)]
    struct RecordingMailer {
        recipients: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ReminderMailer for RecordingMailer {
        async fn send(&self, email: &ReminderEmail) -> anyhow::Result<()> {
            self.recipients.lock().unwrap().push(email.to.clone());
            Ok(())
        }
    }

    struct TestContext {
        recipients: Arc<Mutex<Vec<String>>>,
        storage: Arc<InMemoryReminderStorage>,
        dispatcher: Arc<ReminderDispatcher>,
    }

    impl TestContext {
        fn new() -> Self {
            let clock = Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 1, 9, 0, 5, 0).unwrap(),
            ));
            let storage = Arc::new(InMemoryReminderStorage::new(clock.clone()));
            let mailer = RecordingMailer::default();
            let recipients = mailer.recipients.clone();
            let dispatcher = Arc::new(ReminderDispatcher::new(
                storage.clone(),
                Arc::new(mailer),
                clock,
            ));

            Self {
                recipients,
                storage,
                dispatcher,
            }
        }

        async fn insert_due(&self, email: &str) {
            self.storage
                .insert(NewReminder {
                    email: email.to_owned(),
                    assignment_title: "HW1".to_owned(),
                    due_date: "2024-01-10".to_owned(),
                    reminder_time: "2024-01-09T00:00:00Z".to_owned(),
                })
                .await
                .unwrap();
        }

        fn recipients(&self) -> Vec<String> {
            self.recipients.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_immediately_then_every_interval() {
        let ctx = TestContext::new();
        ctx.insert_due("a@x.com").await;
        let shutdown = CancellationToken::new();
        let handle = DispatchSchedule::new(ctx.dispatcher.clone(), Duration::from_secs(60))
            .spawn(shutdown.clone());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ctx.recipients(), vec!["a@x.com"]);

        ctx.insert_due("b@x.com").await;
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctx.recipients(), vec!["a@x.com"]);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctx.recipients(), vec!["a@x.com", "b@x.com"]);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_schedule_stops_dispatching() {
        let ctx = TestContext::new();
        let shutdown = CancellationToken::new();
        let handle = DispatchSchedule::new(ctx.dispatcher.clone(), Duration::from_secs(60))
            .spawn(shutdown.clone());

        time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        handle.await.unwrap();

        ctx.insert_due("a@x.com").await;
        time::sleep(Duration::from_secs(300)).await;

        assert!(ctx.recipients().is_empty());
    }
}
