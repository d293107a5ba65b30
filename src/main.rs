use std::sync::Arc;

use anyhow::Context;
use assignment_reminders::{
    appsettings::AppSettings,
    clock::SystemClock,
    dispatch::ReminderDispatcher,
    mail::SmtpReminderMailer,
    scheduling::DispatchSchedule,
    storage::SqliteReminderStorage,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load().context("Failed to load app settings")?;

    let storage = SqliteReminderStorage::connect(&settings.storage.database_url)
        .await
        .context("Failed to open reminder storage")?;
    let mailer = SmtpReminderMailer::new(&settings.smtp).context("Failed to set up SMTP mailer")?;

    let dispatcher = ReminderDispatcher::new(
        Arc::new(storage),
        Arc::new(mailer),
        Arc::new(SystemClock),
    )
    .with_max_in_flight(settings.dispatch.max_in_flight);

    let shutdown = CancellationToken::new();
    let schedule = DispatchSchedule::new(Arc::new(dispatcher), settings.dispatch.interval())
        .spawn(shutdown.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutdown requested, waiting for the current tick to finish");

    shutdown.cancel();
    schedule.await?;

    Ok(())
}
