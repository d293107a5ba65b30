use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// How the SMTP connection is secured.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// TLS from the first byte, usually port 465.
    Implicit,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    Starttls,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub database_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DispatchSettings {
    pub interval_secs: u64,
    pub max_in_flight: usize,
}

impl DispatchSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub smtp: SmtpSettings,
    pub storage: StorageSettings,
    pub dispatch: DispatchSettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("smtp.host", "smtp.gmail.com")?
            .set_default("smtp.port", 465)?
            .set_default("smtp.tls", "implicit")?
            .set_default("storage.database_url", "sqlite://reminders.db")?
            .set_default("dispatch.interval_secs", 60)?
            .set_default("dispatch.max_in_flight", 16)
    }
}
