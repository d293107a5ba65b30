pub mod appsettings;
pub mod clock;
pub mod dispatch;
pub mod mail;
pub mod reminder;
pub mod scheduling;
pub mod storage;
