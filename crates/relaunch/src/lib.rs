//! The Relaunch application: start-up update check, prompt, and handoff to
//! the standalone updater.

pub mod app;
pub mod error;
pub mod prompt;
pub mod settings;

pub use app::{App, StartupAction};
pub use error::AppError;
pub use prompt::{AutoConfirm, TerminalPrompt, UpdatePrompt};
pub use settings::{AppSettings, SettingsError};
