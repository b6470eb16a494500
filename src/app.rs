//! Persistent user state: settings and the last session.

pub mod session;
pub mod settings;

pub use session::{session_path, Session};
pub use settings::{load_settings, save_settings, Settings, SettingsError};
