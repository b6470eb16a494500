pub mod config_dirs;
pub mod read_settings;
pub mod write_settings;

use std::path::PathBuf;
use thiserror::Error;

// Re-export commonly used types/functions for convenience
pub use config_dirs::{ensure_dirs_exist, project_config_dir, user_cache_dir};
pub use read_settings::{load_settings, load_settings_from};
pub use write_settings::{save_settings, save_settings_to, Settings};

/// Failures reading or writing the settings and session files.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine a configuration directory")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}
