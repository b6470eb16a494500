//! The last-used rule and filters, persisted between runs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::settings::{project_config_dir, SettingsError};
use crate::fs_op::helpers::atomic_write;
use crate::graph::Filters;
use crate::resolve::rule::RewriteRule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub rule: RewriteRule,
    pub filters: Filters,
}

/// `<config dir>/session.toml`.
pub fn session_path() -> Option<PathBuf> {
    project_config_dir().map(|d| d.join("session.toml"))
}

impl Session {
    /// Load a session; a missing file is an empty session.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = toml::to_string_pretty(self)?;
        atomic_write(path, text.as_bytes()).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
