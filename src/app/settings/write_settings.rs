use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::settings::{project_config_dir, SettingsError};
use crate::fs_op::helpers::atomic_write;
use crate::graph::Filters;
use crate::resolve::rule::RewriteRule;
use crate::resolve::token::UdimPolicy;

/// User settings, stored as TOML. Every field has a default so partial
/// files are fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub match_case: bool,
    pub match_raw: bool,
    pub preserve_relative_structure: bool,
    pub overwrite: bool,
    pub show_empty: bool,
    pub show_missing: bool,
    /// How `<UDIM>` expands when a scene does not say.
    pub udim: UdimPolicy,
    /// Filter directive used when `PATHZOOM_LOG` is unset.
    pub log_level: String,
    pub log_to_file: bool,
    /// Ask before applying a batch.
    pub confirm_apply: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_case: false,
            match_raw: false,
            preserve_relative_structure: false,
            overwrite: false,
            show_empty: false,
            show_missing: false,
            udim: UdimPolicy::Keep,
            log_level: "warn".to_string(),
            log_to_file: false,
            confirm_apply: true,
        }
    }
}

impl Settings {
    /// A rule seeded with the configured defaults.
    pub fn rule_defaults(&self, mut rule: RewriteRule) -> RewriteRule {
        rule.match_case = self.match_case;
        rule.match_raw = self.match_raw;
        rule.preserve_relative_structure = self.preserve_relative_structure;
        rule.overwrite = self.overwrite;
        rule
    }

    /// Filters seeded with the configured defaults.
    pub fn filter_defaults(&self, mut filters: Filters) -> Filters {
        filters.show_empty = self.show_empty;
        filters.show_missing = self.show_missing;
        filters
    }
}

/// Persist `settings` to `<config dir>/settings.toml`.
pub fn save_settings(settings: &Settings) -> Result<(), SettingsError> {
    let dir = project_config_dir().ok_or(SettingsError::NoConfigDir)?;
    save_settings_to(settings, &dir.join("settings.toml"))
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    let text = toml::to_string_pretty(settings)?;
    atomic_write(path, text.as_bytes()).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
