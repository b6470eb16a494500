use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::app::settings::{project_config_dir, Settings, SettingsError};

/// Load `<config dir>/settings.toml`, or defaults when there is none.
pub fn load_settings() -> Result<Settings, SettingsError> {
    match project_config_dir() {
        Some(dir) => load_settings_from(&dir.join("settings.toml")),
        None => Ok(Settings::default()),
    }
}

/// Load settings from `path`. A missing file yields defaults; a malformed
/// one is an error rather than being silently replaced.
pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::settings::save_settings_to;
    use crate::resolve::rule::RewriteRule;
    use crate::resolve::token::UdimPolicy;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn default_rule_matches_the_plain_rule() {
        let rule = Settings::default().rule_defaults(RewriteRule::default());
        assert_eq!(rule, RewriteRule::default());
        assert!(!rule.match_case);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "overwrite = true\nlog_level = \"debug\"\n").unwrap();
        let s = load_settings_from(&path).unwrap();
        assert!(s.overwrite);
        assert_eq!(s.log_level, "debug");
        assert!(s.confirm_apply);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "overwrite = [").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");
        let s = Settings {
            udim: UdimPolicy::Tile(1001),
            show_missing: true,
            ..Settings::default()
        };
        save_settings_to(&s, &path).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), s);
    }
}
