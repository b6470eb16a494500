use std::io;
use std::path::PathBuf;

use directories_next::ProjectDirs;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "pathZoom")
}

/// Per-user configuration directory (`settings.toml`, `session.toml`).
pub fn project_config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Per-user cache directory, home of the log files.
pub fn user_cache_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.cache_dir().to_path_buf())
}

/// Create the config and cache directories if they are missing.
pub fn ensure_dirs_exist() -> io::Result<()> {
    for dir in [project_config_dir(), user_cache_dir()].into_iter().flatten() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
