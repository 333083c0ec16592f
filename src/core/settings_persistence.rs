//! Settings persistence
//!
//! Saves and loads [`GameSettings`] to/from a JSON file so user preferences
//! survive between runs.
//!
//! # File Location
//!
//! Settings live in `settings.json` inside the platform config directory
//! resolved by `directories::ProjectDirs`, e.g.
//! `~/.config/xfchess/settings.json` on Linux. When no config directory can be
//! resolved the file is read from and written to the working directory.
//!
//! # Error Handling
//!
//! - Load failures fall back to default settings
//! - Save failures are logged and returned, never panicked on

use crate::core::error::CoreResult;
use crate::core::GameSettings;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Settings filename
const SETTINGS_FILENAME: &str = "settings.json";

/// Resolve the settings file path
///
/// Returns a path to `settings.json` in the user's configuration directory,
/// falling back to a local `settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "trilltino", "XFChess") {
        proj_dirs.config_dir().join(SETTINGS_FILENAME)
    } else {
        PathBuf::from(SETTINGS_FILENAME)
    }
}

/// Load settings from the default location
pub fn load_settings() -> GameSettings {
    load_settings_from(&settings_path())
}

/// Load settings from `path`, using defaults if the file is missing or invalid
pub fn load_settings_from(path: &Path) -> GameSettings {
    if !path.exists() {
        info!("[SETTINGS] No settings file found at {:?}. Using defaults.", path);
        return GameSettings::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<GameSettings>(&contents) {
            Ok(settings) => {
                info!("[SETTINGS] Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!(
                    "[SETTINGS] Failed to parse settings file at {:?}: {}. Using defaults.",
                    path, e
                );
                GameSettings::default()
            }
        },
        Err(e) => {
            warn!(
                "[SETTINGS] Failed to read settings file at {:?}: {}. Using defaults.",
                path, e
            );
            GameSettings::default()
        }
    }
}

/// Save settings to the default location
pub fn save_settings(settings: &GameSettings) -> CoreResult<()> {
    save_settings_to(settings, &settings_path())
}

/// Save settings to `path`, creating parent directories as needed
pub fn save_settings_to(settings: &GameSettings, path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(
                    "[SETTINGS] Failed to create settings directory at {:?}: {}",
                    parent, e
                );
                return Err(e.into());
            }
        }
    }

    let json = serde_json::to_string_pretty(settings).map_err(|e| {
        error!("[SETTINGS] Failed to serialize settings: {}", e);
        e
    })?;

    fs::write(path, json).map_err(|e| {
        error!("[SETTINGS] Failed to write settings file at {:?}: {}", path, e);
        e
    })?;

    info!("[SETTINGS] Saved settings to {:?}", path);
    Ok(())
}
