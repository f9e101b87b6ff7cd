use std::fs;
use std::path::{Path, PathBuf};

use log::{LevelFilter, debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::pdf::{CellSize, DEFAULT_WORKERS, DisplayMetrics};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagepane";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_theme")]
    pub theme: String,

    /// Physical pixels per logical pixel used when rasterizing pages
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_cell_width")]
    pub cell_width: u16,

    #[serde(default = "default_cell_height")]
    pub cell_height: u16,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Overrides the engine's default worker endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_endpoint: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_theme() -> String {
    "Oceanic Next".to_string()
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_cell_width() -> u16 {
    CellSize::default().width
}

fn default_cell_height() -> u16 {
    CellSize::default().height
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            theme: default_theme(),
            device_pixel_ratio: default_device_pixel_ratio(),
            cell_width: default_cell_width(),
            cell_height: default_cell_height(),
            workers: default_workers(),
            worker_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn display_metrics(&self) -> DisplayMetrics {
        DisplayMetrics::new(
            self.device_pixel_ratio,
            CellSize::new(self.cell_width.max(1), self.cell_height.max(1)),
        )
    }

    /// Configured log level; unknown names fall back to `info`
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Loads settings from `explicit` or the per-user config file.
///
/// A missing per-user file is created with defaults. Unreadable or invalid
/// files are logged and replaced by defaults in memory only.
pub fn load_settings(explicit: Option<&Path>) -> Settings {
    if let Some(path) = explicit {
        if path.exists() {
            return load_settings_from_path(path).unwrap_or_default();
        }
        warn!("Settings file {path:?} does not exist, using defaults");
        return Settings::default();
    }

    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };
    if path.exists() {
        return load_settings_from_path(&path).unwrap_or_default();
    }

    info!("Settings file not found, creating with defaults at {path:?}");
    let settings = Settings::default();
    save_settings_to_file(&settings, &path);
    settings
}

pub fn load_settings_from_path(path: &Path) -> Option<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return None;
        }
    };

    match serde_yaml::from_str::<Settings>(&content) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }
            Some(settings)
        }
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    match fs::write(path, generate_settings_yaml(settings)) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("theme: \"{}\"\n", settings.theme));
    content.push('\n');
    content.push_str("# Physical pixels per logical pixel (2.0 for HiDPI rendering)\n");
    content.push_str(&format!(
        "device_pixel_ratio: {}\n",
        settings.device_pixel_ratio
    ));
    content.push_str("# Size of one terminal cell in logical pixels\n");
    content.push_str(&format!("cell_width: {}\n", settings.cell_width));
    content.push_str(&format!("cell_height: {}\n", settings.cell_height));
    content.push('\n');
    content.push_str(&format!("workers: {}\n", settings.workers));
    match &settings.worker_endpoint {
        Some(endpoint) => content.push_str(&format!("worker_endpoint: \"{endpoint}\"\n")),
        None => content.push_str("# worker_endpoint: \"worker://mupdf/0.6\"\n"),
    }
    content.push_str(&format!("log_level: {}\n", settings.log_level));

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_yaml::from_str("device_pixel_ratio: 2.0\n").unwrap();
        assert_eq!(settings.device_pixel_ratio, 2.0);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.worker_endpoint, None);
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn generated_yaml_round_trips() {
        let settings = Settings {
            worker_endpoint: Some("worker://custom/1".to_string()),
            workers: 3,
            ..Settings::default()
        };
        let parsed: Settings = serde_yaml::from_str(&generate_settings_yaml(&settings)).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn old_versions_are_migrated_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 0\nworkers: 4\n").unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.workers, 4);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(&format!("version: {CURRENT_VERSION}")));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "workers: [not a number\n").unwrap();

        assert!(load_settings_from_path(&path).is_none());
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn display_metrics_reject_bad_values() {
        let settings = Settings {
            device_pixel_ratio: -1.0,
            cell_width: 0,
            ..Settings::default()
        };
        let metrics = settings.display_metrics();
        assert_eq!(metrics.device_pixel_ratio, 1.0);
        assert_eq!(metrics.cell_size.width, 1);
        assert_eq!(
            Settings {
                log_level: "bogus".into(),
                ..Settings::default()
            }
            .log_level_filter(),
            LevelFilter::Info
        );
    }
}
