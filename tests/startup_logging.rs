use std::fs;

use log::LevelFilter;
use pagepane::logging::{apply_settings_level, init_file_logger};
use pagepane::settings::load_settings;
use tempfile::TempDir;

// Installs the global logger, so this file holds a single test.
#[test]
fn settings_problems_reach_the_log_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("pagepane.log");
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, "log_level: warn\nworkers: [oops\n").unwrap();

    init_file_logger(&log_path, None).unwrap();
    let settings = load_settings(Some(&config_path));
    // The broken file falls back to defaults, whose level is info
    assert_eq!(apply_settings_level(None, &settings), LevelFilter::Info);

    log::debug!("hidden after narrowing");
    log::info!("visible after narrowing");

    let logged = fs::read_to_string(&log_path).unwrap();
    assert!(logged.contains("Failed to parse settings file"), "{logged}");
    assert!(logged.contains("visible after narrowing"));
    assert!(!logged.contains("hidden after narrowing"));

    assert_eq!(
        apply_settings_level(Some(LevelFilter::Warn), &settings),
        LevelFilter::Warn
    );
}
