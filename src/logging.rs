use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use log::{LevelFilter, debug};
use simplelog::{Config, WriteLogger};

use crate::settings::Settings;

/// Starts file logging before anything else runs, so that problems found
/// while loading settings are recorded.
///
/// Without an explicit level everything is let through until
/// [`apply_settings_level`] narrows it.
pub fn init_file_logger(path: &Path, level: Option<LevelFilter>) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    WriteLogger::init(level.unwrap_or(LevelFilter::Trace), Config::default(), file)?;
    Ok(())
}

/// Narrows logging to the configured level unless the command line chose one
pub fn apply_settings_level(cli_level: Option<LevelFilter>, settings: &Settings) -> LevelFilter {
    let level = cli_level.unwrap_or_else(|| settings.log_level_filter());
    log::set_max_level(level);
    debug!("Log level {level}");
    level
}
