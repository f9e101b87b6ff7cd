use std::io::stdout;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, error, info};
use ratatui::{Terminal, backend::CrosstermBackend};

use pagepane::app::{App, run_app_with_event_source};
use pagepane::event_source::KeyboardEventSource;
use pagepane::logging::{apply_settings_level, init_file_logger};
use pagepane::panic_handler::initialize_panic_handler;
use pagepane::pdf::{CoordinatorOptions, RenderCoordinator};
use pagepane::settings::{Settings, load_settings};
use pagepane::theme::ThemeId;

#[derive(Parser)]
#[command(name = "pagepane")]
#[command(about = "Terminal page viewer for PDF and other MuPDF documents")]
#[command(version)]
struct Cli {
    /// Document to open (path or file:// URL)
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Page to show first, 1-based
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Override the engine worker endpoint
    #[arg(long, value_name = "URL")]
    worker_src: Option<String>,

    /// Device pixel ratio used for rasterization
    #[arg(long)]
    dpr: Option<f32>,

    /// Settings file (default: per-user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE", default_value = "pagepane.log")]
    log_file: PathBuf,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

fn coordinator_options(cli: &Cli, settings: &Settings) -> CoordinatorOptions {
    let mut metrics = settings.display_metrics();
    if let Some(dpr) = cli.dpr {
        metrics = pagepane::pdf::DisplayMetrics::new(dpr, metrics.cell_size);
    }

    let mut options = CoordinatorOptions::new(cli.source.clone());
    options.page = cli.page.max(1);
    options.worker_endpoint = cli
        .worker_src
        .clone()
        .or_else(|| settings.worker_endpoint.clone());
    options.metrics = metrics;
    options.workers = settings.workers;
    options
}

#[cfg(feature = "pdf")]
fn start_coordinator(options: CoordinatorOptions) -> Result<RenderCoordinator> {
    Ok(RenderCoordinator::spawn(
        pagepane::pdf::MupdfEngine::new(),
        options,
    ))
}

#[cfg(not(feature = "pdf"))]
fn start_coordinator(_options: CoordinatorOptions) -> Result<RenderCoordinator> {
    anyhow::bail!("pagepane was built without a rendering engine (enable the `pdf` feature)")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_file_logger(&cli.log_file, cli.log_level)?;
    let settings = load_settings(cli.config.as_deref());
    apply_settings_level(cli.log_level, &settings);

    info!("Starting pagepane on {}", cli.source);

    let coordinator = start_coordinator(coordinator_options(&cli, &settings))?;
    let palette = ThemeId::from_name(&settings.theme)
        .unwrap_or_default()
        .palette();
    let mut app = App::new(coordinator, palette, cli.source.clone());

    initialize_panic_handler();
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        eprintln!("{err:?}");
    }

    app.coordinator().shutdown();
    info!("Shutting down pagepane");
    Ok(())
}
