pub mod app;
pub mod event_source;
pub mod logging;
pub mod panic_handler;
pub mod pdf;
pub mod settings;
pub mod theme;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use app::{App, AppAction, run_app_with_event_source};
