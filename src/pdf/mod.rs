//! Document rendering infrastructure

mod coordinator;
mod engine;
#[cfg(feature = "pdf")]
mod mupdf_engine;
mod request;
mod surface;
mod task;
mod text_layer;
mod types;
mod worker;

pub use coordinator::{
    CoordinatorEvent, CoordinatorOptions, LoadStatus, RenderCoordinator, WorkerPort,
};
pub use engine::{
    EngineError, EngineInfo, RenderEngine, RenderError, SharedWorkerConfig, WorkerConfig,
    check_page_index,
};
#[cfg(feature = "pdf")]
pub use mupdf_engine::MupdfEngine;
pub use request::{EngineRequest, EngineResponse, RequestId};
pub use surface::{Canvas, Surfaces};
pub use task::{CancellationToken, InFlight, RenderTask, TaskState};
pub use text_layer::{TextLayer, TextSpan, render_text_layer};
pub use types::*;
pub use worker::EngineWorker;

/// Engine workers started by [`RenderCoordinator::spawn`] unless configured
pub const DEFAULT_WORKERS: usize = 2;
