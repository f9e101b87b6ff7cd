//! Contract of the document-rendering engine
//!
//! The engine parses documents and rasterizes pages. It runs inside the
//! worker threads only; everything that crosses back to the UI thread is
//! plain data ([`DocumentHandle`](super::DocumentHandle),
//! [`PageHandle`](super::PageHandle), [`Bitmap`], [`TextContent`]).

use std::sync::{Arc, PoisonError, RwLock};

use super::task::CancellationToken;
use super::types::{Bitmap, PageSize, TextContent, Viewport};

/// Errors reported by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document source is empty")]
    EmptySource,

    #[error("unsupported document source: {0}")]
    UnsupportedSource(String),

    #[error("failed to open {path}: {detail}")]
    Open { path: String, detail: String },

    #[error("page {index} is out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("{0}")]
    Engine(String),
}

impl EngineError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Outcome of a failed render operation.
///
/// Cancellation is an expected outcome that drives a redraw; every other
/// failure is a real error and is reported as such.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] EngineError),
}

/// Name and version tag of an engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
}

impl EngineInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Configuration consumed by the engine's background workers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerConfig {
    pub endpoint: String,
}

impl WorkerConfig {
    /// Endpoint derived from the engine's own version tag
    #[must_use]
    pub fn default_for(info: &EngineInfo) -> Self {
        Self {
            endpoint: format!("worker://{}/{}", info.name, info.version),
        }
    }

    /// Uses the override when one is given, otherwise the engine default
    #[must_use]
    pub fn resolve(endpoint_override: Option<&str>, info: &EngineInfo) -> Self {
        match endpoint_override.map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Self {
                endpoint: endpoint.to_string(),
            },
            _ => Self::default_for(info),
        }
    }
}

/// Worker configuration published by the coordinator and read by every
/// worker before it handles a request.
///
/// Each publish bumps the revision so workers can tell when to re-apply it.
#[derive(Clone, Debug, Default)]
pub struct SharedWorkerConfig {
    inner: Arc<RwLock<(u64, WorkerConfig)>>,
}

impl SharedWorkerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `config`; returns the new revision
    pub fn publish(&self, config: WorkerConfig) -> u64 {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.0 += 1;
        guard.1 = config;
        guard.0
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).0
    }

    #[must_use]
    pub fn snapshot(&self) -> (u64, WorkerConfig) {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Document-rendering engine.
///
/// Page indices are 1-based throughout.
pub trait RenderEngine: Send + 'static {
    type Document;

    fn info(&self) -> EngineInfo;

    /// Applies the worker configuration; called before the first request a
    /// worker serves and again whenever a new configuration is published.
    fn configure_worker(&mut self, config: &WorkerConfig);

    fn open_document(&mut self, source: &str) -> Result<Self::Document, EngineError>;

    fn page_count(&self, doc: &Self::Document) -> usize;

    fn page_size(&self, doc: &Self::Document, index: usize) -> Result<PageSize, EngineError>;

    /// Rasterizes a page. Implementations check `cancel` at their own
    /// checkpoints and return [`RenderError::Cancelled`] once it is set.
    fn render_page(
        &self,
        doc: &Self::Document,
        index: usize,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> Result<Bitmap, RenderError>;

    fn text_content(&self, doc: &Self::Document, index: usize)
    -> Result<TextContent, EngineError>;
}

/// Rejects indices outside `[1, page_count]`
pub fn check_page_index(index: usize, page_count: usize) -> Result<(), EngineError> {
    if index == 0 || index > page_count {
        Err(EngineError::PageOutOfRange { index, page_count })
    } else {
        Ok(())
    }
}
