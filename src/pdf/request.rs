//! Requests sent to engine workers and their responses

use super::engine::{EngineError, RenderError};
use super::task::CancellationToken;
use super::types::{Bitmap, DocumentHandle, DocumentId, PageHandle, TextContent, Viewport};

/// Unique identifier for engine requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to engine workers
#[derive(Debug)]
pub enum EngineRequest {
    /// Open a document from its source identifier
    Open {
        id: RequestId,
        document: DocumentId,
        source: String,
    },

    /// Fetch the handle of a page (1-based)
    LoadPage {
        id: RequestId,
        document: DocumentHandle,
        index: usize,
    },

    /// Rasterize a page at the given viewport
    Render {
        id: RequestId,
        page: PageHandle,
        viewport: Viewport,
        token: CancellationToken,
    },

    /// Compute the text content of a page for the overlay
    TextContent {
        id: RequestId,
        page: PageHandle,
        viewport: Viewport,
    },

    /// Stop the worker
    Shutdown,
}

/// Response from engine workers
#[derive(Debug)]
pub enum EngineResponse {
    Opened {
        id: RequestId,
        document: DocumentHandle,
    },

    OpenFailed {
        id: RequestId,
        source: String,
        error: EngineError,
    },

    PageLoaded {
        id: RequestId,
        page: PageHandle,
    },

    PageFailed {
        id: RequestId,
        index: usize,
        error: EngineError,
    },

    /// Completion of a render operation, successful or not
    RenderFinished {
        id: RequestId,
        result: Result<Bitmap, RenderError>,
    },

    TextContent {
        id: RequestId,
        page: PageHandle,
        viewport: Viewport,
        content: TextContent,
    },

    TextFailed {
        id: RequestId,
        error: EngineError,
    },
}
