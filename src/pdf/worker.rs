//! Engine worker - runs in separate thread(s)

use flume::{Receiver, Sender};
use log::{debug, info};

use super::engine::{EngineError, RenderEngine, RenderError, SharedWorkerConfig};
use super::request::{EngineRequest, EngineResponse};
use super::task::CancellationToken;
use super::types::{Bitmap, DocumentHandle, DocumentId, PageHandle, TextContent, Viewport};

/// Executes engine requests for one worker thread.
///
/// Each worker keeps its own opened document, so several workers can serve
/// the same document concurrently.
pub struct EngineWorker<E: RenderEngine> {
    engine: E,
    document: Option<(DocumentId, E::Document)>,
    config: SharedWorkerConfig,
    applied_revision: u64,
}

impl<E: RenderEngine> EngineWorker<E> {
    pub fn new(engine: E, config: SharedWorkerConfig) -> Self {
        Self {
            engine,
            document: None,
            config,
            applied_revision: 0,
        }
    }

    /// Serves requests until `Shutdown` arrives or the channel closes
    pub fn run(mut self, requests: Receiver<EngineRequest>, responses: Sender<EngineResponse>) {
        for request in requests {
            if matches!(request, EngineRequest::Shutdown) {
                break;
            }
            if let Some(response) = self.handle(request) {
                if responses.send(response).is_err() {
                    debug!("Coordinator gone, stopping worker");
                    break;
                }
            }
        }
    }

    /// Executes a single request. Returns `None` for `Shutdown`.
    pub fn handle(&mut self, request: EngineRequest) -> Option<EngineResponse> {
        self.apply_config();

        match request {
            EngineRequest::Open {
                id,
                document,
                source,
            } => Some(self.open(document, &source).map_or_else(
                |error| EngineResponse::OpenFailed {
                    id,
                    source: source.clone(),
                    error,
                },
                |document| EngineResponse::Opened { id, document },
            )),

            EngineRequest::LoadPage {
                id,
                document,
                index,
            } => Some(match self.load_page(&document, index) {
                Ok(page) => EngineResponse::PageLoaded { id, page },
                Err(error) => EngineResponse::PageFailed { id, index, error },
            }),

            EngineRequest::Render {
                id,
                page,
                viewport,
                token,
            } => {
                let result = if token.is_cancelled() {
                    Err(RenderError::Cancelled)
                } else {
                    self.render(&page, &viewport, &token)
                };
                let result = if token.is_cancelled() {
                    Err(RenderError::Cancelled)
                } else {
                    result
                };
                Some(EngineResponse::RenderFinished { id, result })
            }

            EngineRequest::TextContent { id, page, viewport } => {
                Some(match self.text_content(&page) {
                    Ok(content) => EngineResponse::TextContent {
                        id,
                        page,
                        viewport,
                        content,
                    },
                    Err(error) => EngineResponse::TextFailed { id, error },
                })
            }

            EngineRequest::Shutdown => None,
        }
    }

    fn apply_config(&mut self) {
        let (revision, config) = self.config.snapshot();
        if revision != self.applied_revision {
            info!("Applying worker endpoint {}", config.endpoint);
            self.engine.configure_worker(&config);
            self.applied_revision = revision;
        }
    }

    fn open(&mut self, id: DocumentId, source: &str) -> Result<DocumentHandle, EngineError> {
        self.ensure_document(id, source)?;
        let page_count = self.engine.page_count(self.cached_document()?);
        Ok(DocumentHandle {
            id,
            source: source.to_string(),
            page_count,
        })
    }

    fn load_page(
        &mut self,
        document: &DocumentHandle,
        index: usize,
    ) -> Result<PageHandle, EngineError> {
        self.ensure_document(document.id, &document.source)?;
        let size = self.engine.page_size(self.cached_document()?, index)?;
        Ok(PageHandle {
            document: document.id,
            source: document.source.clone(),
            index,
            size,
        })
    }

    fn render(
        &mut self,
        page: &PageHandle,
        viewport: &Viewport,
        token: &CancellationToken,
    ) -> Result<Bitmap, RenderError> {
        self.ensure_document(page.document, &page.source)?;
        let doc = self.cached_document()?;
        self.engine.render_page(doc, page.index, viewport, token)
    }

    fn text_content(&mut self, page: &PageHandle) -> Result<TextContent, EngineError> {
        self.ensure_document(page.document, &page.source)?;
        let doc = self.cached_document()?;
        self.engine.text_content(doc, page.index)
    }

    /// Opens `source` unless this worker already holds the document `id`
    fn ensure_document(&mut self, id: DocumentId, source: &str) -> Result<(), EngineError> {
        if source.trim().is_empty() {
            return Err(EngineError::EmptySource);
        }
        if matches!(&self.document, Some((cached_id, _)) if *cached_id == id) {
            return Ok(());
        }
        if self.document.is_some() {
            debug!("Worker switching documents, dropping cached document");
        }
        // Drop the old document before opening the next one
        self.document = None;
        let doc = self.engine.open_document(source)?;
        self.document = Some((id, doc));
        Ok(())
    }

    fn cached_document(&self) -> Result<&E::Document, EngineError> {
        self.document
            .as_ref()
            .map(|(_, doc)| doc)
            .ok_or_else(|| EngineError::engine("no document opened by this worker"))
    }
}
