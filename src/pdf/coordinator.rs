//! Render coordinator - keeps the displayed page in sync with the requested one

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::DEFAULT_WORKERS;
use super::engine::{
    EngineError, EngineInfo, RenderEngine, RenderError, SharedWorkerConfig, WorkerConfig,
};
use super::request::{EngineRequest, EngineResponse, RequestId};
use super::surface::Surfaces;
use super::task::{InFlight, RenderTask};
use super::text_layer::render_text_layer;
use super::types::{Bitmap, DisplayMetrics, DocumentHandle, DocumentId, PageHandle};
use super::worker::EngineWorker;

/// Construction-time configuration of a coordinator
#[derive(Clone, Debug)]
pub struct CoordinatorOptions {
    /// Document source identifier (path or URL)
    pub source: String,
    /// Initially requested page, 1-based
    pub page: usize,
    pub worker_endpoint: Option<String>,
    pub metrics: DisplayMetrics,
    pub workers: usize,
}

impl CoordinatorOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: 1,
            worker_endpoint: None,
            metrics: DisplayMetrics::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Channel ends and configuration a worker needs to serve a coordinator
pub struct WorkerPort {
    pub requests: Receiver<EngineRequest>,
    pub responses: Sender<EngineResponse>,
    pub config: SharedWorkerConfig,
}

impl WorkerPort {
    pub fn worker<E: RenderEngine>(&self, engine: E) -> EngineWorker<E> {
        EngineWorker::new(engine, self.config.clone())
    }
}

/// Coarse readiness reported to the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// No document yet, open in progress
    Loading,
    Ready,
    /// Open or page-fetch failed; the message is user-presentable
    Failed(String),
}

/// Notifications produced while processing worker responses
#[derive(Debug)]
pub enum CoordinatorEvent {
    DocumentOpened { page_count: usize },
    OpenFailed(EngineError),
    PageLoaded(usize),
    PageFailed { index: usize, error: EngineError },
    Rendered(usize),
    RenderFailed { index: usize, error: EngineError },
    TextLayerReady(usize),
}

/// Owns the document lifecycle and the single in-flight render operation.
///
/// Lives on the UI thread. Engine work happens on worker threads; every
/// continuation (page loaded, render finished, text ready) runs inside
/// [`RenderCoordinator::poll`].
pub struct RenderCoordinator {
    request_tx: Sender<EngineRequest>,
    response_rx: Receiver<EngineResponse>,
    worker_config: SharedWorkerConfig,
    engine_info: EngineInfo,
    endpoint_override: Option<String>,
    applied_config: Option<WorkerConfig>,
    num_workers: usize,

    source: String,
    requested_page: usize,
    metrics: DisplayMetrics,

    next_request_id: u64,
    next_document_id: u64,
    pending_open: Option<RequestId>,
    pending_load: Option<RequestId>,
    pending_text: Option<RequestId>,

    document: Option<DocumentHandle>,
    page: Option<PageHandle>,
    in_flight: InFlight,
    /// The last render of `page` failed, so asking for it again retries
    render_failed: bool,
    status: LoadStatus,
    last_error: Option<String>,
    queued_events: Vec<CoordinatorEvent>,
    /// Surfaces still show the previous document
    surfaces_stale: bool,
}

impl RenderCoordinator {
    /// Starts `options.workers` engine workers and opens the document
    pub fn spawn<E>(engine: E, options: CoordinatorOptions) -> Self
    where
        E: RenderEngine + Clone,
    {
        let workers = options.workers.max(1);
        let (coordinator, port) = Self::detached(engine.info(), options);

        // flume channels are MPMC: every worker pulls from the shared
        // request queue, so a page fetch can overtake a long render.
        for n in 0..workers {
            let engine = engine.clone();
            let rx = port.requests.clone();
            let tx = port.responses.clone();
            let config = port.config.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("engine-worker-{n}"))
                .spawn(move || EngineWorker::new(engine, config).run(rx, tx));
            if let Err(e) = spawned {
                error!("Failed to spawn engine worker {n}: {e}");
            }
        }

        coordinator
    }

    /// Creates a coordinator without workers. The caller serves the
    /// returned port, e.g. with an [`EngineWorker`].
    pub fn detached(engine_info: EngineInfo, options: CoordinatorOptions) -> (Self, WorkerPort) {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let worker_config = SharedWorkerConfig::new();

        let mut coordinator = Self {
            request_tx,
            response_rx,
            worker_config: worker_config.clone(),
            engine_info,
            endpoint_override: options.worker_endpoint,
            applied_config: None,
            num_workers: options.workers.max(1),
            source: String::new(),
            requested_page: options.page,
            metrics: options.metrics,
            next_request_id: 1,
            next_document_id: 1,
            pending_open: None,
            pending_load: None,
            pending_text: None,
            document: None,
            page: None,
            in_flight: InFlight::new(),
            render_failed: false,
            status: LoadStatus::Loading,
            last_error: None,
            queued_events: Vec::new(),
            surfaces_stale: false,
        };

        // Worker configuration must be in place before the first open
        coordinator.apply_worker_config();
        coordinator.set_source(&options.source);

        let port = WorkerPort {
            requests: request_rx,
            responses: response_tx,
            config: worker_config,
        };
        (coordinator, port)
    }

    /// Overrides the worker endpoint; `None` restores the engine default.
    /// Workers pick the change up before their next request.
    pub fn set_worker_endpoint(&mut self, endpoint: Option<String>) {
        if self.endpoint_override != endpoint {
            self.endpoint_override = endpoint;
            self.apply_worker_config();
        }
    }

    fn apply_worker_config(&mut self) {
        let config = WorkerConfig::resolve(self.endpoint_override.as_deref(), &self.engine_info);
        if self.applied_config.as_ref() == Some(&config) {
            return;
        }
        debug!("Publishing worker endpoint {}", config.endpoint);
        self.worker_config.publish(config.clone());
        self.applied_config = Some(config);
    }

    #[must_use]
    pub fn worker_endpoint(&self) -> Option<&str> {
        self.applied_config
            .as_ref()
            .map(|config| config.endpoint.as_str())
    }

    /// Opens `source` unless it is already the current document source.
    /// The previous document and page are discarded.
    pub fn set_source(&mut self, source: &str) {
        if self.source == source && (self.document.is_some() || self.pending_open.is_some()) {
            return;
        }

        self.source = source.to_string();
        self.document = None;
        self.page = None;
        self.render_failed = false;
        self.pending_load = None;
        self.pending_text = None;
        self.pending_open = None;
        if self.in_flight.cancel_current() {
            debug!("Source changed, cancelling in-flight render");
        }
        self.status = LoadStatus::Loading;
        self.surfaces_stale = true;

        if source.trim().is_empty() {
            self.fail_open(EngineError::EmptySource);
            return;
        }

        let id = self.next_id();
        let document = DocumentId(self.next_document_id);
        self.next_document_id += 1;
        info!("Opening document {source}");
        self.pending_open = Some(id);
        self.send(EngineRequest::Open {
            id,
            document,
            source: source.to_string(),
        });
    }

    /// Requests page `index` (1-based). The index is not clamped here;
    /// keeping it within `[1, page_count]` is the caller's contract.
    /// Requesting a page whose render failed loads and draws it again.
    pub fn set_page(&mut self, index: usize) {
        let settled = self.pending_load.is_some()
            || (!self.render_failed
                && self.page.as_ref().is_some_and(|page| page.index == index));
        if self.requested_page == index && settled {
            return;
        }
        self.requested_page = index;
        self.load_page();
    }

    fn load_page(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        let id = self.next_id();
        debug!("Loading page {}", self.requested_page);
        self.pending_load = Some(id);
        self.send(EngineRequest::LoadPage {
            id,
            document,
            index: self.requested_page,
        });
    }

    /// Drains worker responses and runs their continuations
    pub fn poll(&mut self, surfaces: &mut Surfaces) -> Vec<CoordinatorEvent> {
        let mut events = std::mem::take(&mut self.queued_events);

        if self.surfaces_stale {
            surfaces.canvas.clear();
            surfaces.overlay.clear();
            self.surfaces_stale = false;
        }

        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response, surfaces, &mut events);
        }

        events
    }

    fn handle_response(
        &mut self,
        response: EngineResponse,
        surfaces: &mut Surfaces,
        events: &mut Vec<CoordinatorEvent>,
    ) {
        match response {
            EngineResponse::Opened { id, document } => {
                if self.pending_open != Some(id) {
                    debug!("Ignoring stale open of {}", document.source);
                    return;
                }
                self.pending_open = None;
                info!(
                    "Opened {} with {} pages",
                    document.source, document.page_count
                );
                let page_count = document.page_count;
                self.document = Some(document);
                self.page = None;
                self.status = LoadStatus::Ready;
                self.last_error = None;
                events.push(CoordinatorEvent::DocumentOpened { page_count });
                self.load_page();
            }

            EngineResponse::OpenFailed { id, source, error } => {
                if self.pending_open != Some(id) {
                    debug!("Ignoring stale open failure for {source}");
                    return;
                }
                self.pending_open = None;
                self.fail_open(error);
                events.append(&mut self.queued_events);
            }

            EngineResponse::PageLoaded { id, page } => {
                if self.pending_load != Some(id) {
                    debug!("Ignoring superseded page {}", page.index);
                    return;
                }
                self.pending_load = None;
                self.page = Some(page.clone());
                self.render_failed = false;
                self.status = LoadStatus::Ready;
                self.last_error = None;
                events.push(CoordinatorEvent::PageLoaded(page.index));
                self.draw_page(&page, surfaces);
            }

            EngineResponse::PageFailed { id, index, error } => {
                if self.pending_load != Some(id) {
                    debug!("Ignoring superseded failure for page {index}");
                    return;
                }
                self.pending_load = None;
                error!("Failed to load page {index}: {error}");
                self.record_error(format!("Failed to load page {index}: {error}"));
                events.push(CoordinatorEvent::PageFailed { index, error });
            }

            EngineResponse::RenderFinished { id, result } => {
                let Some(task) = self.in_flight.finish(id) else {
                    warn!("Render completion {id:?} does not match the in-flight render");
                    return;
                };
                // Whatever a cancelled render produced is stale; only the
                // retry below may draw
                let result = if task.token.is_cancelled() {
                    Err(RenderError::Cancelled)
                } else {
                    result
                };
                self.finish_render(task, result, surfaces, events);
            }

            EngineResponse::TextContent {
                id,
                page,
                viewport,
                content,
            } => {
                if self.pending_text != Some(id) {
                    return;
                }
                self.pending_text = None;
                let current = self.page.as_ref();
                if !current.is_some_and(|current| current.same_page(&page)) {
                    debug!("Dropping text for page {} no longer shown", page.index);
                    return;
                }
                surfaces.overlay.clear();
                surfaces.overlay.align_to(&surfaces.canvas);
                render_text_layer(
                    &content,
                    &mut surfaces.overlay,
                    &viewport,
                    self.metrics.device_pixel_ratio,
                    page.index,
                );
                events.push(CoordinatorEvent::TextLayerReady(page.index));
            }

            EngineResponse::TextFailed { id, error } => {
                if self.pending_text != Some(id) {
                    return;
                }
                self.pending_text = None;
                warn!("Failed to extract page text: {error}");
                surfaces.overlay.clear();
                surfaces.overlay.align_to(&surfaces.canvas);
            }
        }
    }

    /// Draws `page` onto the canvas.
    ///
    /// When a render is already running it is cancelled and nothing else
    /// happens here: the cancelled render's completion redraws the current
    /// page.
    fn draw_page(&mut self, page: &PageHandle, surfaces: &mut Surfaces) {
        let ratio = self.metrics.device_pixel_ratio;
        let viewport = page.viewport(ratio);
        surfaces.canvas.resize(&viewport, ratio);

        if self.in_flight.cancel_current() {
            debug!(
                "Render in flight, cancelling it before drawing page {}",
                page.index
            );
            return;
        }

        let id = self.next_id();
        let task = RenderTask::new(id, page.clone(), viewport);
        let token = task.token.clone();
        if self.in_flight.try_begin(task).is_err() {
            return;
        }
        debug!("Rendering page {} at scale {ratio}", page.index);
        self.send(EngineRequest::Render {
            id,
            page: page.clone(),
            viewport,
            token,
        });
    }

    fn finish_render(
        &mut self,
        task: RenderTask,
        result: Result<Bitmap, RenderError>,
        surfaces: &mut Surfaces,
        events: &mut Vec<CoordinatorEvent>,
    ) {
        let index = task.page.index;
        match result {
            Ok(bitmap) => {
                surfaces.canvas.paint(bitmap, index);
                events.push(CoordinatorEvent::Rendered(index));

                let id = self.next_id();
                self.pending_text = Some(id);
                self.send(EngineRequest::TextContent {
                    id,
                    page: task.page,
                    viewport: task.viewport,
                });
            }

            Err(RenderError::Cancelled) => {
                // The only retry path: redraw whatever page is current now
                debug!("Render of page {index} cancelled");
                if let Some(page) = self.page.clone() {
                    self.draw_page(&page, surfaces);
                }
            }

            Err(RenderError::Failed(error)) => {
                error!("Failed to render page {index}: {error}");
                self.render_failed = self
                    .page
                    .as_ref()
                    .is_some_and(|page| page.same_page(&task.page));
                self.record_error(format!("Failed to render page {index}: {error}"));
                events.push(CoordinatorEvent::RenderFailed { index, error });
            }
        }
    }

    /// Re-aligns the overlay with the canvas after the host moved or
    /// resized it. Returns true if the overlay moved.
    pub fn align_overlay(&self, surfaces: &mut Surfaces) -> bool {
        if surfaces.overlay.rect() == surfaces.canvas.screen_rect() {
            return false;
        }
        surfaces.overlay.align_to(&surfaces.canvas);
        true
    }

    fn fail_open(&mut self, error: EngineError) {
        error!("Failed to open document {:?}: {error}", self.source);
        self.record_error(format!("Failed to open document: {error}"));
        self.queued_events.push(CoordinatorEvent::OpenFailed(error));
    }

    fn record_error(&mut self, message: String) {
        self.status = LoadStatus::Failed(message.clone());
        self.last_error = Some(message);
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn page(&self) -> Option<&PageHandle> {
        self.page.as_ref()
    }

    #[must_use]
    pub fn requested_page(&self) -> usize {
        self.requested_page
    }

    #[must_use]
    pub fn render_in_flight(&self) -> Option<&RenderTask> {
        self.in_flight.current()
    }

    #[must_use]
    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    /// Stops all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(EngineRequest::Shutdown);
        }
    }

    fn send(&self, request: EngineRequest) {
        if self.request_tx.send(request).is_err() {
            warn!("No engine worker is listening");
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{ScriptedEngine, manual_coordinator, settle};

    fn drain(port_requests: &Receiver<EngineRequest>) -> Vec<EngineRequest> {
        port_requests.try_iter().collect()
    }

    #[test]
    fn construction_publishes_config_then_opens() {
        let info = EngineInfo::new("scripted", "2.1");
        let (coordinator, port) = RenderCoordinator::detached(info, CoordinatorOptions::new("a.pdf"));

        assert_eq!(port.config.revision(), 1);
        assert_eq!(port.config.snapshot().1.endpoint, "worker://scripted/2.1");
        assert!(matches!(
            drain(&port.requests).as_slice(),
            [EngineRequest::Open { source, .. }] if source == "a.pdf"
        ));
        drop(coordinator);
    }

    #[test]
    fn repeated_page_request_is_ignored_once_settled() {
        let engine = ScriptedEngine::with_pages(3);
        let (mut coordinator, mut worker) =
            manual_coordinator(engine, CoordinatorOptions::new("three.pdf"));
        let mut surfaces = Surfaces::new();
        settle(&mut coordinator, &mut surfaces, &mut worker);

        coordinator.set_page(1);
        assert!(worker.is_idle());

        coordinator.set_page(2);
        coordinator.set_page(2);
        assert_eq!(worker.pending().len(), 1);
    }

    #[test]
    fn shutdown_reaches_every_worker() {
        let mut options = CoordinatorOptions::new("a.pdf");
        options.workers = 3;
        let (coordinator, port) = RenderCoordinator::detached(EngineInfo::new("x", "1"), options);
        drain(&port.requests);

        coordinator.shutdown();
        let shutdowns = drain(&port.requests)
            .into_iter()
            .filter(|request| matches!(request, EngineRequest::Shutdown))
            .count();
        assert_eq!(shutdowns, 3);
    }

    #[test]
    fn stale_open_response_is_ignored() {
        let (mut coordinator, port) =
            RenderCoordinator::detached(EngineInfo::new("x", "1"), CoordinatorOptions::new("a.pdf"));
        let mut surfaces = Surfaces::new();
        coordinator.set_source("b.pdf");

        let stale = DocumentHandle {
            id: DocumentId(1),
            source: "a.pdf".to_string(),
            page_count: 4,
        };
        port.responses
            .send(EngineResponse::Opened {
                id: RequestId::new(1),
                document: stale,
            })
            .unwrap();

        let events = coordinator.poll(&mut surfaces);
        assert!(events.is_empty());
        assert!(coordinator.document().is_none());
        assert_eq!(coordinator.status(), &LoadStatus::Loading);
    }
}
