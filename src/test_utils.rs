pub mod test_helpers {
    use std::collections::{HashSet, VecDeque};
    use std::sync::{Arc, Mutex, PoisonError};

    use flume::{Receiver, Sender};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::event_source::{Event, KeyCode, KeyModifiers, SimulatedEventSource};
    use crate::pdf::{
        Bitmap, CancellationToken, CoordinatorEvent, CoordinatorOptions, EngineError,
        EngineInfo, EngineRequest, EngineResponse, EngineWorker, PageSize, RenderCoordinator,
        RenderEngine, RenderError, Surfaces, TextContent, TextItem, Viewport, WorkerConfig,
        WorkerPort, check_page_index,
    };

    /// Fill colour of the bitmap [`ScriptedEngine`] renders for `index`
    pub fn page_color(index: usize) -> (u8, u8, u8) {
        (((index * 60) % 256) as u8, 80, 160)
    }

    /// Size [`ScriptedEngine`] reports for page `index`
    pub fn page_size(index: usize) -> PageSize {
        let base = (index * 100) as f32;
        PageSize::new(base, base + 100.0)
    }

    pub struct ScriptedDocument {
        pub source: String,
        pub pages: usize,
    }

    /// In-memory engine with predictable pages and injectable failures.
    ///
    /// Page `n` measures `100n x (100n + 100)` points, renders as a solid
    /// [`page_color`] and carries a single text item `"Page n"`. Clones share
    /// their logs, so a test can keep one clone while workers use others.
    #[derive(Clone, Default)]
    pub struct ScriptedEngine {
        pages: usize,
        fail_open: bool,
        failing_pages: HashSet<usize>,
        failing_renders: HashSet<usize>,
        fail_text: bool,
        applied_endpoints: Arc<Mutex<Vec<String>>>,
        opened: Arc<Mutex<Vec<String>>>,
        rendered: Arc<Mutex<Vec<usize>>>,
    }

    impl ScriptedEngine {
        pub fn with_pages(pages: usize) -> Self {
            Self {
                pages,
                ..Self::default()
            }
        }

        pub fn failing_open(mut self) -> Self {
            self.fail_open = true;
            self
        }

        pub fn failing_page(mut self, index: usize) -> Self {
            self.failing_pages.insert(index);
            self
        }

        pub fn failing_render(mut self, index: usize) -> Self {
            self.failing_renders.insert(index);
            self
        }

        pub fn failing_text(mut self) -> Self {
            self.fail_text = true;
            self
        }

        /// Endpoints passed to `configure_worker`, in order
        pub fn applied_endpoints(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.applied_endpoints)
        }

        /// Sources successfully opened by any clone
        pub fn opened_sources(&self) -> Vec<String> {
            lock(&self.opened).clone()
        }

        /// Pages whose rasterization ran to completion
        pub fn rendered_pages(&self) -> Vec<usize> {
            lock(&self.rendered).clone()
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl RenderEngine for ScriptedEngine {
        type Document = ScriptedDocument;

        fn info(&self) -> EngineInfo {
            EngineInfo::new("scripted", "1.0")
        }

        fn configure_worker(&mut self, config: &WorkerConfig) {
            lock(&self.applied_endpoints).push(config.endpoint.clone());
        }

        fn open_document(&mut self, source: &str) -> Result<ScriptedDocument, EngineError> {
            if source.trim().is_empty() {
                return Err(EngineError::EmptySource);
            }
            if self.fail_open {
                return Err(EngineError::Open {
                    path: source.to_string(),
                    detail: "not a document".to_string(),
                });
            }
            lock(&self.opened).push(source.to_string());
            Ok(ScriptedDocument {
                source: source.to_string(),
                pages: self.pages,
            })
        }

        fn page_count(&self, doc: &ScriptedDocument) -> usize {
            doc.pages
        }

        fn page_size(&self, doc: &ScriptedDocument, index: usize) -> Result<PageSize, EngineError> {
            check_page_index(index, doc.pages)?;
            if self.failing_pages.contains(&index) {
                return Err(EngineError::engine(format!("page {index} is damaged")));
            }
            Ok(page_size(index))
        }

        fn render_page(
            &self,
            doc: &ScriptedDocument,
            index: usize,
            viewport: &Viewport,
            cancel: &CancellationToken,
        ) -> Result<Bitmap, RenderError> {
            check_page_index(index, doc.pages)?;
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            if self.failing_renders.contains(&index) {
                return Err(EngineError::engine(format!("cannot rasterize page {index}")).into());
            }
            lock(&self.rendered).push(index);
            Ok(Bitmap::filled(
                viewport.pixel_width(),
                viewport.pixel_height(),
                page_color(index),
            ))
        }

        fn text_content(
            &self,
            doc: &ScriptedDocument,
            index: usize,
        ) -> Result<TextContent, EngineError> {
            check_page_index(index, doc.pages)?;
            if self.fail_text {
                return Err(EngineError::engine("no text layer"));
            }
            Ok(TextContent {
                items: vec![TextItem {
                    text: format!("Page {index}"),
                    x: 10.0,
                    y: 10.0,
                    width: 60.0,
                    height: 12.0,
                }],
            })
        }
    }

    /// Engine worker driven by hand from the test thread.
    ///
    /// Requests queue up until the test serves them, which makes every
    /// interleaving of coordinator and worker reproducible.
    pub struct ManualWorker {
        worker: EngineWorker<ScriptedEngine>,
        requests: Receiver<EngineRequest>,
        responses: Sender<EngineResponse>,
        queue: VecDeque<EngineRequest>,
    }

    impl ManualWorker {
        pub fn new(port: WorkerPort, engine: ScriptedEngine) -> Self {
            let worker = port.worker(engine);
            Self {
                worker,
                requests: port.requests,
                responses: port.responses,
                queue: VecDeque::new(),
            }
        }

        fn collect(&mut self) {
            while let Ok(request) = self.requests.try_recv() {
                if !matches!(request, EngineRequest::Shutdown) {
                    self.queue.push_back(request);
                }
            }
        }

        /// Requests sent so far and not yet served
        pub fn pending(&mut self) -> &VecDeque<EngineRequest> {
            self.collect();
            &self.queue
        }

        /// Page indices of the queued render requests
        pub fn pending_renders(&mut self) -> Vec<usize> {
            self.pending()
                .iter()
                .filter_map(|request| match request {
                    EngineRequest::Render { page, .. } => Some(page.index),
                    _ => None,
                })
                .collect()
        }

        pub fn is_idle(&mut self) -> bool {
            self.pending().is_empty()
        }

        /// Removes the oldest request matching `pred` without serving it
        pub fn take_first(
            &mut self,
            pred: impl Fn(&EngineRequest) -> bool,
        ) -> Option<EngineRequest> {
            self.collect();
            let pos = self.queue.iter().position(pred)?;
            self.queue.remove(pos)
        }

        /// Delivers a hand-made response to the coordinator
        pub fn respond(&self, response: EngineResponse) {
            let _ = self.responses.send(response);
        }

        /// Serves the oldest request matching `pred`
        pub fn serve_first(&mut self, pred: impl Fn(&EngineRequest) -> bool) -> bool {
            let Some(request) = self.take_first(pred) else {
                return false;
            };
            if let Some(response) = self.worker.handle(request) {
                let _ = self.responses.send(response);
            }
            true
        }

        pub fn serve_next(&mut self) -> bool {
            self.serve_first(|_| true)
        }

        /// Serves everything queued right now; returns how many were served
        pub fn serve_all(&mut self) -> usize {
            let mut served = 0;
            while self.serve_next() {
                served += 1;
            }
            served
        }
    }

    /// Coordinator with a hand-driven worker behind it
    pub fn manual_coordinator(
        engine: ScriptedEngine,
        options: CoordinatorOptions,
    ) -> (RenderCoordinator, ManualWorker) {
        let (coordinator, port) = RenderCoordinator::detached(engine.info(), options);
        (coordinator, ManualWorker::new(port, engine))
    }

    /// Serves and polls until neither side has work left
    pub fn settle(
        coordinator: &mut RenderCoordinator,
        surfaces: &mut Surfaces,
        worker: &mut ManualWorker,
    ) -> Vec<CoordinatorEvent> {
        let mut events = coordinator.poll(surfaces);
        for _ in 0..64 {
            if worker.serve_all() == 0 {
                break;
            }
            events.extend(coordinator.poll(surfaces));
        }
        events
    }

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a character key press
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events
                .push(SimulatedEventSource::key_event(code, KeyModifiers::empty()));
            self
        }

        /// Go to the next page `times` times (press 'n')
        pub fn next_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('n'));
            }
            self
        }

        /// Go to the previous page `times` times (press 'p')
        pub fn previous_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('p'));
            }
            self
        }

        /// Left click at a terminal cell
        pub fn click(mut self, column: u16, row: u16) -> Self {
            self.events
                .push(SimulatedEventSource::left_click(column, row));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .next_page(2)
            .previous_page(1)
            .click(3, 4)
            .quit()
            .build();

        assert_eq!(scenario.events.len(), 5);
    }

    #[test]
    fn scripted_engine_clones_share_logs() {
        let engine = ScriptedEngine::with_pages(2);
        let applied = engine.applied_endpoints();
        let mut clone = engine.clone();
        crate::pdf::RenderEngine::configure_worker(
            &mut clone,
            &crate::pdf::WorkerConfig {
                endpoint: "worker://x".to_string(),
            },
        );
        assert_eq!(applied.lock().unwrap().as_slice(), ["worker://x".to_string()]);
    }
}
