use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::debug;
use ratatui::{Frame, Terminal};

use crate::event_source::EventSource;
use crate::pdf::{CoordinatorEvent, RenderCoordinator};
use crate::theme::Base16Palette;
use crate::widget::{PageView, PageViewState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

/// Single-document viewer: the page view plus the coordinator behind it
pub struct App {
    pub view: PageViewState,
    coordinator: RenderCoordinator,
    palette: &'static Base16Palette,
    title: String,
}

impl App {
    pub fn new(
        coordinator: RenderCoordinator,
        palette: &'static Base16Palette,
        title: impl Into<String>,
    ) -> Self {
        Self {
            view: PageViewState::new(coordinator.requested_page()),
            coordinator,
            palette,
            title: title.into(),
        }
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut RenderCoordinator {
        &mut self.coordinator
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<AppAction> {
        match event {
            Event::Key(key) => self.handle_key_event(*key),
            Event::Mouse(mouse) => {
                self.handle_mouse_event(*mouse);
                None
            }
            _ => None,
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let target = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(AppAction::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(AppAction::Quit);
            }
            KeyCode::Char('n' | 'l') | KeyCode::Right | KeyCode::PageDown => self.view.next(),
            KeyCode::Char('p' | 'h') | KeyCode::Left | KeyCode::PageUp => self.view.previous(),
            KeyCode::Char('g') | KeyCode::Home => self.view.first(),
            KeyCode::Char('G') | KeyCode::End => self.view.last(),
            KeyCode::Char('t') => {
                self.view.toggle_text_layer();
                None
            }
            _ => None,
        };
        self.go_to(target);
        None
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
            let target = self.view.click(mouse.column, mouse.row);
            self.go_to(target);
        }
    }

    fn go_to(&mut self, page: Option<usize>) {
        if let Some(page) = page {
            debug!("Requested page {page}");
            self.coordinator.set_page(page);
        }
    }

    /// Runs pending coordinator continuations; returns true if anything
    /// changed on screen
    pub fn poll_renders(&mut self) -> bool {
        let events = self.coordinator.poll(&mut self.view.surfaces);
        for event in &events {
            match event {
                CoordinatorEvent::DocumentOpened { page_count } => {
                    if self.view.set_page_count(*page_count) {
                        self.coordinator.set_page(self.view.requested_page());
                    }
                }
                CoordinatorEvent::OpenFailed(_) => self.view.clear_document(),
                other => debug!("Coordinator event: {other:?}"),
            }
        }
        !events.is_empty()
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        let widget = PageView::new(self.coordinator.status(), self.palette)
            .cell_size(self.coordinator.metrics().cell_size)
            .title(&self.title);
        frame.render_stateful_widget(widget, frame.area(), &mut self.view);
    }

    /// The canvas may have moved during layout; returns true when the
    /// overlay followed it and the frame is stale
    pub fn after_draw(&mut self) -> bool {
        self.coordinator.align_overlay(&mut self.view.surfaces)
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut first_render = true;

    loop {
        let mut events_processed = 0;
        let mut should_quit = false;

        while event_source.poll(Duration::ZERO)? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;
            if app.handle_event(&event) == Some(AppAction::Quit) {
                should_quit = true;
                break;
            }
        }

        let mut needs_redraw = events_processed > 0 || first_render;
        first_render = false;

        if last_tick.elapsed() >= tick_rate || events_processed > 0 {
            needs_redraw |= app.poll_renders();
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            if app.after_draw() {
                terminal.draw(|f| app.draw(f))?;
            }
        }

        if should_quit {
            return Ok(());
        }

        if events_processed == 0 {
            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            let _ = event_source.poll(timeout)?;
        }
    }
}
