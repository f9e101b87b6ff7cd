//! Page display widget
//!
//! Owns the requested page number and the two surfaces the coordinator
//! draws into. Rendering only lays them out and reads their content.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, StatefulWidget, Widget},
};

use crate::pdf::{Bitmap, CellSize, LoadStatus, ScreenRect, Surfaces};
use crate::theme::Base16Palette;

const PREVIOUS_LABEL: &str = "[ Previous ]";
const NEXT_LABEL: &str = "[ Next ]";
const LOADING_LABEL: &str = "Loading...";
const HALF_BLOCK: &str = "\u{2580}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagerButton {
    Previous,
    Next,
}

/// User-facing state of the page view
#[derive(Debug)]
pub struct PageViewState {
    requested_page: usize,
    page_count: Option<usize>,
    show_text_layer: bool,
    pub surfaces: Surfaces,
    canvas_area: Rect,
    previous_button: Option<Rect>,
    next_button: Option<Rect>,
}

impl PageViewState {
    pub fn new(page: usize) -> Self {
        Self {
            requested_page: page.max(1),
            page_count: None,
            show_text_layer: false,
            surfaces: Surfaces::new(),
            canvas_area: Rect::default(),
            previous_button: None,
            next_button: None,
        }
    }

    pub fn requested_page(&self) -> usize {
        self.requested_page
    }

    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }

    /// Records the page count of a newly opened document and pulls the
    /// requested page into `[1, count]`. Returns true if the page moved.
    pub fn set_page_count(&mut self, count: usize) -> bool {
        self.page_count = Some(count);
        if count == 0 {
            return false;
        }
        let clamped = self.requested_page.clamp(1, count);
        let moved = clamped != self.requested_page;
        self.requested_page = clamped;
        moved
    }

    /// Forgets the document, hiding the pager
    pub fn clear_document(&mut self) {
        self.page_count = None;
    }

    fn has_pages(&self) -> bool {
        self.page_count.is_some_and(|count| count > 0)
    }

    pub fn previous_enabled(&self) -> bool {
        self.has_pages() && self.requested_page != 1
    }

    pub fn next_enabled(&self) -> bool {
        self.page_count
            .is_some_and(|count| count > 0 && self.requested_page != count)
    }

    /// Moves one page back; `None` while the button is disabled
    pub fn previous(&mut self) -> Option<usize> {
        if !self.previous_enabled() {
            return None;
        }
        self.requested_page -= 1;
        Some(self.requested_page)
    }

    /// Moves one page forward; `None` while the button is disabled
    pub fn next(&mut self) -> Option<usize> {
        if !self.next_enabled() {
            return None;
        }
        self.requested_page += 1;
        Some(self.requested_page)
    }

    pub fn first(&mut self) -> Option<usize> {
        if !self.previous_enabled() {
            return None;
        }
        self.requested_page = 1;
        Some(1)
    }

    pub fn last(&mut self) -> Option<usize> {
        if !self.next_enabled() {
            return None;
        }
        self.requested_page = self.page_count?;
        Some(self.requested_page)
    }

    pub fn toggle_text_layer(&mut self) {
        self.show_text_layer = !self.show_text_layer;
    }

    pub fn show_text_layer(&self) -> bool {
        self.show_text_layer
    }

    /// Area the canvas occupied on the last render
    pub fn canvas_area(&self) -> Rect {
        self.canvas_area
    }

    pub fn button_at(&self, column: u16, row: u16) -> Option<PagerButton> {
        let hit = |rect: Option<Rect>| {
            rect.is_some_and(|r| {
                column >= r.x && column < r.right() && row >= r.y && row < r.bottom()
            })
        };
        if hit(self.previous_button) {
            Some(PagerButton::Previous)
        } else if hit(self.next_button) {
            Some(PagerButton::Next)
        } else {
            None
        }
    }

    /// Applies a click; returns the new page when a live button was hit
    pub fn click(&mut self, column: u16, row: u16) -> Option<usize> {
        match self.button_at(column, row)? {
            PagerButton::Previous => self.previous(),
            PagerButton::Next => self.next(),
        }
    }
}

/// Renders the status line, the page canvas with its text overlay and the
/// pager.
pub struct PageView<'a> {
    status: &'a LoadStatus,
    palette: &'a Base16Palette,
    cell_size: CellSize,
    title: Option<&'a str>,
}

impl<'a> PageView<'a> {
    pub fn new(status: &'a LoadStatus, palette: &'a Base16Palette) -> Self {
        Self {
            status,
            palette,
            cell_size: CellSize::default(),
            title: None,
        }
    }

    pub fn cell_size(mut self, cell_size: CellSize) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    fn status_line(&self, state: &PageViewState) -> Option<Line<'a>> {
        match self.status {
            LoadStatus::Failed(message) => Some(Line::from(Span::styled(
                format!(" {message} "),
                self.palette.status_style(true),
            ))),
            LoadStatus::Loading if !state.has_pages() => Some(
                Line::from(Span::styled(LOADING_LABEL, self.palette.status_style(false)))
                    .centered(),
            ),
            _ => self.title.map(|title| {
                Line::from(Span::styled(title, self.palette.status_style(false))).centered()
            }),
        }
    }

    fn render_pager(&self, area: Rect, buf: &mut Buffer, state: &mut PageViewState) {
        state.previous_button = None;
        state.next_button = None;
        let Some(count) = state.page_count.filter(|count| *count > 0) else {
            return;
        };

        let label = format!("  Page {} / {count}  ", state.requested_page);
        let total = (PREVIOUS_LABEL.len() + label.len() + NEXT_LABEL.len()) as u16;
        let mut x = area.x + area.width.saturating_sub(total) / 2;

        let previous = put(
            buf,
            area,
            x,
            PREVIOUS_LABEL,
            self.palette.button_style(state.previous_enabled()),
        );
        x = x.saturating_add(PREVIOUS_LABEL.len() as u16);
        put(buf, area, x, &label, self.palette.status_style(false));
        x = x.saturating_add(label.len() as u16);
        let next = put(
            buf,
            area,
            x,
            NEXT_LABEL,
            self.palette.button_style(state.next_enabled()),
        );

        state.previous_button = previous;
        state.next_button = next;
    }
}

/// Writes `text` on the first row of `area` starting at column `x`,
/// clipped to the area. Returns the occupied cells.
fn put(buf: &mut Buffer, area: Rect, x: u16, text: &str, style: Style) -> Option<Rect> {
    if x >= area.right() || area.height == 0 {
        return None;
    }
    let room = area.right() - x;
    let (end, _) = buf.set_stringn(x, area.y, text, usize::from(room), style);
    Some(Rect::new(x, area.y, end - x, 1))
}

/// Largest cell rectangle with the canvas's aspect ratio that fits `area`,
/// horizontally centred. Never scales up.
fn fit_canvas(display: (f32, f32), cell: CellSize, area: Rect) -> Rect {
    let (width, height) = display;
    if width <= 0.0 || height <= 0.0 || area.is_empty() {
        return Rect::new(area.x, area.y, 0, 0);
    }
    let cols = width / f32::from(cell.width.max(1));
    let rows = height / f32::from(cell.height.max(1));
    let fit = (f32::from(area.width) / cols)
        .min(f32::from(area.height) / rows)
        .min(1.0);

    let target_width = ((cols * fit).round() as u16).clamp(1, area.width);
    let target_height = ((rows * fit).round() as u16).clamp(1, area.height);
    let x = area.x + (area.width - target_width) / 2;
    Rect::new(x, area.y, target_width, target_height)
}

/// Cell rectangle in logical pixels
fn cells_to_pixels(rect: Rect, cell: CellSize) -> ScreenRect {
    let (cw, ch) = (f32::from(cell.width), f32::from(cell.height));
    ScreenRect::new(
        f32::from(rect.x) * cw,
        f32::from(rect.y) * ch,
        f32::from(rect.width) * cw,
        f32::from(rect.height) * ch,
    )
}

/// Draws `bitmap` into `target` with upper half blocks, two bitmap rows
/// per terminal cell.
fn paint_bitmap(bitmap: &Bitmap, target: Rect, buf: &mut Buffer) {
    if bitmap.width == 0 || bitmap.height == 0 || target.is_empty() {
        return;
    }
    let sub_rows = u32::from(target.height) * 2;
    let cols = u32::from(target.width);

    for row in 0..target.height {
        let top_y = (u32::from(row) * 2 * bitmap.height) / sub_rows;
        let bottom_y = ((u32::from(row) * 2 + 1) * bitmap.height) / sub_rows;
        for col in 0..target.width {
            let sx = (u32::from(col) * bitmap.width) / cols;
            let (tr, tg, tb) = bitmap.pixel(sx, top_y).unwrap_or_default();
            let (br, bg, bb) = bitmap.pixel(sx, bottom_y).unwrap_or_default();
            if let Some(cell) = buf.cell_mut((target.x + col, target.y + row)) {
                cell.set_symbol(HALF_BLOCK)
                    .set_fg(Color::Rgb(tr, tg, tb))
                    .set_bg(Color::Rgb(br, bg, bb));
            }
        }
    }
}

impl StatefulWidget for PageView<'_> {
    type State = PageViewState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let [status_area, canvas_area, pager_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(area);

        if let Some(line) = self.status_line(state) {
            Paragraph::new(line).render(status_area, buf);
        }

        // The canvas is laid out even while loading so the coordinator
        // always has a positioned surface to draw into.
        let cell = self.cell_size;
        let canvas = &mut state.surfaces.canvas;
        let target = fit_canvas(canvas.display_size(), cell, canvas_area);
        canvas.set_screen_rect(cells_to_pixels(target, cell));
        state.canvas_area = target;

        if let Some(bitmap) = canvas.bitmap() {
            paint_bitmap(bitmap, target, buf);
        }

        if state.show_text_layer {
            let style = self.palette.overlay_style();
            let (cw, ch) = (f32::from(cell.width.max(1)), f32::from(cell.height.max(1)));
            for (text, rect) in state.surfaces.overlay.placed_spans() {
                if rect.left < 0.0 || rect.top < 0.0 {
                    continue;
                }
                let col = (rect.left / cw) as u16;
                let row = (rect.top / ch) as u16;
                let inside = (target.x..target.right()).contains(&col)
                    && (target.y..target.bottom()).contains(&row);
                if !inside {
                    continue;
                }
                let room = usize::from(target.right() - col);
                buf.set_stringn(col, row, text, room, style);
            }
        }

        self.render_pager(pager_area, buf, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{PageSize, Viewport};
    use crate::test_utils::test_helpers::capture_terminal_state;
    use crate::theme::OCEANIC_NEXT;
    use ratatui::{Terminal, backend::TestBackend};

    fn state_with(page: usize, count: usize) -> PageViewState {
        let mut state = PageViewState::new(page);
        state.set_page_count(count);
        state
    }

    #[test]
    fn navigation_bounds_follow_requested_page() {
        let state = state_with(1, 3);
        assert!(!state.previous_enabled());
        assert!(state.next_enabled());

        let state = state_with(2, 3);
        assert!(state.previous_enabled());
        assert!(state.next_enabled());

        let state = state_with(3, 3);
        assert!(state.previous_enabled());
        assert!(!state.next_enabled());
    }

    #[test]
    fn single_page_document_disables_both_buttons() {
        let mut state = state_with(1, 1);
        assert!(!state.previous_enabled());
        assert!(!state.next_enabled());
        assert_eq!(state.next(), None);
        assert_eq!(state.previous(), None);
        assert_eq!(state.requested_page(), 1);
    }

    #[test]
    fn no_navigation_without_document() {
        let mut state = PageViewState::new(2);
        assert!(!state.previous_enabled());
        assert!(!state.next_enabled());
        assert_eq!(state.previous(), None);
    }

    #[test]
    fn page_count_clamps_requested_page() {
        let mut state = PageViewState::new(9);
        assert!(state.set_page_count(3));
        assert_eq!(state.requested_page(), 3);
        assert!(!state.set_page_count(5));
    }

    #[test]
    fn first_and_last_jump_to_bounds() {
        let mut state = state_with(2, 5);
        assert_eq!(state.last(), Some(5));
        assert_eq!(state.last(), None);
        assert_eq!(state.first(), Some(1));
        assert_eq!(state.first(), None);
    }

    #[test]
    fn fit_keeps_aspect_and_centres() {
        let cell = CellSize::new(10, 20);
        let rect = fit_canvas((200.0, 400.0), cell, Rect::new(0, 1, 40, 10));
        assert_eq!(rect, Rect::new(15, 1, 10, 10));
        assert_eq!(
            cells_to_pixels(rect, cell),
            ScreenRect::new(150.0, 20.0, 100.0, 200.0)
        );
    }

    #[test]
    fn renders_loading_state_without_pager() {
        let mut terminal = Terminal::new(TestBackend::new(30, 6)).unwrap();
        let mut state = PageViewState::new(1);
        terminal
            .draw(|f| {
                f.render_stateful_widget(
                    PageView::new(&LoadStatus::Loading, &OCEANIC_NEXT),
                    f.area(),
                    &mut state,
                )
            })
            .unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains(LOADING_LABEL));
        assert!(!screen.contains("Next"));
        assert_eq!(state.button_at(0, 5), None);
    }

    #[test]
    fn renders_bitmap_and_pager() {
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        let mut state = state_with(1, 3);
        let viewport = Viewport::for_page(PageSize::new(80.0, 96.0), 1.0);
        state.surfaces.canvas.resize(&viewport, 1.0);
        state
            .surfaces
            .canvas
            .paint(Bitmap::filled(80, 96, (200, 10, 10)), 1);

        terminal
            .draw(|f| {
                f.render_stateful_widget(
                    PageView::new(&LoadStatus::Ready, &OCEANIC_NEXT).cell_size(CellSize::new(8, 16)),
                    f.area(),
                    &mut state,
                )
            })
            .unwrap();

        // 80x96 logical pixels at 8x16 cells is 10x6 cells, centred
        assert_eq!(state.canvas_area(), Rect::new(15, 1, 10, 6));
        assert_eq!(
            state.surfaces.canvas.screen_rect().left,
            15.0 * 8.0,
        );
        let buffer = terminal.backend().buffer();
        assert_eq!(buffer[(15, 1)].symbol(), HALF_BLOCK);
        assert_eq!(buffer[(15, 1)].fg, Color::Rgb(200, 10, 10));

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("[ Previous ]  Page 1 / 3  [ Next ]"));

        let previous = state.previous_button.unwrap();
        let next = state.next_button.unwrap();
        assert_eq!(state.click(previous.x, previous.y), None);
        assert_eq!(state.click(next.x + 1, next.y), Some(2));
    }

    #[test]
    fn failed_status_is_shown() {
        let mut terminal = Terminal::new(TestBackend::new(50, 4)).unwrap();
        let mut state = PageViewState::new(1);
        let status = LoadStatus::Failed("Failed to open document: boom".to_string());
        terminal
            .draw(|f| {
                f.render_stateful_widget(PageView::new(&status, &OCEANIC_NEXT), f.area(), &mut state)
            })
            .unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("Failed to open document: boom"));
        assert!(!screen.contains(LOADING_LABEL));
    }

    #[test]
    fn shrunk_canvas_carries_overlay_with_it() {
        use crate::pdf::{TextContent, TextItem, render_text_layer};

        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        let mut state = state_with(1, 1);
        let viewport = Viewport::for_page(PageSize::new(100.0, 200.0), 1.0);
        state.surfaces.canvas.resize(&viewport, 1.0);
        let content = TextContent {
            items: vec![TextItem {
                text: "Abstract".to_string(),
                x: 50.0,
                y: 100.0,
                width: 40.0,
                height: 12.0,
            }],
        };
        render_text_layer(&content, &mut state.surfaces.overlay, &viewport, 1.0, 1);
        state.toggle_text_layer();

        let draw = |terminal: &mut Terminal<TestBackend>, state: &mut PageViewState| {
            terminal
                .draw(|f| {
                    f.render_stateful_widget(
                        PageView::new(&LoadStatus::Ready, &OCEANIC_NEXT),
                        f.area(),
                        state,
                    )
                })
                .unwrap();
        };
        draw(&mut terminal, &mut state);
        let surfaces = &mut state.surfaces;
        surfaces.overlay.align_to(&surfaces.canvas);
        draw(&mut terminal, &mut state);

        // 12.5x12.5 cells shrunk to the 10 free rows
        let area = state.canvas_area();
        assert_eq!(area, Rect::new(15, 1, 10, 10));
        let painted = ScreenRect::new(120.0, 16.0, 80.0, 160.0);
        assert_eq!(state.surfaces.canvas.screen_rect(), painted);
        assert_eq!(state.surfaces.overlay.rect(), painted);

        // (50, 100) on the unscaled page lands at (160, 96) px: cell (20, 6)
        let buffer = terminal.backend().buffer();
        let row: String = (20..28).map(|x| buffer[(x, 6)].symbol()).collect();
        // Clipped at the canvas edge
        assert_eq!(row, "Abstr   ");
    }
}
