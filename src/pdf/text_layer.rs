//! Selectable text overlay positioned over the rendered page

use super::surface::Canvas;
use super::types::{ScreenRect, TextContent, Viewport};

/// One positioned run of text, in logical pixels relative to the overlay
#[derive(Clone, Debug, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Overlay container for the text of the displayed page
#[derive(Debug, Default)]
pub struct TextLayer {
    rect: ScreenRect,
    spans: Vec<TextSpan>,
    /// Unscaled page size in logical pixels the spans were laid out for
    extent: (f32, f32),
    page: Option<usize>,
}

impl TextLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.extent = (0.0, 0.0);
        self.page = None;
    }

    /// Matches the overlay's offset and size to the canvas on screen
    pub fn align_to(&mut self, canvas: &Canvas) {
        self.rect = canvas.screen_rect();
    }

    #[must_use]
    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    #[must_use]
    pub fn spans(&self) -> &[TextSpan] {
        &self.spans
    }

    #[must_use]
    pub fn page(&self) -> Option<usize> {
        self.page
    }

    /// Spans in absolute logical pixels, stretched from the layout extent
    /// onto the overlay's current rect
    pub fn placed_spans(&self) -> impl Iterator<Item = (&str, ScreenRect)> + '_ {
        let ratio = |placed: f32, natural: f32| {
            if natural > 0.0 { placed / natural } else { 1.0 }
        };
        let sx = ratio(self.rect.width, self.extent.0);
        let sy = ratio(self.rect.height, self.extent.1);
        self.spans.iter().map(move |span| {
            let rect = ScreenRect::new(
                self.rect.left + span.left * sx,
                self.rect.top + span.top * sy,
                span.width * sx,
                span.height * sy,
            );
            (span.text.as_str(), rect)
        })
    }

    /// Plain text of the overlay, one span per line
    #[must_use]
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fills `layer` with the page text laid out through the same viewport the
/// page was rasterized with, converted back to logical pixels so the spans
/// sit on top of the glyphs in the displayed bitmap.
pub fn render_text_layer(
    content: &TextContent,
    layer: &mut TextLayer,
    viewport: &Viewport,
    device_pixel_ratio: f32,
    page: usize,
) {
    let to_screen = viewport.scale / device_pixel_ratio;

    layer.spans = content
        .items
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| TextSpan {
            text: item.text.clone(),
            left: item.x * to_screen,
            top: item.y * to_screen,
            width: item.width * to_screen,
            height: item.height * to_screen,
        })
        .collect();
    layer.extent = (
        viewport.width / device_pixel_ratio,
        viewport.height / device_pixel_ratio,
    );
    layer.page = Some(page);
}
