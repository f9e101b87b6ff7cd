//! Drawing surface and text overlay the coordinator draws into
//!
//! The widget owns both and lays them out; only the coordinator changes
//! their content.

use super::text_layer::TextLayer;
use super::types::{Bitmap, ScreenRect, Viewport};

/// On-screen bitmap target for a rasterized page
#[derive(Debug, Default)]
pub struct Canvas {
    /// Backing store size in device pixels
    width: u32,
    height: u32,
    /// Displayed size in logical pixels
    display_width: f32,
    display_height: f32,
    /// Position in logical pixels, written by the host layout
    offset: (f32, f32),
    /// Size the layout actually gave the canvas, when it differs from the
    /// display size
    placed_size: Option<(f32, f32)>,
    bitmap: Option<Bitmap>,
    rendered_page: Option<usize>,
}

impl Canvas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the backing store to the viewport's pixels and the displayed
    /// size to the viewport divided by the pixel ratio, so a high-density
    /// bitmap occupies the same layout space as a standard one.
    pub fn resize(&mut self, viewport: &Viewport, device_pixel_ratio: f32) {
        self.width = viewport.pixel_width();
        self.height = viewport.pixel_height();
        self.display_width = viewport.width / device_pixel_ratio;
        self.display_height = viewport.height / device_pixel_ratio;
        self.placed_size = None;
    }

    pub fn paint(&mut self, bitmap: Bitmap, page: usize) {
        if bitmap.width != self.width || bitmap.height != self.height {
            log::warn!(
                "Bitmap {}x{} does not match canvas {}x{}",
                bitmap.width,
                bitmap.height,
                self.width,
                self.height
            );
        }
        self.bitmap = Some(bitmap);
        self.rendered_page = Some(page);
    }

    /// Drops the painted bitmap, leaving the canvas blank
    pub fn clear(&mut self) {
        self.bitmap = None;
        self.rendered_page = None;
    }

    pub fn set_offset(&mut self, left: f32, top: f32) {
        self.offset = (left, top);
    }

    /// Records where the layout put the canvas, scaled to fit if needed.
    /// The placement holds until the next resize.
    pub fn set_screen_rect(&mut self, rect: ScreenRect) {
        self.offset = (rect.left, rect.top);
        self.placed_size = Some((rect.width, rect.height));
    }

    #[must_use]
    pub fn backing_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn display_size(&self) -> (f32, f32) {
        (self.display_width, self.display_height)
    }

    #[must_use]
    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    /// Page whose bitmap is currently painted
    #[must_use]
    pub fn rendered_page(&self) -> Option<usize> {
        self.rendered_page
    }

    /// Offset and on-screen size in logical pixels
    #[must_use]
    pub fn screen_rect(&self) -> ScreenRect {
        let (width, height) = self
            .placed_size
            .unwrap_or((self.display_width, self.display_height));
        ScreenRect::new(self.offset.0, self.offset.1, width, height)
    }
}

/// The two host surfaces handed to the coordinator
#[derive(Debug, Default)]
pub struct Surfaces {
    pub canvas: Canvas,
    pub overlay: TextLayer,
}

impl Surfaces {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
