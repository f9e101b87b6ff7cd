//! Core types shared between the coordinator, the workers and the widget

/// Identifies one opened document. A new id is allocated every time the
/// document source changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

/// Page dimensions in page units (points)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Rendering geometry of a page at a given scale.
///
/// Computed fresh from a [`PageHandle`] every time a page is drawn and
/// never stored beyond the render it was computed for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    #[must_use]
    pub fn for_page(size: PageSize, scale: f32) -> Self {
        Self {
            width: size.width * scale,
            height: size.height * scale,
            scale,
        }
    }

    /// Backing-store width in device pixels
    #[must_use]
    pub fn pixel_width(&self) -> u32 {
        whole_pixels(self.width)
    }

    /// Backing-store height in device pixels
    #[must_use]
    pub fn pixel_height(&self) -> u32 {
        whole_pixels(self.height)
    }
}

fn whole_pixels(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        (value.ceil() as u32).max(1)
    } else {
        0
    }
}

/// Rasterized page, RGB with 3 bytes per pixel
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: (u8, u8, u8)) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 3);
        for _ in 0..len {
            pixels.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.pixels.get(offset..offset + 3)?;
        Some((px[0], px[1], px[2]))
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// One run of text on a page, positioned in page units with a top-left origin
#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Text content of a page as reported by the engine
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

/// Handle to a successfully opened document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentHandle {
    pub id: DocumentId,
    pub source: String,
    pub page_count: usize,
}

/// Handle to one loaded page (1-based index)
#[derive(Clone, Debug, PartialEq)]
pub struct PageHandle {
    pub document: DocumentId,
    pub source: String,
    pub index: usize,
    pub size: PageSize,
}

impl PageHandle {
    #[must_use]
    pub fn viewport(&self, scale: f32) -> Viewport {
        Viewport::for_page(self.size, scale)
    }

    /// True when both handles point at the same page of the same document
    #[must_use]
    pub fn same_page(&self, other: &PageHandle) -> bool {
        self.document == other.document && self.index == other.index
    }
}

/// Terminal cell dimensions in logical pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSize {
    pub width: u16,
    pub height: u16,
}

impl CellSize {
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::new(8, 16)
    }
}

/// Display density and cell geometry of the host terminal
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMetrics {
    /// Physical pixels per logical pixel
    pub device_pixel_ratio: f32,
    pub cell_size: CellSize,
}

impl DisplayMetrics {
    #[must_use]
    pub fn new(device_pixel_ratio: f32, cell_size: CellSize) -> Self {
        let device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            device_pixel_ratio,
            cell_size,
        }
    }
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self::new(1.0, CellSize::default())
    }
}

/// Axis-aligned rectangle in logical (on-screen) pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}
