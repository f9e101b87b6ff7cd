//! MuPDF-backed implementation of the engine contract

use log::{debug, info};
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Pixmap, TextPageFlags};

use super::engine::{
    EngineError, EngineInfo, RenderEngine, RenderError, WorkerConfig, check_page_index,
};
use super::task::CancellationToken;
use super::types::{Bitmap, PageSize, TextContent, TextItem, Viewport};

const ENGINE_NAME: &str = "mupdf";
const ENGINE_VERSION: &str = "0.6";

/// Renders documents MuPDF can open (PDF, XPS, EPUB, CBZ, ...) from local
/// paths or `file://` URLs.
#[derive(Clone, Debug, Default)]
pub struct MupdfEngine {
    worker_endpoint: Option<String>,
}

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a source identifier to a filesystem path
fn resolve_source(source: &str) -> Result<&str, EngineError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(EngineError::EmptySource);
    }
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(path);
    }
    if source.contains("://") {
        return Err(EngineError::UnsupportedSource(source.to_string()));
    }
    Ok(source)
}

impl RenderEngine for MupdfEngine {
    type Document = Document;

    fn info(&self) -> EngineInfo {
        EngineInfo::new(ENGINE_NAME, ENGINE_VERSION)
    }

    fn configure_worker(&mut self, config: &WorkerConfig) {
        if self.worker_endpoint.as_deref() == Some(config.endpoint.as_str()) {
            return;
        }
        // Rendering stays in-process; the endpoint only identifies the worker
        info!("MuPDF worker endpoint set to {}", config.endpoint);
        self.worker_endpoint = Some(config.endpoint.clone());
    }

    fn open_document(&mut self, source: &str) -> Result<Document, EngineError> {
        let path = resolve_source(source)?;
        debug!("MuPDF opening {path}");
        Document::open(path).map_err(|e| EngineError::Open {
            path: source.to_string(),
            detail: e.to_string(),
        })
    }

    fn page_count(&self, doc: &Document) -> usize {
        doc.page_count().map(|n| n.max(0) as usize).unwrap_or(0)
    }

    fn page_size(&self, doc: &Document, index: usize) -> Result<PageSize, EngineError> {
        check_page_index(index, self.page_count(doc))?;
        let page = doc.load_page((index - 1) as i32)?;
        let bounds = page.bounds()?;
        Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render_page(
        &self,
        doc: &Document,
        index: usize,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> Result<Bitmap, RenderError> {
        check_page_index(index, self.page_count(doc))?;
        let page = doc.load_page((index - 1) as i32).map_err(EngineError::from)?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let transform = Matrix::new_scale(viewport.scale, viewport.scale);
        let rgb = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&transform, &rgb, false, false)
            .map_err(EngineError::from)?;

        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(pixmap_to_bitmap(&pixmap)?)
    }

    fn text_content(&self, doc: &Document, index: usize) -> Result<TextContent, EngineError> {
        check_page_index(index, self.page_count(doc))?;
        let page = doc.load_page((index - 1) as i32)?;
        let text_page = page.to_text_page(TextPageFlags::empty())?;

        let mut items = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                if text.trim().is_empty() {
                    continue;
                }
                let bbox = line.bounds();
                items.push(TextItem {
                    text,
                    x: bbox.x0.min(bbox.x1),
                    y: bbox.y0.min(bbox.y1),
                    width: (bbox.x1 - bbox.x0).abs(),
                    height: (bbox.y1 - bbox.y0).abs(),
                });
            }
        }

        Ok(TextContent { items })
    }
}

fn pixmap_to_bitmap(pixmap: &Pixmap) -> Result<Bitmap, EngineError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(EngineError::engine(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(EngineError::engine("Pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            pixels.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                pixels.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(Bitmap {
        width: pixmap.width(),
        height: pixmap.height(),
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paths_and_file_urls() {
        assert_eq!(resolve_source("docs/a.pdf").unwrap(), "docs/a.pdf");
        assert_eq!(resolve_source("file:///tmp/a.pdf").unwrap(), "/tmp/a.pdf");
    }

    #[test]
    fn rejects_remote_and_empty_sources() {
        assert!(matches!(
            resolve_source("https://example.com/a.pdf"),
            Err(EngineError::UnsupportedSource(_))
        ));
        assert!(matches!(resolve_source("  "), Err(EngineError::EmptySource)));
    }

    #[test]
    fn configuring_records_the_endpoint() {
        let mut engine = MupdfEngine::new();
        let info = engine.info();
        engine.configure_worker(&WorkerConfig::default_for(&info));
        assert_eq!(engine.worker_endpoint.as_deref(), Some("worker://mupdf/0.6"));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let mut engine = MupdfEngine::new();
        let result = engine.open_document("/definitely/not/here.pdf");
        assert!(matches!(result, Err(EngineError::Open { .. })));
    }
}
