//! Rendering of resized pages
//!
//! A renderer turns one decoded source plus a list of computed page
//! geometries into the bytes of one output file:
//! - PDF output places each source page as a Form XObject (or image XObject)
//! - PNG output composes a single page onto a pixel canvas
//!
//! Placement, clipping and mask bands always come from the `OutputGeometry`;
//! renderers never re-derive layout.

mod pdf;
mod raster;
mod xobject;

pub use raster::compose_page;
pub use xobject::{
    copy_object_deep, create_page_xobject, page_dimensions_pt, page_media_box, page_rotation,
    page_visible_box,
};

use crate::layout::{OutputGeometry, Rect, SourceGeometry};
use crate::source::SourceDocument;
use crate::types::*;

/// One source page and where it goes on its output canvas
#[derive(Debug, Clone, PartialEq)]
pub struct PageJob {
    pub source: SourceGeometry,
    pub geometry: OutputGeometry,
}

impl PageJob {
    pub fn page_index(&self) -> usize {
        self.source.page_index
    }

    /// Canvas rectangle covered by the untrimmed source page.
    ///
    /// `content_rect` covers the trimmed page; the trim is pushed outside it
    /// and cut away by the clip.
    pub fn placed_source_rect(&self) -> Rect {
        let bleed = self.source.trim * self.geometry.content_scale;
        let content = self.geometry.content_rect;
        Rect::new(
            content.x - bleed,
            content.y - bleed,
            content.width + 2.0 * bleed,
            content.height + 2.0 * bleed,
        )
    }
}

/// Everything needed to produce one output file
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub format: OutputFormat,
    pub pages: Vec<PageJob>,
    pub background: Color,
}

/// Produces output bytes for a render job.
///
/// Implementations are called from blocking worker threads and may be shared
/// between concurrent tasks, each holding its own `SourceDocument`.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, source: &SourceDocument, job: &RenderJob) -> Result<Vec<u8>>;
}

/// Renderer for every PDF/raster source and PDF/PNG output combination
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer;

impl Renderer for DocumentRenderer {
    fn render(&self, source: &SourceDocument, job: &RenderJob) -> Result<Vec<u8>> {
        if job.pages.is_empty() {
            return Err(ResizeError::NoPages);
        }
        match job.format {
            OutputFormat::Pdf => pdf::render_pdf(source, &job.pages, job.background),
            OutputFormat::Png => {
                let [page] = job.pages.as_slice() else {
                    return Err(ResizeError::Render(format!(
                        "PNG output holds one page, got {}",
                        job.pages.len()
                    )));
                };
                raster::render_png(source, page, job.background)
            }
        }
    }
}
