//! Source document decoding
//!
//! A source is either a PDF (any number of vector pages) or a single raster
//! image. The original bytes are kept alongside the decoded document so that
//! concurrent workers can open private copies.

use crate::layout::SourceGeometry;
use crate::render::page_dimensions_pt;
use crate::types::*;
use crate::units::{DEFAULT_SOURCE_PPI, pt_to_mm, px_to_mm};
use image::DynamicImage;
use lopdf::{Document, ObjectId};
use std::path::Path;
use std::sync::Arc;

/// How far into the file the `%PDF` header may appear
const PDF_HEADER_SEARCH_LIMIT: usize = 1024;

/// Kind of decoded source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Raster,
}

enum Content {
    Pdf {
        document: Document,
        page_ids: Vec<ObjectId>,
    },
    Raster(DynamicImage),
}

/// A decoded source, opened once and reused across the tasks of one run
pub struct SourceDocument {
    bytes: Arc<Vec<u8>>,
    source_ppi: f64,
    content: Content,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("kind", &self.kind())
            .field("pages", &self.page_count())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl SourceDocument {
    /// Decode a PDF or image, assuming 72 ppi for images
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        Self::open_shared(Arc::new(bytes), DEFAULT_SOURCE_PPI)
    }

    /// Decode from shared bytes. `source_ppi` sets the physical size of raster
    /// sources and is ignored for PDFs.
    pub fn open_shared(bytes: Arc<Vec<u8>>, source_ppi: f64) -> Result<Self> {
        if !(source_ppi.is_finite() && source_ppi > 0.0) {
            return Err(ResizeError::Config(format!(
                "Source resolution must be positive, got {}",
                source_ppi
            )));
        }

        let content = if is_pdf(&bytes) {
            let document = Document::load_mem(&bytes)?;
            let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
            if page_ids.is_empty() {
                return Err(ResizeError::NoPages);
            }
            Content::Pdf { document, page_ids }
        } else {
            let format = image::guess_format(&bytes).map_err(|_| ResizeError::UnsupportedSource)?;
            Content::Raster(image::load_from_memory_with_format(&bytes, format)?)
        };

        Ok(Self {
            bytes,
            source_ppi,
            content,
        })
    }

    /// Decode a fresh, independent handle from the same bytes
    pub fn reopen(&self) -> Result<Self> {
        Self::open_shared(Arc::clone(&self.bytes), self.source_ppi)
    }

    pub fn kind(&self) -> SourceKind {
        match self.content {
            Content::Pdf { .. } => SourceKind::Pdf,
            Content::Raster(_) => SourceKind::Raster,
        }
    }

    pub fn page_count(&self) -> usize {
        match &self.content {
            Content::Pdf { page_ids, .. } => page_ids.len(),
            Content::Raster(_) => 1,
        }
    }

    /// Page size `(width, height)` in millimetres
    pub fn page_size(&self, index: usize) -> Result<(f64, f64)> {
        self.check_index(index)?;
        match &self.content {
            Content::Pdf { document, page_ids } => {
                let (width, height) = page_dimensions_pt(document, page_ids[index])?;
                Ok((pt_to_mm(width), pt_to_mm(height)))
            }
            Content::Raster(image) => Ok((
                px_to_mm(image.width() as f64, self.source_ppi),
                px_to_mm(image.height() as f64, self.source_ppi),
            )),
        }
    }

    /// Layout input for one page, with `trim` removed from every edge
    pub fn geometry(&self, index: usize, trim: f64) -> Result<SourceGeometry> {
        let (width, height) = self.page_size(index)?;
        Ok(SourceGeometry::new(width, height, index).with_trim(trim))
    }

    pub fn source_ppi(&self) -> f64 {
        self.source_ppi
    }

    pub fn bytes(&self) -> &Arc<Vec<u8>> {
        &self.bytes
    }

    /// The PDF document and the object id of one page
    pub fn pdf_page(&self, index: usize) -> Option<(&Document, ObjectId)> {
        match &self.content {
            Content::Pdf { document, page_ids } => {
                page_ids.get(index).map(|&id| (document, id))
            }
            Content::Raster(_) => None,
        }
    }

    pub fn raster(&self) -> Option<&DynamicImage> {
        match &self.content {
            Content::Raster(image) => Some(image),
            Content::Pdf { .. } => None,
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.page_count();
        if index >= count {
            return Err(ResizeError::PageOutOfRange { index, count });
        }
        Ok(())
    }
}

/// Load and decode a source file
pub async fn load_source(path: impl AsRef<Path>, source_ppi: f64) -> Result<SourceDocument> {
    let path = path.as_ref().to_owned();
    let bytes = Arc::new(tokio::fs::read(&path).await?);
    let source =
        tokio::task::spawn_blocking(move || SourceDocument::open_shared(bytes, source_ppi))
            .await??;
    log::debug!(
        "Loaded {} ({:?}, {} pages)",
        path.display(),
        source.kind(),
        source.page_count()
    );
    Ok(source)
}

fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(PDF_HEADER_SEARCH_LIMIT)];
    head.windows(4).any(|window| window == b"%PDF")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_raster_size_uses_source_ppi() {
        let source = SourceDocument::open_shared(Arc::new(png_bytes(300, 150)), 300.0).unwrap();
        assert_eq!(source.kind(), SourceKind::Raster);
        assert_eq!(source.page_count(), 1);
        let (w, h) = source.page_size(0).unwrap();
        assert!((w - 25.4).abs() < 1e-9);
        assert!((h - 12.7).abs() < 1e-9);
    }

    #[test]
    fn test_raster_has_only_page_zero() {
        let source = SourceDocument::open(png_bytes(10, 10)).unwrap();
        assert!(matches!(
            source.page_size(1),
            Err(ResizeError::PageOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        assert!(matches!(
            SourceDocument::open(b"hello world".to_vec()),
            Err(ResizeError::UnsupportedSource)
        ));
    }

    #[test]
    fn test_corrupt_pdf_is_decode_error() {
        let result = SourceDocument::open(b"%PDF-1.7\ngarbage".to_vec());
        assert!(matches!(
            result,
            Err(ResizeError::Pdf(_) | ResizeError::NoPages)
        ));
    }
}
