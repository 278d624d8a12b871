//! Raster output composition
//!
//! The visible part of the source is cut out first and only that part is
//! resampled, so fill modes with a large overflow never allocate the full
//! scaled image.

use super::PageJob;
use crate::layout::{GeometryUnit, Rect};
use crate::source::SourceDocument;
use crate::types::*;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::borrow::Cow;
use std::io::Cursor;

/// Largest bitmap requested from the PDF rasteriser per axis
#[cfg(feature = "pdfium")]
const MAX_RASTERIZE_PX: u32 = 16384;

pub(crate) fn render_png(source: &SourceDocument, page: &PageJob, background: Color) -> Result<Vec<u8>> {
    let canvas = compose_page(source, page, background)?;
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Compose one page onto a canvas filled with the background colour.
pub fn compose_page(source: &SourceDocument, page: &PageJob, background: Color) -> Result<RgbaImage> {
    let geometry = &page.geometry;
    if geometry.unit != GeometryUnit::Px {
        return Err(ResizeError::Render(
            "PNG output needs pixel geometry".to_string(),
        ));
    }

    let (width, height) = geometry.pixel_size();
    let fill = Rgba([background.r, background.g, background.b, 255]);
    let mut canvas = RgbaImage::from_pixel(width, height, fill);

    let placed = page.placed_source_rect();
    if let Some(visible) = placed.intersection(&geometry.clip_rect) {
        let bitmap = source_bitmap(source, page, &placed)?;
        draw_visible(&mut canvas, &bitmap, &placed, &visible);
    }

    for band in &geometry.mask_regions {
        fill_rect(&mut canvas, band, fill);
    }

    Ok(canvas)
}

/// Full, untrimmed source page as a bitmap
fn source_bitmap<'a>(
    source: &'a SourceDocument,
    page: &PageJob,
    placed: &Rect,
) -> Result<Cow<'a, DynamicImage>> {
    if let Some(image) = source.raster() {
        return Ok(Cow::Borrowed(image));
    }
    rasterize_pdf_page(source, page.page_index(), placed).map(Cow::Owned)
}

/// Cut the visible part out of the bitmap, resample it and paint it.
fn draw_visible(canvas: &mut RgbaImage, bitmap: &DynamicImage, placed: &Rect, visible: &Rect) {
    let (bitmap_width, bitmap_height) = (bitmap.width(), bitmap.height());
    if bitmap_width == 0 || bitmap_height == 0 {
        return;
    }
    let sx = bitmap_width as f64 / placed.width;
    let sy = bitmap_height as f64 / placed.height;

    let src_x = (((visible.x - placed.x) * sx).floor().max(0.0) as u32).min(bitmap_width - 1);
    let src_y = (((visible.y - placed.y) * sy).floor().max(0.0) as u32).min(bitmap_height - 1);
    let src_right = (((visible.right() - placed.x) * sx).ceil() as u32).clamp(src_x + 1, bitmap_width);
    let src_bottom =
        (((visible.bottom() - placed.y) * sy).ceil() as u32).clamp(src_y + 1, bitmap_height);

    let dest_x = visible.x.round();
    let dest_y = visible.y.round();
    let dest_width = (visible.right().round() - dest_x).max(1.0) as u32;
    let dest_height = (visible.bottom().round() - dest_y).max(1.0) as u32;

    let patch = bitmap
        .crop_imm(src_x, src_y, src_right - src_x, src_bottom - src_y)
        .resize_exact(dest_width, dest_height, FilterType::Lanczos3)
        .to_rgba8();
    imageops::overlay(canvas, &patch, dest_x as i64, dest_y as i64);
}

fn fill_rect(canvas: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let clamp_x = |v: f64| v.round().clamp(0.0, canvas.width() as f64) as u32;
    let clamp_y = |v: f64| v.round().clamp(0.0, canvas.height() as f64) as u32;
    let (x0, x1) = (clamp_x(rect.x), clamp_x(rect.right()));
    let (y0, y1) = (clamp_y(rect.y), clamp_y(rect.bottom()));
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

#[cfg(feature = "pdfium")]
fn rasterize_pdf_page(source: &SourceDocument, page_index: usize, placed: &Rect) -> Result<DynamicImage> {
    use crate::units::round_px;
    use pdfium_render::prelude::*;

    let pdfium = binding::shared()?;
    let width = round_px(placed.width).min(MAX_RASTERIZE_PX);
    let height = round_px(placed.height).min(MAX_RASTERIZE_PX);

    let render = || -> std::result::Result<(Vec<u8>, u32, u32), PdfiumError> {
        let document = pdfium.load_pdf_from_byte_slice(source.bytes(), None)?;
        let page = document.pages().get(page_index as u16)?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page.render_with_config(&config)?;
        Ok((
            bitmap.as_rgba_bytes().to_vec(),
            bitmap.width() as u32,
            bitmap.height() as u32,
        ))
    };

    let (rgba, width, height) =
        render().map_err(|e| ResizeError::Render(format!("Failed to rasterise page: {}", e)))?;
    RgbaImage::from_raw(width, height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ResizeError::Render("Rasteriser returned a truncated bitmap".to_string()))
}

#[cfg(not(feature = "pdfium"))]
fn rasterize_pdf_page(_source: &SourceDocument, page_index: usize, _placed: &Rect) -> Result<DynamicImage> {
    Err(ResizeError::Render(format!(
        "Page {}: PDF to PNG needs the `pdfium` feature",
        page_index + 1
    )))
}

/// Process-wide Pdfium binding
#[cfg(feature = "pdfium")]
pub(crate) mod binding {
    use crate::types::{ResizeError, Result};
    use pdfium_render::prelude::Pdfium;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    /// Directory holding the Pdfium library, checked before the bundled locations
    pub const LIBRARY_DIR_ENV: &str = "PDF_RESIZE_PDFIUM_DIR";

    static PDFIUM: OnceLock<std::result::Result<Pdfium, String>> = OnceLock::new();

    /// The Pdfium instance, bound on first use.
    ///
    /// A failed bind is remembered too, so every later page reports the same
    /// error without searching the filesystem again.
    pub fn shared() -> Result<&'static Pdfium> {
        PDFIUM
            .get_or_init(bind)
            .as_ref()
            .map_err(|e| ResizeError::Render(e.clone()))
    }

    fn bind() -> std::result::Result<Pdfium, String> {
        for dir in library_dirs() {
            let path = Pdfium::pdfium_platform_library_name_at_path(&dir);
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => {
                    log::debug!("Bound Pdfium from {}", path.display());
                    return Ok(Pdfium::new(bindings));
                }
                Err(e) => log::debug!("No usable Pdfium at {}: {}", path.display(), e),
            }
        }
        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| format!("Pdfium library not found: {}", e))
    }

    /// Candidate directories in lookup order: the override, then `vendor/pdfium/lib`
    /// next to the executable and under the working directory
    pub(crate) fn library_dirs() -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(dir) = std::env::var_os(LIBRARY_DIR_ENV) {
            dirs.push(PathBuf::from(dir));
        }
        let bases = [
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(PathBuf::from)),
            std::env::current_dir().ok(),
        ];
        for base in bases.into_iter().flatten() {
            let dir = base.join("vendor").join("pdfium").join("lib");
            if dir.is_dir() && !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_binding_is_shared() {
            // Whether or not a library is installed, every caller sees the same outcome
            match (shared(), shared()) {
                (Ok(first), Ok(second)) => assert!(std::ptr::eq(first, second)),
                (Err(first), Err(second)) => assert_eq!(first.to_string(), second.to_string()),
                _ => panic!("Pdfium binding changed between calls"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_clamps_to_canvas() {
        let mut canvas = RgbaImage::new(4, 4);
        let red = Rgba([255, 0, 0, 255]);
        fill_rect(&mut canvas, &Rect::new(-2.0, 3.0, 10.0, 5.0), red);
        assert_eq!(*canvas.get_pixel(0, 3), red);
        assert_eq!(*canvas.get_pixel(3, 3), red);
        assert_eq!(*canvas.get_pixel(0, 2), Rgba([0, 0, 0, 0]));
    }
}
