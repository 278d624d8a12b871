//! Vector output assembly

use super::PageJob;
use super::xobject::{
    create_image_xobject, create_page_xobject, page_rotation, page_visible_box, placement_matrix,
};
use crate::layout::{GeometryUnit, Rect};
use crate::source::SourceDocument;
use crate::types::*;
use crate::units::mm_to_pt;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Resource name of the placed source on every output page
const SOURCE_XOBJECT: &str = "Src";

/// Build a PDF with one output page per page job.
pub(crate) fn render_pdf(
    source: &SourceDocument,
    pages: &[PageJob],
    background: Color,
) -> Result<Vec<u8>> {
    let mut output = Document::with_version("1.7");
    let pages_tree_id = output.new_object_id();
    let mut page_refs = Vec::with_capacity(pages.len());
    let mut cache: HashMap<ObjectId, ObjectId> = HashMap::new();

    for page in pages {
        let page_id = render_page(
            &mut output,
            source,
            page,
            background,
            pages_tree_id,
            &mut cache,
        )?;
        page_refs.push(Object::Reference(page_id));
    }

    let count = page_refs.len() as i64;
    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(page_refs)),
        ("Count", Object::Integer(count)),
    ]);
    output
        .objects
        .insert(pages_tree_id, Object::Dictionary(pages_dict));

    let catalog_id = output.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_tree_id)),
    ]));
    output.trailer.set("Root", catalog_id);

    output.compress();
    let mut bytes = Vec::new();
    output.save_to(&mut bytes)?;
    Ok(bytes)
}

fn render_page(
    output: &mut Document,
    source: &SourceDocument,
    page: &PageJob,
    background: Color,
    parent_pages_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    let geometry = &page.geometry;
    if geometry.unit != GeometryUnit::Mm {
        return Err(ResizeError::Render(
            "PDF output needs millimetre geometry".to_string(),
        ));
    }

    let page_height = geometry.page_height;
    let to_pdf = |rect: &Rect| PdfRect::from_canvas(rect, page_height);
    let placed = to_pdf(&page.placed_source_rect());

    let (xobject_id, matrix) = if let Some((document, page_id)) = source.pdf_page(page.page_index())
    {
        let visible = page_visible_box(document, page_id)?;
        let rotation = page_rotation(document, page_id)?;
        let id = create_page_xobject(output, document, page_id, cache)?;
        let matrix = placement_matrix(visible, rotation, geometry.content_scale, placed.x, placed.y);
        (id, matrix)
    } else if let Some(image) = source.raster() {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let id = create_image_xobject(output, width, height, rgb.into_raw());
        (id, [placed.width, 0.0, 0.0, placed.height, placed.x, placed.y])
    } else {
        return Err(ResizeError::PageOutOfRange {
            index: page.page_index(),
            count: source.page_count(),
        });
    };

    let (r, g, b) = background.unit_components();
    let fill = format!("{} {} {} rg", num(r), num(g), num(b));
    let page_rect = PdfRect::new(0.0, 0.0, mm_to_pt(geometry.page_width), mm_to_pt(page_height));
    let clip = to_pdf(&geometry.clip_rect);

    let mut ops = Vec::new();
    ops.push(format!("q {} {} f Q\n", fill, page_rect.re()));
    ops.push(format!(
        "q {} W n {} cm /{} Do Q\n",
        clip.re(),
        matrix.iter().map(|v| num(*v)).collect::<Vec<_>>().join(" "),
        SOURCE_XOBJECT
    ));
    if !geometry.mask_regions.is_empty() {
        let bands: Vec<String> = geometry
            .mask_regions
            .iter()
            .map(|band| to_pdf(band).re())
            .collect();
        ops.push(format!("q {} {} f Q\n", fill, bands.join(" ")));
    }

    let content_id = output.add_object(Stream::new(Dictionary::new(), ops.concat().into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set(SOURCE_XOBJECT, Object::Reference(xobject_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(parent_pages_id));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_rect.width as f32),
            Object::Real(page_rect.height as f32),
        ]),
    );
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(output.add_object(page_dict))
}

/// Rectangle in PDF user space: points, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
struct PdfRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl PdfRect {
    fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a top-left-origin millimetre rectangle
    fn from_canvas(rect: &Rect, page_height_mm: f64) -> Self {
        Self::new(
            mm_to_pt(rect.x),
            mm_to_pt(page_height_mm - rect.bottom()),
            mm_to_pt(rect.width),
            mm_to_pt(rect.height),
        )
    }

    /// `re` path operator
    fn re(&self) -> String {
        format!(
            "{} {} {} {} re",
            num(self.x),
            num(self.y),
            num(self.width),
            num(self.height)
        )
    }
}

/// Fixed-precision number for content streams
fn num(value: f64) -> String {
    let formatted = format!("{:.4}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(-0.00001), "0");
        assert_eq!(num(283.464566929), "283.4646");
    }

    #[test]
    fn test_canvas_to_pdf_flips_y() {
        let rect = PdfRect::from_canvas(&Rect::new(0.0, 0.0, 25.4, 25.4), 50.8);
        assert!((rect.y - 72.0).abs() < 1e-9);
        assert!((rect.width - 72.0).abs() < 1e-9);
    }
}
