//! Source page access for vector output
//!
//! Source pages are wrapped as Form XObjects so the output page can place,
//! scale and clip them with a single `cm`/`Do` pair.

use crate::types::Result;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// US Letter in points, used when a page has no readable MediaBox
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cyclic `Parent` chains in broken files
const MAX_TREE_DEPTH: usize = 32;

// =============================================================================
// Page Boxes
// =============================================================================

/// Normalised MediaBox `[llx, lly, urx, ury]` of a page in points.
///
/// The box is looked up through the page tree, as MediaBox is inheritable.
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4]> {
    Ok(page_box(doc, page_id, b"MediaBox")?.unwrap_or(FALLBACK_MEDIA_BOX))
}

/// The part of a page a viewer shows: the CropBox clipped to the MediaBox,
/// or the MediaBox when there is no usable CropBox.
pub fn page_visible_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4]> {
    let [mx0, my0, mx1, my1] = page_media_box(doc, page_id)?;
    let Some([cx0, cy0, cx1, cy1]) = page_box(doc, page_id, b"CropBox")? else {
        return Ok([mx0, my0, mx1, my1]);
    };
    let visible = [mx0.max(cx0), my0.max(cy0), mx1.min(cx1), my1.min(cy1)];
    if visible[2] - visible[0] <= 0.0 || visible[3] - visible[1] <= 0.0 {
        return Ok([mx0, my0, mx1, my1]);
    }
    Ok(visible)
}

/// Clockwise display rotation of a page: 0, 90, 180 or 270
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> Result<u16> {
    let degrees = match inherited_attribute(doc, page_id, b"Rotate")? {
        Some(value) => resolve(doc, &value)?.as_i64().unwrap_or(0),
        None => 0,
    };
    Ok((degrees.rem_euclid(360) / 90 * 90) as u16)
}

/// Displayed page size `(width, height)` in points, after crop and rotation
pub fn page_dimensions_pt(doc: &Document, page_id: ObjectId) -> Result<(f64, f64)> {
    let [x0, y0, x1, y1] = page_visible_box(doc, page_id)?;
    let (width, height) = (x1 - x0, y1 - y0);
    match page_rotation(doc, page_id)? {
        90 | 270 => Ok((height, width)),
        _ => Ok((width, height)),
    }
}

/// `cm` operands that draw a page's visible box, rotated as displayed and
/// scaled by `scale`, with its displayed lower-left corner at `(x, y)`.
pub fn placement_matrix(visible_box: [f64; 4], rotation: u16, scale: f64, x: f64, y: f64) -> [f64; 6] {
    let [x0, y0, x1, y1] = visible_box;
    let s = scale;
    match rotation {
        90 => [0.0, -s, s, 0.0, x - s * y0, y + s * x1],
        180 => [-s, 0.0, 0.0, -s, x + s * x1, y + s * y1],
        270 => [0.0, s, -s, 0.0, x + s * y1, y - s * x0],
        _ => [s, 0.0, 0.0, s, x - s * x0, y - s * y0],
    }
}

/// A normalised, non-empty box stored under `key`, inherited through the page tree
fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<[f64; 4]>> {
    let Some(value) = inherited_attribute(doc, page_id, key)? else {
        return Ok(None);
    };
    let values: Vec<f64> = match resolve(doc, &value)? {
        Object::Array(items) => items
            .iter()
            .filter_map(|item| resolve(doc, item).ok().and_then(extract_number))
            .collect(),
        _ => Vec::new(),
    };
    let &[x0, y0, x1, y1] = values.as_slice() else {
        return Ok(None);
    };
    let normalized = [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)];
    if normalized[2] - normalized[0] <= 0.0 || normalized[3] - normalized[1] <= 0.0 {
        return Ok(None);
    }
    Ok(Some(normalized))
}

fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<Object>> {
    let mut node = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(value.clone()));
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = doc.get_dictionary(parent)?,
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        _ => Ok(obj),
    }
}

fn extract_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

// =============================================================================
// XObject Creation
// =============================================================================

/// Wrap a source page as a Form XObject in the output document.
///
/// `cache` maps source object ids to their copies so that resources shared by
/// several pages are copied once per output document.
pub fn create_page_xobject(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    let [x0, y0, x1, y1] = page_visible_box(source, page_id)?;
    let page_dict = source.get_dictionary(page_id)?;
    let content = page_content(source, page_dict)?;

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set(
        "BBox",
        Object::Array(
            [x0, y0, x1, y1]
                .into_iter()
                .map(|v| Object::Real(v as f32))
                .collect(),
        ),
    );

    if let Some(resources) = inherited_attribute(source, page_id, b"Resources")? {
        xobject_dict.set(
            "Resources",
            copy_object_deep(output, source, &resources, cache)?,
        );
    }

    Ok(output.add_object(Stream::new(xobject_dict, content)))
}

/// Add an uncompressed 8-bit RGB image XObject
pub fn create_image_xobject(output: &mut Document, width: u32, height: u32, rgb: Vec<u8>) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    output.add_object(Stream::new(dict, rgb))
}

// =============================================================================
// Page Content Extraction
// =============================================================================

/// Decoded content of a page; multiple content streams are concatenated.
fn page_content(doc: &Document, page_dict: &Dictionary) -> Result<Vec<u8>> {
    let contents = match page_dict.get(b"Contents") {
        Ok(c) => c,
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Array(refs) => concatenated_streams(doc, refs),
            Object::Stream(stream) => Ok(stream_data(stream)),
            _ => Ok(Vec::new()),
        },
        Object::Array(refs) => concatenated_streams(doc, refs),
        _ => Ok(Vec::new()),
    }
}

fn concatenated_streams(doc: &Document, refs: &[Object]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    for obj in refs {
        if let Object::Reference(id) = obj {
            if let Ok(stream) = doc.get_object(*id)?.as_stream() {
                result.extend_from_slice(&stream_data(stream));
                result.push(b'\n');
            }
        }
    }
    Ok(result)
}

fn stream_data(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

// =============================================================================
// Deep Copy
// =============================================================================

/// Deep copy an object from source to output document, following references.
pub fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }

            // Reserve the id first so self-referencing structures terminate
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);
            let copied = match source.get_object(*id) {
                Ok(referenced) => copy_object_deep(output, source, referenced, cache)?,
                Err(_) => Object::Null,
            };
            output.objects.insert(new_id, copied);

            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(copy_dictionary(
            output, source, dict, cache,
        )?)),
        Object::Array(arr) => {
            let new_arr: Result<Vec<_>> = arr
                .iter()
                .map(|item| copy_object_deep(output, source, item, cache))
                .collect();
            Ok(Object::Array(new_arr?))
        }
        Object::Stream(stream) => Ok(Object::Stream(Stream {
            dict: copy_dictionary(output, source, &stream.dict, cache)?,
            content: stream.content.clone(),
            allows_compression: stream.allows_compression,
            start_position: None,
        })),
        _ => Ok(obj.clone()),
    }
}

fn copy_dictionary(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        // Parent links would drag the whole source page tree along
        if key.as_slice() == b"Parent" {
            continue;
        }
        new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    Ok(new_dict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_doc(page_entries: Vec<(&str, Object)>, tree_entries: Vec<(&str, Object)>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::from_iter(page_entries);
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(page);

        let mut pages = Dictionary::from_iter(tree_entries);
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        (doc, page_id)
    }

    fn rect(values: [i64; 4]) -> Object {
        Object::Array(values.into_iter().map(Object::Integer).collect())
    }

    fn apply(matrix: [f64; 6], x: f64, y: f64) -> (f64, f64) {
        (
            matrix[0] * x + matrix[2] * y + matrix[4],
            matrix[1] * x + matrix[3] * y + matrix[5],
        )
    }

    #[test]
    fn test_rotation_is_inherited_and_normalised() {
        let (doc, page_id) = page_doc(
            vec![("MediaBox", rect([0, 0, 595, 842]))],
            vec![("Rotate", Object::Integer(-90))],
        );
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 270);
        assert_eq!(page_dimensions_pt(&doc, page_id).unwrap(), (842.0, 595.0));

        let (doc, page_id) = page_doc(
            vec![("MediaBox", rect([0, 0, 595, 842])), ("Rotate", Object::Integer(540))],
            vec![],
        );
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 180);
        assert_eq!(page_dimensions_pt(&doc, page_id).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn test_crop_box_limits_visible_area() {
        let (doc, page_id) = page_doc(
            vec![("CropBox", rect([50, 40, 700, 800]))],
            vec![("MediaBox", rect([0, 0, 595, 842]))],
        );
        assert_eq!(page_visible_box(&doc, page_id).unwrap(), [50.0, 40.0, 595.0, 800.0]);
        assert_eq!(page_media_box(&doc, page_id).unwrap(), [0.0, 0.0, 595.0, 842.0]);

        // A crop box outside the media box is ignored
        let (doc, page_id) = page_doc(
            vec![
                ("MediaBox", rect([0, 0, 100, 100])),
                ("CropBox", rect([200, 200, 300, 300])),
            ],
            vec![],
        );
        assert_eq!(page_visible_box(&doc, page_id).unwrap(), [0.0, 0.0, 100.0, 100.0]);
    }

    #[test]
    fn test_placement_matrix_maps_displayed_corners() {
        let visible = [10.0, 20.0, 110.0, 220.0];
        let (x, y, s) = (5.0, 7.0, 0.5);

        // Displayed top-left is the unrotated corner that rotation carries there
        let cases = [
            (0, (10.0, 220.0), (5.0, 107.0)),
            (90, (10.0, 20.0), (5.0, 57.0)),
            (180, (110.0, 20.0), (5.0, 107.0)),
            (270, (110.0, 220.0), (5.0, 57.0)),
        ];
        for (rotation, corner, expected) in cases {
            let matrix = placement_matrix(visible, rotation, s, x, y);
            let (px, py) = apply(matrix, corner.0, corner.1);
            assert!((px - expected.0).abs() < 1e-9, "rotation {}", rotation);
            assert!((py - expected.1).abs() < 1e-9, "rotation {}", rotation);
        }
    }
}
