#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;

/// Serialized PDF with one page per `(width, height)` in points
pub fn create_test_pdf(page_sizes: &[(i64, i64)]) -> Vec<u8> {
    create_test_pdf_with(page_sizes, &[])
}

/// Like `create_test_pdf`, with extra entries (`Rotate`, `CropBox`, ...) on every page
pub fn create_test_pdf_with(page_sizes: &[(i64, i64)], page_entries: &[(&str, Object)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for &(width, height) in page_sizes {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"q 0 0 1 rg 10 10 50 50 re f Q".to_vec(),
        ));
        let mut page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]);
        for (key, value) in page_entries {
            page.set(*key, value.clone());
        }
        let page_id = doc.add_object(page);
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(page_sizes.len() as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A4 portrait in points, rounded
pub const A4_PT: (i64, i64) = (595, 842);

/// Encoded PNG filled with one colour
pub fn create_test_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// The six `cm` operands placing the source on the first output page
pub fn placement_operands(bytes: &[u8]) -> [f64; 6] {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();
    let before_cm = &content[..content.find(" cm").unwrap()];
    let operands: Vec<f64> = before_cm
        .split_whitespace()
        .rev()
        .take(6)
        .map(|token| token.parse().unwrap())
        .collect();
    [
        operands[5], operands[4], operands[3], operands[2], operands[1], operands[0],
    ]
}

/// MediaBox `(width, height)` of every page of a serialized PDF
pub fn pdf_page_sizes(bytes: &[u8]) -> Vec<(f64, f64)> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let number = |obj: &Object| match obj {
                Object::Integer(i) => *i as f64,
                Object::Real(r) => *r as f64,
                _ => panic!("MediaBox entry is not a number"),
            };
            (
                number(&media_box[2]) - number(&media_box[0]),
                number(&media_box[3]) - number(&media_box[1]),
            )
        })
        .collect()
}
