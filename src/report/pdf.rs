//! Serialise a laid-out [`Document`] with `lopdf`.
//!
//! Fonts are the base-14 Helvetica family (not embedded, WinAnsi encoded).
//! Images are DCT XObjects holding the JPEG bytes unchanged. Each page gets
//! one uncompressed content stream; all pages share one resource dictionary.

use super::document::{Document, EmbeddedImage, Font, Op, PAGE_HEIGHT, PAGE_WIDTH};
use super::metrics::{to_win_ansi, MM_PER_PT};
use crate::error::RenderError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};

const FONTS: [(Font, &str, &str); 3] = [
    (Font::Regular, "F1", "Helvetica"),
    (Font::Bold, "F2", "Helvetica-Bold"),
    (Font::Italic, "F3", "Helvetica-Oblique"),
];

/// Line width for cell borders, 0.2 mm.
const LINE_WIDTH_MM: f64 = 0.2;

/// Serialise `doc` to a complete PDF file.
pub fn write(doc: &Document) -> Result<Vec<u8>, RenderError> {
    let mut pdf = lopdf::Document::with_version("1.4");
    let pages_id = pdf.new_object_id();

    let mut fonts = Dictionary::new();
    for (_, name, base) in FONTS {
        let id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(name, id);
    }

    let mut resources = dictionary! { "Font" => fonts };
    if !doc.images.is_empty() {
        let mut xobjects = Dictionary::new();
        for (i, img) in doc.images.iter().enumerate() {
            let id = pdf.add_object(image_xobject(img));
            xobjects.set(image_name(i), id);
        }
        resources.set("XObject", xobjects);
    }
    let resources_id = pdf.add_object(resources);

    let mut kids = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let content = Content {
            operations: operations(&page.ops),
        };
        let encoded = content.encode().map_err(pdf_error)?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => doc.pages.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                pt(PAGE_WIDTH),
                pt(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Producer" => Object::string_literal("AgroPulse"),
        "Title" => text_string(&doc.title),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);

    let mut out = Vec::new();
    pdf.save_to(&mut out).map_err(pdf_error)?;
    Ok(out)
}

fn image_xobject(img: &EmbeddedImage) -> Stream {
    let color_space = if img.grayscale {
        "DeviceGray"
    } else {
        "DeviceRGB"
    };
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(img.width),
            "Height" => i64::from(img.height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        img.jpeg.clone(),
    )
}

fn operations(ops: &[Op]) -> Vec<Operation> {
    let mut out = vec![Operation::new("w", vec![pt(LINE_WIDTH_MM)])];

    for op in ops {
        match op {
            Op::Text {
                x,
                y,
                text,
                font,
                size,
                color,
            } => {
                out.push(Operation::new("BT", vec![]));
                out.push(Operation::new(
                    "Tf",
                    vec![font_name(*font).into(), real(*size)],
                ));
                out.push(Operation::new(
                    "rg",
                    vec![channel(color.0), channel(color.1), channel(color.2)],
                ));
                out.push(Operation::new("Td", vec![pt(*x), pt(PAGE_HEIGHT - y)]));
                out.push(Operation::new("Tj", vec![text_string(text)]));
                out.push(Operation::new("ET", vec![]));
            }
            Op::Image { index, x, y, w, h } => {
                out.push(Operation::new("q", vec![]));
                out.push(Operation::new(
                    "cm",
                    vec![
                        pt(*w),
                        Object::Integer(0),
                        Object::Integer(0),
                        pt(*h),
                        pt(*x),
                        pt(PAGE_HEIGHT - y - h),
                    ],
                ));
                out.push(Operation::new(
                    "Do",
                    vec![Object::Name(image_name(*index).into_bytes())],
                ));
                out.push(Operation::new("Q", vec![]));
            }
            Op::Rect { x, y, w, h } => {
                out.push(Operation::new(
                    "re",
                    vec![pt(*x), pt(PAGE_HEIGHT - y), pt(*w), pt(-h)],
                ));
                out.push(Operation::new("S", vec![]));
            }
        }
    }
    out
}

fn font_name(font: Font) -> &'static str {
    FONTS
        .iter()
        .find(|(f, _, _)| *f == font)
        .map_or("F1", |(_, name, _)| *name)
}

fn image_name(index: usize) -> String {
    format!("I{index}")
}

fn text_string(text: &str) -> Object {
    Object::String(to_win_ansi(text), StringFormat::Literal)
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Millimetres → points.
fn pt(mm: f64) -> Object {
    real(mm / MM_PER_PT)
}

fn channel(v: u8) -> Object {
    real(f64::from(v) / 255.0)
}

fn pdf_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Pdf(e.to_string())
}
