//! Embedded-image enumeration via lopdf.
//!
//! Images are the `Image`-subtype XObjects of a page's resource dictionary;
//! their placement is found by walking the page content stream with a small
//! CTM interpreter (`q`/`Q`/`cm`/`Do`). An image drawn by `Do` occupies the
//! unit square transformed by the CTM in effect at that operator.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId};
use tracing::debug;

use pagelens_core::geometry::Rect;
use pagelens_core::pdf::{EmbeddedImage, PdfError};

/// Row-vector affine matrix `[a b c d e f]`, PDF convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ctm {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Ctm {
    const IDENTITY: Ctm = Ctm {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `cm` concatenation: the operand matrix is applied before the current
    /// transform, so the new CTM is `m × self`.
    fn concat(&self, m: &Ctm) -> Ctm {
        Ctm {
            a: m.a * self.a + m.b * self.c,
            b: m.a * self.b + m.b * self.d,
            c: m.c * self.a + m.d * self.c,
            d: m.c * self.b + m.d * self.d,
            e: m.e * self.a + m.f * self.c + self.e,
            f: m.e * self.b + m.f * self.d + self.f,
        }
    }

    /// Bounding box of the transformed unit square, still in PDF user space
    /// (origin bottom-left, y up).
    fn unit_square_bbox(&self) -> (f32, f32, f32, f32) {
        let xs = [
            self.e,
            self.a + self.e,
            self.c + self.e,
            self.a + self.c + self.e,
        ];
        let ys = [
            self.f,
            self.b + self.f,
            self.d + self.f,
            self.b + self.d + self.f,
        ];
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (min_x, min_y, max_x, max_y)
    }
}

fn operand_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Collect the page's image XObjects: name → intrinsic pixel dimensions.
fn image_xobjects(
    doc: &lopdf::Document,
    page_id: ObjectId,
) -> Result<Vec<(Vec<u8>, u32, u32)>, PdfError> {
    let (direct, inherited_ids) = doc
        .get_page_resources(page_id)
        .map_err(|e| PdfError::Enumerate(e.to_string()))?;

    let mut resource_dicts: Vec<&Dictionary> = Vec::new();
    if let Some(dict) = direct {
        resource_dicts.push(dict);
    }
    for id in inherited_ids {
        if let Ok(obj) = doc.get_object(id) {
            if let Ok(dict) = obj.as_dict() {
                resource_dicts.push(dict);
            }
        }
    }

    let mut images = Vec::new();
    for resources in resource_dicts {
        let Ok(xobjects) = resources.get(b"XObject") else {
            continue;
        };
        let Ok(xobjects) = resolve(doc, xobjects).as_dict() else {
            continue;
        };
        for (name, value) in xobjects.iter() {
            let Ok(stream) = resolve(doc, value).as_stream() else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .map(|n| n == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }
            let width = stream.dict.get(b"Width").and_then(|w| w.as_i64()).unwrap_or(0);
            let height = stream.dict.get(b"Height").and_then(|h| h.as_i64()).unwrap_or(0);
            images.push((name.clone(), width.max(0) as u32, height.max(0) as u32));
        }
    }
    Ok(images)
}

/// Walk content-stream operations and record the CTM bounding box at the
/// first `Do` of each named image, keyed by XObject name.
fn placements_from_operations(operations: &[Operation]) -> HashMap<Vec<u8>, (f32, f32, f32, f32)> {
    let mut placements: HashMap<Vec<u8>, (f32, f32, f32, f32)> = HashMap::new();
    let mut stack: Vec<Ctm> = Vec::new();
    let mut ctm = Ctm::IDENTITY;

    for op in operations {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => ctm = stack.pop().unwrap_or(Ctm::IDENTITY),
            "cm" => {
                let values: Vec<f32> =
                    op.operands.iter().filter_map(operand_to_f32).collect();
                if let [a, b, c, d, e, f] = values[..] {
                    ctm = ctm.concat(&Ctm { a, b, c, d, e, f });
                }
            }
            "Do" => {
                if let Some(Ok(name)) = op.operands.first().map(|o| o.as_name()) {
                    placements
                        .entry(name.to_vec())
                        .or_insert_with(|| ctm.unit_square_bbox());
                }
            }
            _ => {}
        }
    }
    placements
}

/// Enumerate a page's embedded images with their placements.
///
/// Placement is converted from PDF user space (y up) to the rasterizer's
/// top-left-origin space using the page height. Images never drawn by a
/// top-level `Do` (e.g. only referenced from form XObjects) get
/// `placement: None`, which the crop resolver treats as the full page.
pub fn page_embedded_images(
    doc: &lopdf::Document,
    page_id: ObjectId,
    page_height: f32,
) -> Result<Vec<EmbeddedImage>, PdfError> {
    let images = image_xobjects(doc, page_id)?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let content = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Enumerate(e.to_string()))?;
    let content = Content::decode(&content).map_err(|e| PdfError::Enumerate(e.to_string()))?;
    let placements = placements_from_operations(&content.operations);

    let mut result = Vec::new();
    for (name, pixel_width, pixel_height) in images {
        let placement = placements.get(&name).map(|&(x0, y0, x1, y1)| {
            Rect::new(x0, page_height - y1, x1, page_height - y0)
        });
        if placement.is_none() {
            debug!(
                name = %String::from_utf8_lossy(&name),
                "no placement found for image XObject"
            );
        }
        result.push(EmbeddedImage {
            pixel_width,
            pixel_height,
            placement,
        });
    }
    Ok(result)
}
