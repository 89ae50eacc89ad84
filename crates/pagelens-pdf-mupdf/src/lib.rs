//! MuPDF-based implementation of [`PdfBackend`].
//!
//! This crate isolates the mupdf dependency (which is AGPL-3.0) so that
//! non-PDF code paths do not transitively depend on it.
//!
//! mupdf handles rasterization; embedded-image enumeration and placement
//! resolution go through lopdf, which exposes the page XObject dictionaries
//! and content streams directly. Placement is the bounding box of the unit
//! square under the CTM in effect at each image `Do` operator, converted to
//! the top-left-origin space the rasterizer uses.

mod placement;

use std::path::Path;

use mupdf::{Colorspace, Document, Matrix};

use pagelens_core::geometry::Rect;
use pagelens_core::pdf::{EmbeddedImage, PageRaster, PdfBackend, PdfError, PdfPages};

use placement::page_embedded_images;

/// Opens documents with mupdf for rendering and lopdf for object access.
#[derive(Debug, Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for MupdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfPages>, PdfError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| PdfError::Open("invalid path encoding".into()))?;

        let document = Document::open(path_str).map_err(|e| PdfError::Open(e.to_string()))?;

        let mut pages = Vec::new();
        for page_result in document
            .pages()
            .map_err(|e| PdfError::Open(e.to_string()))?
        {
            pages.push(page_result.map_err(|e| PdfError::Open(e.to_string()))?);
        }

        let objects = lopdf::Document::load(path).map_err(|e| PdfError::Open(e.to_string()))?;
        // lopdf page numbers are 1-based; keep the ids in document order so
        // they line up with the mupdf page vector.
        let page_ids: Vec<lopdf::ObjectId> = objects.get_pages().into_values().collect();

        Ok(Box::new(OpenedDocument {
            pages,
            objects,
            page_ids,
        }))
    }
}

struct OpenedDocument {
    pages: Vec<mupdf::Page>,
    objects: lopdf::Document,
    page_ids: Vec<lopdf::ObjectId>,
}

impl OpenedDocument {
    fn page(&self, page_index: usize) -> Result<&mupdf::Page, PdfError> {
        self.pages
            .get(page_index)
            .ok_or(PdfError::PageOutOfRange(page_index))
    }
}

impl PdfPages for OpenedDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page_index: usize) -> Result<Rect, PdfError> {
        let bounds = self
            .page(page_index)?
            .bounds()
            .map_err(|e| PdfError::Render(e.to_string()))?;
        Ok(Rect::new(bounds.x0, bounds.y0, bounds.x1, bounds.y1))
    }

    fn render_page(&self, page_index: usize, dpi: f32) -> Result<PageRaster, PdfError> {
        let page = self.page(page_index)?;
        let scale = dpi / 72.0;
        let matrix = Matrix::new_scale(scale, scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)
            .map_err(|e| PdfError::Render(e.to_string()))?;

        Ok(PageRaster {
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            pixels: pixmap.samples().to_vec(),
        })
    }

    fn embedded_images(&self, page_index: usize) -> Result<Vec<EmbeddedImage>, PdfError> {
        let page_id = *self
            .page_ids
            .get(page_index)
            .ok_or(PdfError::PageOutOfRange(page_index))?;
        let bounds = self.page_bounds(page_index)?;
        page_embedded_images(&self.objects, page_id, bounds.height())
    }
}
