//! PDF rendering backend traits.
//!
//! Implementors provide rasterization and embedded-image enumeration; the
//! extraction pipeline (crop geometry, redundancy classification, record
//! assembly) lives in `pagelens-extract` and only sees these traits.

use std::path::Path;

use thiserror::Error;

use crate::geometry::Rect;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("failed to open PDF: {0}")]
    Open(String),
    #[error("failed to render page: {0}")]
    Render(String),
    #[error("failed to enumerate embedded images: {0}")]
    Enumerate(String),
    #[error("page index {0} out of range")]
    PageOutOfRange(usize),
}

/// A rendered page as a tightly packed RGB8 buffer.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major.
    pub pixels: Vec<u8>,
}

/// An embedded image reference on a page, before any geometry work.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Intrinsic pixel dimensions of the stored image data (not its
    /// placement size on the page). The minimum-size filter applies here.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Placement rectangle on the page, if the library reports one. `None`
    /// falls back to the full page rectangle.
    pub placement: Option<Rect>,
}

/// An opened document: pages are addressed by zero-based index.
///
/// Deliberately not `Send`: rendering-library handles are pinned to the
/// thread that opened the document, and the extraction run is sequential
/// anyway.
pub trait PdfPages {
    fn page_count(&self) -> usize;

    /// Page boundary rectangle in PDF points, origin top-left.
    fn page_bounds(&self, page_index: usize) -> Result<Rect, PdfError>;

    /// Rasterize the full page at `dpi` into RGB8.
    fn render_page(&self, page_index: usize, dpi: f32) -> Result<PageRaster, PdfError>;

    /// Embedded images on the page, in the order the library reports them.
    fn embedded_images(&self, page_index: usize) -> Result<Vec<EmbeddedImage>, PdfError>;
}

/// Trait for PDF backends that can open a document from disk.
pub trait PdfBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfPages>, PdfError>;
}
