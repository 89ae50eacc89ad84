//! PDF figure extraction and deduplication.
//!
//! The orchestrator walks a document page by page: render the page, OCR it,
//! record it as the page's `main` image, then crop every sufficiently large
//! embedded image (expanded by margins to pull in nearby captions) and keep
//! the ones the redundancy classifier judges distinct from the page
//! rendering. The metadata snapshot is rewritten after every page, so an
//! aborted run stays valid up to the last completed page.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use pagelens_core::geometry::Margins;
use pagelens_core::model::{ModelBackend, ModelError};
use pagelens_core::pdf::{PdfBackend, PdfError};
use pagelens_core::snapshot::{self, Snapshot, SnapshotError};
use pagelens_core::{PageImageRecord, RecordType};

pub mod classify;
pub mod crop;

pub use crop::{crop_raster, encode_png};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("image encoding error: {0}")]
    Image(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction tuning knobs. The minimum-size filter applies to an embedded
/// image's intrinsic pixel dimensions, before any geometry work.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub min_width: u32,
    pub min_height: u32,
    pub margins: Margins,
    pub dpi: f32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_width: 20,
            min_height: 20,
            margins: Margins::default(),
            dpi: 150.0,
        }
    }
}

impl ExtractOptions {
    /// Defaults for the geometry-only mode, which filters more aggressively
    /// since no model pass will weed out decorative images later.
    pub fn geometry_mode() -> Self {
        Self {
            min_width: 100,
            min_height: 100,
            ..Self::default()
        }
    }
}

/// Create the working directory if needed, or clear out a previous run.
fn reset_savedir(savedir: &Path) -> std::io::Result<()> {
    if !savedir.exists() {
        return std::fs::create_dir_all(savedir);
    }
    for entry in std::fs::read_dir(savedir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Run the full extraction pipeline over `pdf_path` into `savedir`.
///
/// Returns the path of the persisted metadata snapshot. Any rendering or
/// model error aborts the run; the snapshot on disk stays complete as of
/// the last fully processed page.
pub async fn extract_document(
    pdf: &dyn PdfBackend,
    model: &dyn ModelBackend,
    model_id: &str,
    pdf_path: &Path,
    savedir: &Path,
    options: &ExtractOptions,
) -> Result<PathBuf, ExtractError> {
    reset_savedir(savedir)?;
    let doc = pdf.open(pdf_path)?;
    let metadata_path = savedir.join("metadata.json");
    let mut metadata = Snapshot::new();

    for page_index in 0..doc.page_count() {
        let bounds = doc.page_bounds(page_index)?;
        let raster = doc.render_page(page_index, options.dpi)?;

        let main_path = savedir.join(format!("page_{page_index}_main.png"));
        let main_png = encode_png(&raster)?;
        std::fs::write(&main_path, &main_png)?;

        let main_text = classify::ocr_page(model, model_id, &main_png).await?;
        debug!(page = page_index, chars = main_text.len(), "page text extracted");

        let main_key = main_path.to_string_lossy().into_owned();
        metadata.insert(
            main_key.clone(),
            PageImageRecord::new(page_index as u32, RecordType::Main, main_key.clone(), main_text),
        );

        for (img_index, embedded) in doc.embedded_images(page_index)?.into_iter().enumerate() {
            debug!(
                page = page_index,
                image = img_index,
                width = embedded.pixel_width,
                height = embedded.pixel_height,
                "embedded image"
            );
            if embedded.pixel_width < options.min_width
                || embedded.pixel_height < options.min_height
            {
                info!(page = page_index, image = img_index, "skipped (minimum size not met)");
                continue;
            }

            let placement = match embedded.placement {
                Some(rect) => rect,
                None => {
                    warn!(
                        page = page_index,
                        image = img_index,
                        "no location information, using full page"
                    );
                    bounds
                }
            };

            let expanded = placement.expand(&options.margins).intersect(&bounds);
            if expanded.is_empty() {
                warn!(page = page_index, image = img_index, "placement outside page bounds");
                continue;
            }

            let cropped = crop_raster(&raster, &bounds, &expanded, options.dpi);
            let sub_path = savedir.join(format!("page_{page_index}_img_{img_index}_small.png"));
            let crop_png = encode_png(&cropped)?;
            std::fs::write(&sub_path, &crop_png)?;

            let verdict =
                classify::classify_redundancy(model, model_id, &main_png, &crop_png).await?;
            if verdict.is_same {
                info!(page = page_index, image = img_index, "skipped (same as page rendering)");
                continue;
            }

            let sub_key = sub_path.to_string_lossy().into_owned();
            metadata.insert(
                sub_key.clone(),
                PageImageRecord::new(page_index as u32, RecordType::Sub, sub_key, verdict.caption),
            );
        }

        // Whole-file rewrite: the snapshot is always a complete, valid
        // document as of the last finished page.
        snapshot::write_snapshot(&metadata_path, &metadata)?;
        info!(page = page_index, records = metadata.len(), "page complete, snapshot rewritten");
    }

    Ok(metadata_path)
}

/// Geometry-only extraction: no model calls, records carry placement and
/// size information instead of captions. Snapshot keys are bare file names
/// and the file is written once at the end of the run.
pub fn extract_document_geometry(
    pdf: &dyn PdfBackend,
    pdf_path: &Path,
    savedir: &Path,
    options: &ExtractOptions,
) -> Result<PathBuf, ExtractError> {
    reset_savedir(savedir)?;
    let doc = pdf.open(pdf_path)?;
    let metadata_path = savedir.join("metadata.json");
    let mut metadata = Snapshot::new();

    for page_index in 0..doc.page_count() {
        let bounds = doc.page_bounds(page_index)?;
        let raster = doc.render_page(page_index, options.dpi)?;

        let main_path = savedir.join(format!("page_{page_index}_main.png"));
        std::fs::write(&main_path, encode_png(&raster)?)?;

        for (img_index, embedded) in doc.embedded_images(page_index)?.into_iter().enumerate() {
            if embedded.pixel_width < options.min_width
                || embedded.pixel_height < options.min_height
            {
                info!(page = page_index, image = img_index, "skipped (minimum size not met)");
                continue;
            }

            let placement = embedded.placement.unwrap_or(bounds);
            let expanded = placement.expand(&options.margins).intersect(&bounds);
            if expanded.is_empty() {
                continue;
            }

            let cropped = crop_raster(&raster, &bounds, &expanded, options.dpi);
            let file_name = format!("page_{page_index}_img_{img_index}_small.png");
            std::fs::write(savedir.join(&file_name), encode_png(&cropped)?)?;

            metadata.insert(
                file_name.clone(),
                PageImageRecord {
                    page: page_index as u32,
                    record_type: None,
                    file_name,
                    image_text: String::new(),
                    pdf_width: Some(placement.width()),
                    pdf_height: Some(placement.height()),
                    image_width: Some(embedded.pixel_width),
                    image_height: Some(embedded.pixel_height),
                    extracted_width: Some(cropped.width),
                    extracted_height: Some(cropped.height),
                    original_rect: Some(placement),
                    expanded_rect: Some(expanded),
                },
            );
        }
    }

    snapshot::write_snapshot(&metadata_path, &metadata)?;
    Ok(metadata_path)
}
