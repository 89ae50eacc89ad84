//! Core types and backend traits for the pagelens pipeline.
//!
//! The extraction and query pipelines talk to three collaborators (a PDF
//! renderer, a multimodal inference endpoint, and a kNN search index), all of
//! which are reached through the traits defined here so that the pipeline
//! logic stays testable against stubs.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod geometry;
pub mod index;
pub mod model;
pub mod pdf;
pub mod snapshot;
pub mod tags;

// Re-export for convenience
pub use config::{ConfigError, ModelConfig, SearchConfig};
pub use geometry::{Margins, Rect};
pub use index::{IndexDocument, IndexError, SearchHit, SearchIndex};
pub use model::{BoxFuture, ContentBlock, ModelBackend, ModelError, ModelRequest};
pub use pdf::{EmbeddedImage, PageRaster, PdfBackend, PdfError, PdfPages};
pub use snapshot::{Snapshot, SnapshotError, read_snapshot, write_snapshot};

/// Whether a record is the full-page rendering or a cropped embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Full-page rendering; OCR source and redundancy reference frame.
    Main,
    /// Cropped embedded image confirmed non-redundant with its page.
    Sub,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Main => "main",
            RecordType::Sub => "sub",
        }
    }
}

/// One retained visual unit in the metadata snapshot.
///
/// The geometry fields are only populated by the geometry-only extraction
/// mode; the production pipeline fills `record_type` and `image_text`
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImageRecord {
    /// Zero-based page number, immutable once assigned.
    pub page: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    pub file_name: String,
    /// Model-generated caption (`sub`) or full-page OCR text (`main`).
    /// Empty for geometry-only extraction.
    pub image_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_rect: Option<Rect>,
}

impl PageImageRecord {
    /// A production-pipeline record: page number, type, and caption/OCR text.
    pub fn new(page: u32, record_type: RecordType, file_name: String, image_text: String) -> Self {
        Self {
            page,
            record_type: Some(record_type),
            file_name,
            image_text,
            pdf_width: None,
            pdf_height: None,
            image_width: None,
            image_height: None,
            extracted_width: None,
            extracted_height: None,
            original_rect: None,
            expanded_rect: None,
        }
    }
}

/// Two-way classification of a user query, derived once per conversation
/// from the first user message and reused for every follow-up turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// The user wants a specific figure located.
    ImageSearch,
    /// The user wants information or an explanation.
    General,
}

impl QueryIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryIntent::ImageSearch => "imagesearch",
            QueryIntent::General => "general",
        }
    }

    /// Parse the label emitted inside the `<querytype>` tag.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "imagesearch" => Some(QueryIntent::ImageSearch),
            "general" => Some(QueryIntent::General),
            _ => None,
        }
    }

    /// The record-type filter a search for this intent is scoped to.
    pub fn record_filter(self) -> RecordType {
        match self {
            QueryIntent::ImageSearch => RecordType::Sub,
            QueryIntent::General => RecordType::Main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RecordType::Main).unwrap(), "\"main\"");
        assert_eq!(serde_json::to_string(&RecordType::Sub).unwrap(), "\"sub\"");
    }

    #[test]
    fn record_round_trips_without_geometry_fields() {
        let record = PageImageRecord::new(3, RecordType::Sub, "page_3_img_0_small.png".into(), "caption".into());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("pdf_width"));
        let parsed: PageImageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.page, 3);
        assert_eq!(parsed.record_type, Some(RecordType::Sub));
    }

    #[test]
    fn intent_maps_to_record_filter() {
        assert_eq!(QueryIntent::ImageSearch.record_filter(), RecordType::Sub);
        assert_eq!(QueryIntent::General.record_filter(), RecordType::Main);
    }

    #[test]
    fn intent_parse_rejects_unknown_labels() {
        assert_eq!(QueryIntent::parse(" imagesearch "), Some(QueryIntent::ImageSearch));
        assert_eq!(QueryIntent::parse("general"), Some(QueryIntent::General));
        assert_eq!(QueryIntent::parse("images"), None);
    }
}
