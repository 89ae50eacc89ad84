//! Similarity-search index trait.

use thiserror::Error;

use crate::RecordType;
use crate::model::BoxFuture;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index transport error: {0}")]
    Transport(String),
    #[error("index returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
}

/// One document as stored in the search index. `content_vector` is absent
/// when the record's text was empty (nothing to embed).
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub page_number: u32,
    pub image_file_name: String,
    pub text: String,
    pub image_type: RecordType,
    pub image_base64: String,
    pub content_vector: Option<Vec<f32>>,
}

/// One search result; raw vectors are excluded from the response payload.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub image_base64: String,
    pub text: String,
}

/// A kNN search index over [`IndexDocument`]s.
///
/// `k` is the neighbor count passed to the similarity operator; `size`
/// bounds the candidate pool the backend returns. The retrieval layer keeps
/// them independent.
pub trait SearchIndex: Send + Sync {
    fn upsert<'a>(&'a self, doc: IndexDocument) -> BoxFuture<'a, Result<(), IndexError>>;

    fn search<'a>(
        &'a self,
        record_type: RecordType,
        vector: &'a [f32],
        k: usize,
        size: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, IndexError>>;
}
