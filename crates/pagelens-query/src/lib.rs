//! Retrieval-augmented query pipeline.
//!
//! A conversation starts by classifying the user's first message into one of
//! two intents, retrieving the matching page or figure records by vector
//! similarity, and then answering every turn of the session against that
//! retained set with a streamed, citation-tagged multimodal prompt.

use thiserror::Error;

use pagelens_core::index::IndexError;
use pagelens_core::model::ModelError;
use pagelens_core::tags::TagError;

pub mod answer;
pub mod classify;
pub mod retrieve;
pub mod session;

pub use answer::{build_answer_request, cited_pages, generate_answer};
pub use classify::classify_intent;
pub use retrieve::{KNN_NEIGHBORS, Retrieved, retrieve};
pub use session::ChatSession;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("classification response missing <{0}> tag")]
    MissingClassification(&'static str),
    #[error("unrecognized intent label: {0:?}")]
    UnknownIntent(String),
    #[error("citation parse error: {0}")]
    Citation(#[from] TagError),
    #[error("invalid image payload in search hit: {0}")]
    Decode(String),
}
