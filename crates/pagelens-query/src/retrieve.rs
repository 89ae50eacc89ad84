//! Vector retrieval of page/figure records for a classified query.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{error, warn};

use pagelens_core::QueryIntent;
use pagelens_core::index::{IndexError, SearchIndex};
use pagelens_core::model::ModelBackend;

use crate::QueryError;

/// Neighbor count passed to the kNN operator. Fixed independently of the
/// requested result count.
pub const KNN_NEIGHBORS: usize = 5;

/// Parallel ordered sequences of decoded images and their captions, in the
/// order the backend ranked them.
#[derive(Debug, Default)]
pub struct Retrieved {
    pub images: Vec<Vec<u8>>,
    pub captions: Vec<String>,
}

/// Embed the query and run a filtered kNN search.
///
/// `imagesearch` scopes the search to `sub` records, `general` to `main`.
/// An empty embedding or a non-success backend status yields empty results
/// (logged, not raised); transport failures propagate.
pub async fn retrieve(
    model: &dyn ModelBackend,
    index: &dyn SearchIndex,
    query: &str,
    intent: QueryIntent,
    doc_count: usize,
) -> Result<Retrieved, QueryError> {
    let Some(vector) = model.embed(query).await? else {
        warn!("query produced no embedding, returning no results");
        return Ok(Retrieved::default());
    };

    let hits = match index
        .search(intent.record_filter(), &vector, KNN_NEIGHBORS, doc_count)
        .await
    {
        Ok(hits) => hits,
        Err(IndexError::Status { code, body }) => {
            error!(code, body, "search backend returned an error status");
            return Ok(Retrieved::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut retrieved = Retrieved::default();
    for hit in hits {
        let image = BASE64
            .decode(hit.image_base64.as_bytes())
            .map_err(|e| QueryError::Decode(e.to_string()))?;
        retrieved.images.push(image);
        retrieved.captions.push(hit.text);
    }
    Ok(retrieved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelens_core::RecordType;
    use pagelens_core::index::SearchHit;

    use crate::testing::{RecordingIndex, ScriptedModel};

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            image_base64: BASE64.encode(b"png-bytes"),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn imagesearch_intent_filters_sub_records() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::with_hits(vec![hit("a")]);

        retrieve(&model, &index, "find the pump figure", QueryIntent::ImageSearch, 5)
            .await
            .unwrap();

        let (record_type, k, size) = index.last_search.lock().unwrap().unwrap();
        assert_eq!(record_type, RecordType::Sub);
        assert_eq!(k, KNN_NEIGHBORS);
        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn general_intent_filters_main_records() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::with_hits(vec![]);

        retrieve(&model, &index, "how does the pump work", QueryIntent::General, 7)
            .await
            .unwrap();

        let (record_type, _k, size) = index.last_search.lock().unwrap().unwrap();
        assert_eq!(record_type, RecordType::Main);
        // doc_count flows to size, not to k.
        assert_eq!(size, 7);
    }

    #[tokio::test]
    async fn hits_decode_in_backend_order() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::with_hits(vec![hit("first"), hit("second")]);

        let retrieved = retrieve(&model, &index, "q", QueryIntent::General, 5)
            .await
            .unwrap();
        assert_eq!(retrieved.captions, vec!["first", "second"]);
        assert_eq!(retrieved.images[0], b"png-bytes");
    }

    #[tokio::test]
    async fn whitespace_query_yields_empty_results() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::with_hits(vec![hit("a")]);

        let retrieved = retrieve(&model, &index, "   ", QueryIntent::General, 5)
            .await
            .unwrap();
        assert!(retrieved.images.is_empty());
        // The search is never issued.
        assert!(index.last_search.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn error_status_yields_empty_results() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::failing(IndexError::Status {
            code: 503,
            body: "unavailable".into(),
        });

        let retrieved = retrieve(&model, &index, "q", QueryIntent::General, 5)
            .await
            .unwrap();
        assert!(retrieved.images.is_empty());
        assert!(retrieved.captions.is_empty());
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let model = ScriptedModel::with_replies(vec![]);
        let index = RecordingIndex::failing(IndexError::Transport("refused".into()));

        let err = retrieve(&model, &index, "q", QueryIntent::General, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Index(IndexError::Transport(_))));
    }
}
