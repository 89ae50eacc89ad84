//! Scripted stubs shared by this crate's tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use pagelens_core::RecordType;
use pagelens_core::index::{IndexDocument, IndexError, SearchHit, SearchIndex};
use pagelens_core::model::{BoxFuture, ModelBackend, ModelError, ModelRequest};

/// Model stub: `invoke` replies are consumed in call order; streaming calls
/// deliver a fixed fragment sequence to the sink; `embed` applies the real
/// empty-input guard and otherwise returns a unit vector.
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub(crate) stream_fragments: Vec<String>,
}

impl ScriptedModel {
    pub(crate) fn with_replies(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(String::from).map_err(String::from))
                    .collect(),
            ),
            stream_fragments: Vec::new(),
        }
    }

    pub(crate) fn with_stream(mut self, fragments: Vec<&str>) -> Self {
        self.stream_fragments = fragments.into_iter().map(String::from).collect();
        self
    }
}

impl ModelBackend for ScriptedModel {
    fn invoke<'a>(
        &'a self,
        _model_id: &'a str,
        _request: ModelRequest,
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        let next = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(ModelError::Transport(e)),
                None => Err(ModelError::Transport("script exhausted".into())),
            }
        })
    }

    fn invoke_streaming<'a>(
        &'a self,
        _model_id: &'a str,
        _request: ModelRequest,
        sink: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(async move {
            let mut accumulated = String::new();
            for fragment in &self.stream_fragments {
                sink(fragment);
                accumulated.push_str(fragment);
            }
            Ok(accumulated)
        })
    }

    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Option<Vec<f32>>, ModelError>> {
        Box::pin(async move {
            if text.trim().is_empty() {
                return Ok(None);
            }
            Ok(Some(vec![1.0, 0.0, 0.0]))
        })
    }
}

/// Records the arguments of the last `search` call and replies with a canned
/// hit list, or a scripted error.
pub(crate) struct RecordingIndex {
    pub(crate) last_search: Mutex<Option<(RecordType, usize, usize)>>,
    pub(crate) search_calls: Mutex<usize>,
    pub(crate) hits: Vec<SearchHit>,
    pub(crate) error: Option<IndexError>,
}

impl RecordingIndex {
    pub(crate) fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            last_search: Mutex::new(None),
            search_calls: Mutex::new(0),
            hits,
            error: None,
        }
    }

    pub(crate) fn failing(error: IndexError) -> Self {
        Self {
            last_search: Mutex::new(None),
            search_calls: Mutex::new(0),
            hits: Vec::new(),
            error: Some(error),
        }
    }
}

impl SearchIndex for RecordingIndex {
    fn upsert<'a>(&'a self, _doc: IndexDocument) -> BoxFuture<'a, Result<(), IndexError>> {
        Box::pin(async move { Ok(()) })
    }

    fn search<'a>(
        &'a self,
        record_type: RecordType,
        _vector: &'a [f32],
        k: usize,
        size: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, IndexError>> {
        *self.last_search.lock().unwrap() = Some((record_type, k, size));
        *self.search_calls.lock().unwrap() += 1;
        Box::pin(async move {
            match &self.error {
                Some(IndexError::Status { code, body }) => Err(IndexError::Status {
                    code: *code,
                    body: body.clone(),
                }),
                Some(IndexError::Transport(e)) => Err(IndexError::Transport(e.clone())),
                None => Ok(self.hits.clone()),
            }
        })
    }
}
