//! Conversation state for a retrieval-augmented chat.

use std::collections::BTreeSet;

use tracing::{debug, info};

use pagelens_core::QueryIntent;
use pagelens_core::index::SearchIndex;
use pagelens_core::model::ModelBackend;

use crate::answer::{cited_pages, generate_answer};
use crate::classify::classify_intent;
use crate::retrieve::retrieve;
use crate::QueryError;

/// One completed question/answer exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Holds everything a multi-turn conversation accumulates: the intent
/// decided on the first turn, the images retrieved for it, and the pages the
/// latest answer actually cited.
///
/// Classification and retrieval run exactly once, on the first `ask`; every
/// later turn answers against the same retained image set.
pub struct ChatSession<'a> {
    model: &'a dyn ModelBackend,
    index: &'a dyn SearchIndex,
    model_id: String,
    doc_count: usize,
    intent: Option<QueryIntent>,
    images: Vec<Vec<u8>>,
    captions: Vec<String>,
    exchanges: Vec<Exchange>,
    valid_pages: BTreeSet<u32>,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        model: &'a dyn ModelBackend,
        index: &'a dyn SearchIndex,
        model_id: impl Into<String>,
        doc_count: usize,
    ) -> Self {
        Self {
            model,
            index,
            model_id: model_id.into(),
            doc_count,
            intent: None,
            images: Vec::new(),
            captions: Vec::new(),
            exchanges: Vec::new(),
            valid_pages: BTreeSet::new(),
        }
    }

    pub fn intent(&self) -> Option<QueryIntent> {
        self.intent
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Images the latest answer cited, paired with their captions, in page
    /// order. Cited page numbers outside the retrieved range are dropped.
    pub fn referenced_images(&self) -> Vec<(&[u8], &str)> {
        self.valid_pages
            .iter()
            .filter_map(|&page| {
                let idx = (page as usize).checked_sub(1)?;
                Some((
                    self.images.get(idx)?.as_slice(),
                    self.captions.get(idx)?.as_str(),
                ))
            })
            .collect()
    }

    /// Run one conversation turn. The answer is streamed to `sink` fragment
    /// by fragment and the accumulated text is returned.
    pub async fn ask(
        &mut self,
        user_query: &str,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, QueryError> {
        let intent = match self.intent {
            Some(intent) => intent,
            None => {
                let intent = classify_intent(self.model, &self.model_id, user_query).await?;
                info!(intent = intent.as_str(), "classified first query");
                let retrieved =
                    retrieve(self.model, self.index, user_query, intent, self.doc_count).await?;
                debug!(hits = retrieved.images.len(), "retrieved context images");
                self.images = retrieved.images;
                self.captions = retrieved.captions;
                self.intent = Some(intent);
                intent
            }
        };

        let answer = generate_answer(
            self.model,
            &self.model_id,
            intent,
            user_query,
            &self.images,
            sink,
        )
        .await?;

        let page_limit = self.images.len() as u32;
        self.valid_pages = cited_pages(&answer)?
            .into_iter()
            .filter(|&page| page >= 1 && page <= page_limit)
            .collect();
        self.exchanges.push(Exchange {
            question: user_query.to_string(),
            answer: answer.clone(),
        });
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use pagelens_core::index::SearchHit;

    use crate::testing::{RecordingIndex, ScriptedModel};

    fn hit(image: &[u8], text: &str) -> SearchHit {
        SearchHit {
            image_base64: BASE64.encode(image),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn first_turn_classifies_and_retrieves() {
        let model = ScriptedModel::with_replies(vec![Ok("<querytype>general</querytype>")])
            .with_stream(vec!["answer <refpage>1</refpage>"]);
        let index = RecordingIndex::with_hits(vec![hit(b"a", "page one"), hit(b"b", "page two")]);
        let mut session = ChatSession::new(&model, &index, "m", 5);

        let mut sink = |_: &str| {};
        let answer = session.ask("what is this about", &mut sink).await.unwrap();

        assert_eq!(answer, "answer <refpage>1</refpage>");
        assert_eq!(session.intent(), Some(QueryIntent::General));
        assert_eq!(*index.search_calls.lock().unwrap(), 1);
        assert_eq!(session.referenced_images(), vec![(b"a".as_slice(), "page one")]);
    }

    #[tokio::test]
    async fn later_turns_reuse_the_first_classification() {
        // A single scripted reply: a second classification call would exhaust
        // the script and fail the turn.
        let model = ScriptedModel::with_replies(vec![Ok("<querytype>general</querytype>")])
            .with_stream(vec!["answer <refpage>1</refpage>"]);
        let index = RecordingIndex::with_hits(vec![hit(b"a", "page one")]);
        let mut session = ChatSession::new(&model, &index, "m", 5);

        let mut sink = |_: &str| {};
        session.ask("first question", &mut sink).await.unwrap();
        session.ask("follow-up question", &mut sink).await.unwrap();

        assert_eq!(*index.search_calls.lock().unwrap(), 1);
        assert_eq!(session.exchanges().len(), 2);
    }

    #[tokio::test]
    async fn out_of_range_citations_are_dropped() {
        let model = ScriptedModel::with_replies(vec![Ok("<querytype>general</querytype>")])
            .with_stream(vec!["answer <refpage>1,2,9</refpage>"]);
        let index = RecordingIndex::with_hits(vec![hit(b"a", "one"), hit(b"b", "two")]);
        let mut session = ChatSession::new(&model, &index, "m", 5);

        let mut sink = |_: &str| {};
        session.ask("question", &mut sink).await.unwrap();

        let referenced = session.referenced_images();
        assert_eq!(referenced.len(), 2);
        assert_eq!(referenced[1], (b"b".as_slice(), "two"));
    }

    #[tokio::test]
    async fn classification_failure_leaves_the_session_unstarted() {
        let model = ScriptedModel::with_replies(vec![Ok("no tag here")]);
        let index = RecordingIndex::with_hits(vec![]);
        let mut session = ChatSession::new(&model, &index, "m", 5);

        let mut sink = |_: &str| {};
        let err = session.ask("question", &mut sink).await.unwrap_err();
        assert!(matches!(err, QueryError::MissingClassification(_)));
        assert_eq!(session.intent(), None);
        assert_eq!(*index.search_calls.lock().unwrap(), 0);
    }
}
