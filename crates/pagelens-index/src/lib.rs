//! OpenSearch implementation of [`SearchIndex`].
//!
//! Documents go in via `POST {endpoint}/{index}/_doc` with basic auth; kNN
//! queries go through `{index}/_search` with a bool query combining a
//! `term` filter on `image_type` with a `knn` clause, excluding
//! `content_vector` from the response source.

use serde_json::{Value, json};
use tracing::info;

use pagelens_core::RecordType;
use pagelens_core::config::SearchConfig;
use pagelens_core::index::{IndexDocument, IndexError, SearchHit, SearchIndex};
use pagelens_core::model::BoxFuture;

pub struct OpenSearchIndex {
    http: reqwest::Client,
    config: SearchConfig,
}

impl OpenSearchIndex {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn doc_url(&self) -> String {
        format!(
            "{}/{}/_doc",
            self.config.endpoint.trim_end_matches('/'),
            self.config.index_name
        )
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/_search",
            self.config.endpoint.trim_end_matches('/'),
            self.config.index_name
        )
    }
}

/// Build the `_doc` body. `content_vector` is attached only when an
/// embedding exists; records with empty text are indexed without one.
pub fn document_body(doc: &IndexDocument) -> Value {
    let mut body = json!({
        "page_number": doc.page_number,
        "image_file_name": doc.image_file_name,
        "text": doc.text,
        "image_type": doc.image_type.as_str(),
        "image": doc.image_base64,
    });
    if let Some(vector) = &doc.content_vector {
        body["content_vector"] = json!(vector);
    }
    body
}

/// Build the filtered kNN search body.
///
/// `size` bounds the result pool; `k` is the neighbor count handed to the
/// kNN operator. They are independent on purpose.
pub fn knn_search_body(record_type: RecordType, vector: &[f32], k: usize, size: usize) -> Value {
    json!({
        "size": size,
        "_source": { "excludes": ["content_vector"] },
        "query": {
            "bool": {
                "must": [
                    { "term": { "image_type": record_type.as_str() } },
                    { "knn": { "content_vector": { "vector": vector, "k": k } } },
                ]
            }
        }
    })
}

fn parse_hits(response: &Value) -> Vec<SearchHit> {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| {
                    let source = &hit["_source"];
                    Some(SearchHit {
                        image_base64: source["image"].as_str()?.to_string(),
                        text: source["text"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SearchIndex for OpenSearchIndex {
    fn upsert<'a>(&'a self, doc: IndexDocument) -> BoxFuture<'a, Result<(), IndexError>> {
        Box::pin(async move {
            let body = document_body(&doc);
            let resp = self
                .http
                .post(self.doc_url())
                .basic_auth(&self.config.username, Some(&self.config.password))
                .json(&body)
                .send()
                .await
                .map_err(|e| IndexError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(IndexError::Status {
                    code: status.as_u16(),
                    body: resp.text().await.unwrap_or_default(),
                });
            }
            info!(
                file = %doc.image_file_name,
                status = status.as_u16(),
                "document indexed"
            );
            Ok(())
        })
    }

    fn search<'a>(
        &'a self,
        record_type: RecordType,
        vector: &'a [f32],
        k: usize,
        size: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>, IndexError>> {
        Box::pin(async move {
            let body = knn_search_body(record_type, vector, k, size);
            let resp = self
                .http
                .post(self.search_url())
                .basic_auth(&self.config.username, Some(&self.config.password))
                .json(&body)
                .send()
                .await
                .map_err(|e| IndexError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(IndexError::Status {
                    code: status.as_u16(),
                    body: resp.text().await.unwrap_or_default(),
                });
            }

            let response: Value = resp
                .json()
                .await
                .map_err(|e| IndexError::Transport(e.to_string()))?;
            Ok(parse_hits(&response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_without_embedding_omits_vector_field() {
        let doc = IndexDocument {
            page_number: 2,
            image_file_name: "page_2_main.png".into(),
            text: String::new(),
            image_type: RecordType::Main,
            image_base64: "aWc=".into(),
            content_vector: None,
        };
        let body = document_body(&doc);
        assert!(body.get("content_vector").is_none());
        assert_eq!(body["image_type"], "main");
    }

    #[test]
    fn document_with_embedding_carries_vector() {
        let doc = IndexDocument {
            page_number: 0,
            image_file_name: "a.png".into(),
            text: "caption".into(),
            image_type: RecordType::Sub,
            image_base64: "aWc=".into(),
            content_vector: Some(vec![0.1, 0.2]),
        };
        let body = document_body(&doc);
        assert_eq!(body["content_vector"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn search_body_filters_by_record_type() {
        let body = knn_search_body(RecordType::Sub, &[0.0; 4], 5, 10);
        assert_eq!(body["query"]["bool"]["must"][0]["term"]["image_type"], "sub");
        let body = knn_search_body(RecordType::Main, &[0.0; 4], 5, 10);
        assert_eq!(body["query"]["bool"]["must"][0]["term"]["image_type"], "main");
    }

    #[test]
    fn search_body_keeps_k_and_size_independent() {
        let body = knn_search_body(RecordType::Main, &[0.0; 4], 5, 12);
        assert_eq!(body["size"], 12);
        assert_eq!(body["query"]["bool"]["must"][1]["knn"]["content_vector"]["k"], 5);
        assert_eq!(body["_source"]["excludes"][0], "content_vector");
    }

    #[test]
    fn hits_parse_in_backend_order() {
        let response = json!({
            "hits": { "hits": [
                { "_source": { "image": "aW1nMQ==", "text": "first" } },
                { "_source": { "image": "aW1nMg==", "text": "second" } },
            ]}
        });
        let hits = parse_hits(&response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].image_base64, "aW1nMg==");
    }
}
