//! Reqwest client for an Anthropic-messages-compatible model gateway.
//!
//! Speaks the Bedrock runtime REST surface (`/model/{id}/invoke` and
//! `/model/{id}/invoke-with-response-stream`) with bearer-token auth.
//! Generation requests use the messages content-block format
//! (`anthropic_version: bedrock-2023-05-31`); embeddings use the Titan body
//! (`{"inputText", "dimensions"}` → `{"embedding"}`). Streaming responses
//! are SSE `content_block_delta` events.

use futures_util::StreamExt;
use serde_json::{Value, json};
use tracing::debug;

use pagelens_core::config::ModelConfig;
use pagelens_core::model::{BoxFuture, ContentBlock, ModelBackend, ModelError, ModelRequest};

pub struct BedrockClient {
    http: reqwest::Client,
    config: ModelConfig,
}

impl BedrockClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn embed_model_id(&self) -> &str {
        &self.config.embed_model_id
    }

    fn invoke_url(&self, model_id: &str, streaming: bool) -> String {
        let action = if streaming {
            "invoke-with-response-stream"
        } else {
            "invoke"
        };
        format!(
            "{}/model/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            model_id,
            action
        )
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<reqwest::Response, ModelError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

/// Serialize a [`ModelRequest`] into the messages body.
fn messages_body(request: &ModelRequest) -> Value {
    let content: Vec<Value> = request
        .blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => json!({ "type": "text", "text": text }),
            ContentBlock::Image { media_type, data } => json!({
                "type": "image",
                "source": { "type": "base64", "media_type": media_type, "data": data },
            }),
        })
        .collect();

    let mut body = json!({
        "anthropic_version": "bedrock-2023-05-31",
        "max_tokens": request.max_tokens,
        "messages": [{ "role": "user", "content": content }],
    });
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

/// Pull the response text out of a non-streaming messages reply.
fn extract_text(body: &Value) -> Result<String, ModelError> {
    body["content"]
        .as_array()
        .and_then(|blocks| blocks.first())
        .and_then(|block| block["text"].as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ModelError::Malformed("response carries no text content block".into()))
}

/// Text fragment of a `content_block_delta` event, if this is one.
fn delta_text(event: &Value) -> Option<&str> {
    if event["type"].as_str() != Some("content_block_delta") {
        return None;
    }
    if event["delta"]["type"].as_str() != Some("text_delta") {
        return None;
    }
    event["delta"]["text"].as_str()
}

/// Process one SSE line: deliver any text fragment to the sink and append it
/// to the accumulator. Non-data lines and non-delta events are ignored.
fn process_sse_line(line: &str, sink: &mut (dyn FnMut(&str) + Send), accumulated: &mut String) {
    let Some(data) = line.strip_prefix("data:") else {
        return;
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return;
    }
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        debug!(line = data, "unparseable SSE event");
        return;
    };
    if let Some(text) = delta_text(&event) {
        sink(text);
        accumulated.push_str(text);
    }
}

impl ModelBackend for BedrockClient {
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        request: ModelRequest,
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(async move {
            let url = self.invoke_url(model_id, false);
            let body = messages_body(&request);
            let resp = self.post_json(&url, &body).await?;
            let reply: Value = resp
                .json()
                .await
                .map_err(|e| ModelError::Transport(e.to_string()))?;
            extract_text(&reply)
        })
    }

    fn invoke_streaming<'a>(
        &'a self,
        model_id: &'a str,
        request: ModelRequest,
        sink: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(async move {
            let url = self.invoke_url(model_id, true);
            let body = messages_body(&request);
            let resp = self.post_json(&url, &body).await?;

            let mut stream = resp.bytes_stream();
            let mut buffer = String::new();
            let mut accumulated = String::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| ModelError::Transport(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);
                    process_sse_line(&line, sink, &mut accumulated);
                }
            }
            // A final event without a trailing newline still counts.
            if !buffer.is_empty() {
                let line = buffer.trim_end_matches('\r').to_string();
                process_sse_line(&line, sink, &mut accumulated);
            }

            Ok(accumulated)
        })
    }

    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Option<Vec<f32>>, ModelError>> {
        Box::pin(async move {
            if text.trim().is_empty() {
                return Ok(None);
            }

            let url = self.invoke_url(&self.config.embed_model_id, false);
            let body = json!({
                "inputText": text,
                "dimensions": self.config.embed_dimensions,
            });
            let resp = self.post_json(&url, &body).await?;
            let reply: Value = resp
                .json()
                .await
                .map_err(|e| ModelError::Transport(e.to_string()))?;

            let embedding = reply["embedding"]
                .as_array()
                .ok_or_else(|| ModelError::Malformed("embedding response has no vector".into()))?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| ModelError::Malformed("non-numeric embedding component".into()))?;

            Ok(Some(embedding))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelens_core::model::ModelRequest;

    fn test_config() -> ModelConfig {
        ModelConfig {
            endpoint: "https://gateway.invalid".into(),
            api_key: "test-key".into(),
            model_id: "claude-test".into(),
            embed_model_id: "titan-test".into(),
            embed_dimensions: 1024,
        }
    }

    #[test]
    fn messages_body_keeps_block_order() {
        let mut request = ModelRequest::new(2000);
        request.push_text("before");
        request.push_image("image/png", "aGVsbG8=");
        request.push_text("after");

        let body = messages_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["source"]["media_type"], "image/png");
        assert_eq!(content[2]["text"], "after");
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn temperature_is_serialized_when_set() {
        let request = ModelRequest::new(100).with_temperature(0.0);
        let body = messages_body(&request);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn extract_text_trims_reply() {
        let body = serde_json::json!({ "content": [{ "type": "text", "text": "  hi  " }] });
        assert_eq!(extract_text(&body).unwrap(), "hi");
    }

    #[test]
    fn extract_text_rejects_empty_content() {
        let body = serde_json::json!({ "content": [] });
        assert!(matches!(extract_text(&body), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn sse_accumulation_matches_delivered_fragments() {
        let lines = [
            r#"data: {"type":"message_start"}"#,
            r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}"#,
            "",
            r#"data: {"type":"content_block_delta","delta":{"type":"text_delta","text":"lo"}}"#,
            r#"data: {"type":"message_stop"}"#,
        ];
        let mut delivered = String::new();
        let mut accumulated = String::new();
        {
            let mut sink = |fragment: &str| delivered.push_str(fragment);
            for line in lines {
                process_sse_line(line, &mut sink, &mut accumulated);
            }
        }
        assert_eq!(accumulated, "Hello");
        assert_eq!(delivered, accumulated);
    }

    #[test]
    fn empty_stream_accumulates_empty_string() {
        let mut accumulated = String::new();
        let mut sink = |_: &str| panic!("sink must not be called");
        process_sse_line("data: [DONE]", &mut sink, &mut accumulated);
        assert_eq!(accumulated, "");
    }

    #[tokio::test]
    async fn embed_short_circuits_on_whitespace_input() {
        // No network: the guard returns before any request is built.
        let client = BedrockClient::new(test_config());
        assert!(client.embed("   ").await.unwrap().is_none());
        assert!(client.embed("").await.unwrap().is_none());
    }
}
