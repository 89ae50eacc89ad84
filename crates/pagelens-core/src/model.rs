//! Multimodal model backend trait.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model endpoint returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// One entry of an ordered multimodal prompt.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    /// Base64-encoded image payload.
    Image { media_type: String, data: String },
}

/// An ordered multimodal request, built block by block in prompt order.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub blocks: Vec<ContentBlock>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl ModelRequest {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            blocks: Vec::new(),
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.blocks.push(ContentBlock::Text(text.into()));
    }

    pub fn push_image(&mut self, media_type: impl Into<String>, data_base64: impl Into<String>) {
        self.blocks.push(ContentBlock::Image {
            media_type: media_type.into(),
            data: data_base64.into(),
        });
    }
}

/// A generative-model endpoint capable of text, vision, and embedding calls.
///
/// Transport errors propagate uncaught; nothing in this pipeline retries a
/// model call. Timeouts are the transport's concern.
pub trait ModelBackend: Send + Sync {
    /// Synchronous (non-streaming) invocation; resolves to the extracted
    /// response text.
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        request: ModelRequest,
    ) -> BoxFuture<'a, Result<String, ModelError>>;

    /// Streaming invocation. Each text fragment is handed to `sink` as it
    /// arrives and appended to an accumulator; the accumulated text is
    /// returned once the stream terminates. A mid-stream transport error
    /// aborts the call; fragments already delivered to the sink stay
    /// delivered.
    fn invoke_streaming<'a>(
        &'a self,
        model_id: &'a str,
        request: ModelRequest,
        sink: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<String, ModelError>>;

    /// Embed `text` into a fixed-length vector. Empty or whitespace-only
    /// input yields `None` without touching the network.
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Option<Vec<f32>>, ModelError>>;
}
