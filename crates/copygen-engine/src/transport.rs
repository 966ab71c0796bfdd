use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GenerateError, ImageError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn single_user(
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
        }
    }

    pub fn prompt(&self) -> &str {
        self.messages
            .first()
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }
}

/// One protocol event as delivered by the transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub data: Option<String>,
}

impl RawEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

pub type TextChunks = BoxStream<'static, Result<String, GenerateError>>;
pub type EventChunks = BoxStream<'static, Result<RawEvent, GenerateError>>;

/// A streamed model response. Transports fill whichever channel they speak.
pub struct ModelStream {
    pub text: Option<TextChunks>,
    pub events: Option<EventChunks>,
}

impl ModelStream {
    pub fn from_text(chunks: TextChunks) -> Self {
        Self {
            text: Some(chunks),
            events: None,
        }
    }

    pub fn from_events(events: EventChunks) -> Self {
        Self {
            text: None,
            events: Some(events),
        }
    }

    pub fn empty() -> Self {
        Self {
            text: None,
            events: None,
        }
    }

    pub fn text_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::from_text(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    pub fn event_data<I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::from_events(
            stream::iter(payloads.into_iter().map(|data| Ok(RawEvent::data(data)))).boxed(),
        )
    }
}

#[async_trait]
pub trait TextModel: Send + Sync {
    async fn stream_text(&self, request: &ChatRequest) -> Result<ModelStream, GenerateError>;
}

/// Structured answer of the remote image function.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFunctionResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "revised_prompt")]
    pub revised_prompt: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ImageFunctionResponse {
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::String(code) if !code.trim().is_empty() => Some(code.trim().to_string()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ImageFunction: Send + Sync {
    async fn invoke(&self, function: &str, prompt: &str)
        -> Result<ImageFunctionResponse, ImageError>;
}
