use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GenerateError;
use crate::transport::{ModelStream, RawEvent};

pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Done,
    Delta(String),
    /// Keep-alives, role-only deltas, usage trailers.
    Empty,
}

/// Why an event was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkRejection {
    Malformed(String),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl StreamEvent {
    pub fn decode(event: &RawEvent) -> Result<Self, ChunkRejection> {
        let Some(data) = event
            .data
            .as_deref()
            .map(str::trim)
            .filter(|data| !data.is_empty())
        else {
            return Ok(StreamEvent::Empty);
        };
        if data == DONE_SENTINEL {
            return Ok(StreamEvent::Done);
        }

        let value: Value =
            serde_json::from_str(data).map_err(|err| ChunkRejection::Malformed(err.to_string()))?;
        let chunk: ChatChunk =
            serde_json::from_value(value).map_err(|_| ChunkRejection::Unrecognized)?;
        let text = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .unwrap_or_default();
        if text.is_empty() {
            Ok(StreamEvent::Empty)
        } else {
            Ok(StreamEvent::Delta(text))
        }
    }
}

/// Drains a model stream into one string.
///
/// The text channel wins when present. On the event channel `[DONE]` stops
/// reading early and rejected events are skipped. Transport errors abort.
pub async fn accumulate(stream: ModelStream) -> Result<String, GenerateError> {
    let ModelStream { text, events } = stream;
    let mut output = String::new();

    if let Some(mut chunks) = text {
        while let Some(chunk) = chunks.next().await {
            output.push_str(&chunk?);
        }
        return Ok(output);
    }

    let Some(mut events) = events else {
        return Ok(output);
    };
    let mut skipped = 0usize;
    while let Some(event) = events.next().await {
        match StreamEvent::decode(&event?) {
            Ok(StreamEvent::Done) => break,
            Ok(StreamEvent::Delta(text)) => output.push_str(&text),
            Ok(StreamEvent::Empty) => {}
            Err(rejection) => {
                skipped += 1;
                tracing::debug!(?rejection, "skipping stream event");
            }
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, chars = output.chars().count(), "stream accumulated");
    }
    Ok(output)
}
