//! reqwest-backed transports for the text model and the image function.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;

use crate::config::HttpConfig;
use crate::error::{truncate_text, GenerateError, ImageError};
use crate::transport::{
    ChatRequest, EventChunks, ImageFunction, ImageFunctionResponse, ModelStream, RawEvent,
    TextModel,
};

/// OpenAI-compatible `chat/completions` endpoint streamed as server-sent events.
pub struct HttpTextModel {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl HttpTextModel {
    pub fn new(config: &HttpConfig) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GenerateError::transport)?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TextModel for HttpTextModel {
    async fn stream_text(&self, request: &ChatRequest) -> Result<ModelStream, GenerateError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerateError::NotConfigured(format!(
                "no API key for provider '{}'",
                request.provider
            )));
        };
        let body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(GenerateError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerateError::Transport(format!(
                "{} request failed ({}): {}",
                request.provider,
                status.as_u16(),
                truncate_text(&text, 512)
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(GenerateError::transport)
            })
            .boxed();
        Ok(ModelStream::from_events(sse_events(bytes)))
    }
}

/// Splits a server-sent-event byte stream into [`RawEvent`]s.
///
/// Lines are cut on `\n` before UTF-8 decoding so multi-byte characters split
/// across network chunks survive.
pub fn sse_events(bytes: BoxStream<'static, Result<Vec<u8>, GenerateError>>) -> EventChunks {
    let state = SseState {
        bytes,
        parser: SseParser::default(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.parser.feed(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    let tail = state.parser.finish();
                    state.pending.extend(tail);
                }
            }
        }
    })
    .boxed()
}

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, GenerateError>>,
    parser: SseParser,
    pending: VecDeque<RawEvent>,
    finished: bool,
}

#[derive(Debug, Default)]
struct SseParser {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    fn finish(&mut self) -> Option<RawEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            if let Some(event) = self.line(line.trim_end_matches(['\r', '\n'])) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn line(&mut self, line: &str) -> Option<RawEvent> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<RawEvent> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(RawEvent::data(data))
    }
}

/// Invokes a named image function hosted under `functions_base`.
pub struct HttpImageFunction {
    http: reqwest::Client,
    functions_base: Option<String>,
}

impl HttpImageFunction {
    pub fn new(config: &HttpConfig) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.image_timeout)
            .build()
            .map_err(|err| ImageError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            functions_base: config.functions_base.clone(),
        })
    }
}

#[async_trait]
impl ImageFunction for HttpImageFunction {
    async fn invoke(
        &self,
        function: &str,
        prompt: &str,
    ) -> Result<ImageFunctionResponse, ImageError> {
        let Some(base) = self.functions_base.as_deref() else {
            return Err(ImageError::NotConfigured);
        };
        let response = self
            .http
            .post(format!("{base}/{function}"))
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|err| ImageError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ImageError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(ImageError::Transport(format!(
                "image function '{function}' failed ({}): {}",
                status.as_u16(),
                truncate_text(&text, 512)
            )));
        }
        serde_json::from_str::<ImageFunctionResponse>(&text).map_err(|err| {
            ImageError::Transport(format!("image function returned invalid JSON: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::stream::{self, StreamExt};

    use super::*;

    async fn collect(chunks: Vec<&[u8]>) -> Vec<Result<RawEvent, GenerateError>> {
        let owned: Vec<Vec<u8>> = chunks.into_iter().map(<[u8]>::to_vec).collect();
        let bytes = stream::iter(owned.into_iter().map(Ok)).boxed();
        sse_events(bytes).collect().await
    }

    #[tokio::test]
    async fn splits_events_on_blank_lines() {
        let events = collect(vec![
            b"data: {\"a\":1}\n\ndata: [DONE]\n\n".as_slice(),
        ])
        .await;
        assert_eq!(
            events,
            vec![
                Ok(RawEvent::data("{\"a\":1}")),
                Ok(RawEvent::data("[DONE]")),
            ]
        );
    }

    #[tokio::test]
    async fn reassembles_lines_across_chunks_and_multibyte_chars() {
        let text = "data: {\"c\":\"咖啡\"}\r\n\r\n".as_bytes();
        let (head, tail) = text.split_at(14);
        let events = collect(vec![head, tail]).await;
        assert_eq!(events, vec![Ok(RawEvent::data("{\"c\":\"咖啡\"}"))]);
    }

    #[tokio::test]
    async fn ignores_comments_and_flushes_tail_without_blank_line() {
        let events = collect(vec![
            b": keep-alive\n\nevent: message\ndata: first\ndata: second".as_slice(),
        ])
        .await;
        assert_eq!(events, vec![Ok(RawEvent::data("first\nsecond"))]);
    }

    #[tokio::test]
    async fn surfaces_transport_errors() {
        let bytes = stream::iter(vec![
            Ok(b"data: x\n\n".to_vec()),
            Err(GenerateError::transport("reset by peer")),
        ])
        .boxed();
        let events: Vec<_> = sse_events(bytes).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok(RawEvent::data("x")));
        assert!(matches!(events[1], Err(GenerateError::Transport(_))));
    }

    #[tokio::test]
    async fn text_model_without_key_is_not_configured() -> anyhow::Result<()> {
        let model = HttpTextModel::new(&HttpConfig::default())?;
        let request = ChatRequest::single_user("deepseek", "deepseek-v3.2", "hi");
        let err = model.stream_text(&request).await.err();
        assert!(matches!(err, Some(GenerateError::NotConfigured(_))));
        Ok(())
    }

    #[tokio::test]
    async fn image_function_without_base_is_not_configured() -> anyhow::Result<()> {
        let function = HttpImageFunction::new(&HttpConfig::default())?;
        let err = function.invoke("generateImage", "咖啡").await.err();
        assert_eq!(err, Some(ImageError::NotConfigured));
        Ok(())
    }
}
