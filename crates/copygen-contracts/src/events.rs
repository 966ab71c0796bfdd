use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::brief::Platform;
use crate::items::GenerateSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCause {
    InsufficientItems,
    RecoverableError,
}

/// Everything a session records to `events.jsonl`.
///
/// The variant name becomes the `type` field of the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    GenerationStarted {
        topic: String,
        platform: Platform,
        result_count: usize,
        mock_mode: bool,
    },
    GenerationAttemptFailed {
        strict: bool,
        kind: String,
        reason: String,
    },
    GenerationRetry {
        cause: RetryCause,
        #[serde(skip_serializing_if = "Option::is_none")]
        got: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    GenerationFallback {
        reason: String,
    },
    /// `source` is `None` when the run ended in an error.
    GenerationFinished {
        source: Option<GenerateSource>,
        items: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    ImageRequested {
        function: String,
        prompt_chars: usize,
    },
    ImageFinished {
        image_url: String,
    },
    ImageFailed {
        kind: String,
        code: String,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::GenerationStarted { .. } => "generation_started",
            SessionEvent::GenerationAttemptFailed { .. } => "generation_attempt_failed",
            SessionEvent::GenerationRetry { .. } => "generation_retry",
            SessionEvent::GenerationFallback { .. } => "generation_fallback",
            SessionEvent::GenerationFinished { .. } => "generation_finished",
            SessionEvent::ImageRequested { .. } => "image_requested",
            SessionEvent::ImageFinished { .. } => "image_finished",
            SessionEvent::ImageFailed { .. } => "image_failed",
        }
    }
}

/// Append-only JSONL sink shared by the generator and the image adapter.
///
/// Each line is the tagged event plus `session_id` and an RFC 3339 `ts`.
/// Clones share one lock so concurrent emitters never interleave lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn emit(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let Value::Object(mut line) = serde_json::to_value(event)? else {
            bail!("event {} is not a JSON object", event.name());
        };
        line.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        line.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        let text = serde_json::to_string(&line)?;

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line))
    }
}
