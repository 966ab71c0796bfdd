use std::sync::Arc;

use copygen_contracts::events::{EventWriter, SessionEvent};
use copygen_contracts::items::{CopyItem, ImageCardState};
use indexmap::IndexMap;

use crate::config::GeneratorConfig;
use crate::error::ImageError;
use crate::transport::ImageFunction;

const UNKNOWN_CODE: &str = "UNKNOWN";
const DEFAULT_FAILURE_MESSAGE: &str = "image generation failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub image_url: String,
    pub revised_prompt: String,
}

/// Prompt used to illustrate a generated item.
pub fn image_prompt_for(item: &CopyItem) -> String {
    item.share_text()
}

/// Single-shot wrapper around the remote image function.
pub struct ImageAdapter {
    function: Arc<dyn ImageFunction>,
    function_name: Option<String>,
    events: Option<EventWriter>,
}

impl ImageAdapter {
    pub fn new(function: Arc<dyn ImageFunction>, config: &GeneratorConfig) -> Self {
        Self {
            function,
            function_name: config
                .image_function
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn generate(&self, prompt: &str) -> Result<ImageOutcome, ImageError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::EmptyPrompt);
        }
        let Some(function) = self.function_name.as_deref() else {
            return Err(ImageError::NotConfigured);
        };

        self.emit(SessionEvent::ImageRequested {
            function: function.to_string(),
            prompt_chars: prompt.chars().count(),
        });
        let outcome = self.invoke(function, prompt).await;
        match &outcome {
            Ok(outcome) => {
                tracing::info!(function, "image generated");
                self.emit(SessionEvent::ImageFinished {
                    image_url: outcome.image_url.clone(),
                });
            }
            Err(err) => {
                tracing::warn!(function, code = err.code(), error = %err, "image generation failed");
                self.emit(SessionEvent::ImageFailed {
                    kind: err.kind().as_str().to_string(),
                    code: err.code().to_string(),
                });
            }
        }
        outcome
    }

    async fn invoke(&self, function: &str, prompt: &str) -> Result<ImageOutcome, ImageError> {
        let response = self.function.invoke(function, prompt).await?;
        if response.success == Some(false) {
            return Err(ImageError::Provider {
                code: response
                    .code_text()
                    .unwrap_or_else(|| UNKNOWN_CODE.to_string()),
                message: response
                    .message
                    .as_deref()
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                    .to_string(),
            });
        }
        let image_url = response
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ImageError::EmptyUrl)?
            .to_string();
        let revised_prompt = response
            .revised_prompt
            .as_deref()
            .map(str::trim)
            .filter(|revised| !revised.is_empty())
            .unwrap_or(prompt)
            .to_string();
        Ok(ImageOutcome {
            image_url,
            revised_prompt,
        })
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = self.events.as_ref() {
            if let Err(err) = events.emit(&event) {
                tracing::warn!(event = event.name(), error = %err, "failed to write event");
            }
        }
    }
}

/// Image state per item id, in the order items were first illustrated.
#[derive(Debug, Clone, Default)]
pub struct ImageCards {
    cards: IndexMap<String, ImageCardState>,
}

impl ImageCards {
    pub fn begin(&mut self, id: &str) {
        let card = self.cards.entry(id.to_string()).or_default();
        card.loading = true;
        card.error = None;
    }

    pub fn succeed(&mut self, id: &str, outcome: &ImageOutcome) {
        self.cards.insert(
            id.to_string(),
            ImageCardState {
                loading: false,
                image_url: Some(outcome.image_url.clone()),
                error: None,
                revised_prompt: Some(outcome.revised_prompt.clone()),
            },
        );
    }

    pub fn fail(&mut self, id: &str, err: &ImageError) {
        let card = self.cards.entry(id.to_string()).or_default();
        card.loading = false;
        card.error = Some(err.to_string());
    }

    pub fn get(&self, id: &str) -> Option<&ImageCardState> {
        self.cards.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ImageCardState)> {
        self.cards.iter()
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }
}
