use std::sync::Arc;

use copygen_contracts::brief::Brief;
use copygen_contracts::events::{EventWriter, RetryCause, SessionEvent};
use copygen_contracts::items::{CopyItem, GenerateResult};

use crate::config::{GeneratorConfig, GeneratorMode};
use crate::decode::decode_items;
use crate::error::GenerateError;
use crate::mock::{MockGenerator, RandomSource, ThreadRandom};
use crate::prompt::build_prompt;
use crate::stream::accumulate;
use crate::transport::{ChatRequest, TextModel};

pub const MOCK_MODE_REASON: &str = "MOCK_MODE";

/// Where a generation run stands between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Primary,
    /// Primary produced fewer items than requested.
    TopUp { partial: Vec<CopyItem> },
    /// Primary failed with a recoverable code.
    Recover { error: GenerateError },
    Fallback { error: GenerateError },
    Done(GenerateResult),
}

pub fn after_primary(
    outcome: Result<Vec<CopyItem>, GenerateError>,
    wanted: usize,
    config: &GeneratorConfig,
) -> Step {
    match outcome {
        Ok(items) if items.len() >= wanted => Step::Done(GenerateResult::cloud(items)),
        Ok(partial) => Step::TopUp { partial },
        Err(error) if config.is_recoverable(error.code()) => Step::Recover { error },
        Err(error) => Step::Fallback { error },
    }
}

/// The retry only wins when it is at least as productive as the primary.
pub fn after_top_up(partial: Vec<CopyItem>, outcome: Result<Vec<CopyItem>, GenerateError>) -> Step {
    match outcome {
        Ok(items) if items.len() >= partial.len() => Step::Done(GenerateResult::cloud(items)),
        _ => Step::Done(GenerateResult::cloud(partial)),
    }
}

/// A failed retry falls back with the primary error, not the retry's.
pub fn after_recover(error: GenerateError, outcome: Result<Vec<CopyItem>, GenerateError>) -> Step {
    match outcome {
        Ok(items) if !items.is_empty() => Step::Done(GenerateResult::cloud(items)),
        _ => Step::Fallback { error },
    }
}

/// Runs a brief against the text model with one strict retry and a mock fallback.
pub struct Generator {
    model: Arc<dyn TextModel>,
    config: GeneratorConfig,
    mock: MockGenerator,
    events: Option<EventWriter>,
}

impl Generator {
    pub fn new(model: Arc<dyn TextModel>, config: GeneratorConfig) -> Self {
        Self {
            model,
            config,
            mock: MockGenerator::new(Arc::new(ThreadRandom)),
            events: None,
        }
    }

    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.mock = MockGenerator::new(rng);
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub async fn generate(&self, brief: &Brief) -> Result<GenerateResult, GenerateError> {
        self.emit(SessionEvent::GenerationStarted {
            topic: brief.topic.clone(),
            platform: brief.platform,
            result_count: brief.result_count,
            mock_mode: self.config.mode == GeneratorMode::Mock,
        });

        if self.config.mode == GeneratorMode::Mock {
            tokio::time::sleep(self.config.mock_delay).await;
            let result = GenerateResult::mock(self.mock.build(brief), MOCK_MODE_REASON);
            self.finished(&result);
            return Ok(result);
        }

        let mut step = Step::Primary;
        loop {
            step = match step {
                Step::Primary => {
                    let outcome = self.attempt(brief, false).await;
                    if let Err(err) = &outcome {
                        self.attempt_failed(err, false);
                    }
                    after_primary(outcome, brief.result_count, &self.config)
                }
                Step::TopUp { partial } => {
                    tracing::info!(
                        got = partial.len(),
                        wanted = brief.result_count,
                        "too few items, retrying strict"
                    );
                    self.emit(SessionEvent::GenerationRetry {
                        cause: RetryCause::InsufficientItems,
                        got: Some(partial.len()),
                        reason: None,
                    });
                    let outcome = self.attempt(brief, true).await;
                    if let Err(err) = &outcome {
                        self.attempt_failed(err, true);
                    }
                    after_top_up(partial, outcome)
                }
                Step::Recover { error } => {
                    tracing::info!(reason = error.code(), "recoverable failure, retrying strict");
                    self.emit(SessionEvent::GenerationRetry {
                        cause: RetryCause::RecoverableError,
                        got: None,
                        reason: Some(error.code().to_string()),
                    });
                    let outcome = self.attempt(brief, true).await;
                    if let Err(err) = &outcome {
                        self.attempt_failed(err, true);
                    }
                    after_recover(error, outcome)
                }
                Step::Fallback { error } => {
                    if !self.config.mock_fallback {
                        self.emit(SessionEvent::GenerationFinished {
                            source: None,
                            items: 0,
                            reason: Some(error.reason()),
                        });
                        return Err(error);
                    }
                    let reason = error.reason();
                    tracing::warn!(kind = %error.kind(), %reason, "falling back to mock output");
                    self.emit(SessionEvent::GenerationFallback {
                        reason: reason.clone(),
                    });
                    tokio::time::sleep(self.config.fallback_delay).await;
                    Step::Done(GenerateResult::mock(self.mock.build(brief), reason))
                }
                Step::Done(result) => {
                    self.finished(&result);
                    return Ok(result);
                }
            };
        }
    }

    async fn attempt(&self, brief: &Brief, strict: bool) -> Result<Vec<CopyItem>, GenerateError> {
        let request = ChatRequest::single_user(
            self.config.provider.clone(),
            self.config.model.clone(),
            build_prompt(brief, strict),
        );
        let stream = self.model.stream_text(&request).await?;
        let text = accumulate(stream).await?;
        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        decode_items(&text, brief)
    }

    fn attempt_failed(&self, err: &GenerateError, strict: bool) {
        tracing::warn!(strict, kind = %err.kind(), error = %err, "generation attempt failed");
        self.emit(SessionEvent::GenerationAttemptFailed {
            strict,
            kind: err.kind().as_str().to_string(),
            reason: err.reason(),
        });
    }

    fn finished(&self, result: &GenerateResult) {
        tracing::info!(
            source = result.source.as_str(),
            items = result.items.len(),
            reason = result.reason.as_deref().unwrap_or(""),
            "generation finished"
        );
        self.emit(SessionEvent::GenerationFinished {
            source: Some(result.source),
            items: result.items.len(),
            reason: result.reason.clone(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(&event) {
            tracing::warn!(event = event.name(), error = %err, "failed to write event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use copygen_contracts::brief::Platform;
    use copygen_contracts::items::GenerateSource;
    use serde_json::{json, Value};

    use super::*;
    use crate::mock::FixedRandom;
    use crate::prompt::STRICT_LINE;
    use crate::transport::testing::{Scripted, ScriptedTextModel};

    fn brief(count: usize) -> Brief {
        Brief {
            topic: "咖啡".to_string(),
            platform: Platform::Xiaohongshu,
            result_count: count,
            ..Brief::default()
        }
    }

    fn payload(contents: &[&str]) -> Scripted {
        let rows: Vec<Value> = contents
            .iter()
            .map(|content| json!({ "content": content }))
            .collect();
        Scripted::Text(vec![Value::Array(rows).to_string()])
    }

    fn generator(script: Vec<Scripted>) -> (Arc<ScriptedTextModel>, Generator) {
        generator_with(script, GeneratorConfig::default())
    }

    fn generator_with(
        script: Vec<Scripted>,
        config: GeneratorConfig,
    ) -> (Arc<ScriptedTextModel>, Generator) {
        let model = Arc::new(ScriptedTextModel::new(script));
        let generator = Generator::new(model.clone(), config.without_delays())
            .with_random(Arc::new(FixedRandom(0)));
        (model, generator)
    }

    fn item(content: &str) -> CopyItem {
        CopyItem {
            id: format!("id-{content}"),
            title: "t".to_string(),
            content: content.to_string(),
            hashtags: Vec::new(),
            platform: Platform::Moments,
            tone: Default::default(),
            favorite: false,
            created_at: 0,
        }
    }

    #[test]
    fn primary_transitions() {
        let config = GeneratorConfig::default();
        assert_eq!(
            after_primary(Ok(vec![item("a"), item("b")]), 2, &config),
            Step::Done(GenerateResult::cloud(vec![item("a"), item("b")]))
        );
        assert_eq!(
            after_primary(Ok(vec![item("a")]), 3, &config),
            Step::TopUp {
                partial: vec![item("a")]
            }
        );
        assert_eq!(
            after_primary(Err(GenerateError::EmptyResult), 3, &config),
            Step::Recover {
                error: GenerateError::EmptyResult
            }
        );
        let transport = GenerateError::transport("refused");
        assert_eq!(
            after_primary(Err(transport.clone()), 3, &config),
            Step::Fallback { error: transport }
        );
    }

    #[test]
    fn top_up_keeps_the_larger_batch() {
        let partial = vec![item("a"), item("b")];
        assert_eq!(
            after_top_up(partial.clone(), Ok(vec![item("x"), item("y"), item("z")])),
            Step::Done(GenerateResult::cloud(vec![item("x"), item("y"), item("z")]))
        );
        assert_eq!(
            after_top_up(partial.clone(), Ok(vec![item("x")])),
            Step::Done(GenerateResult::cloud(partial.clone()))
        );
        assert_eq!(
            after_top_up(partial.clone(), Err(GenerateError::EmptyResponse)),
            Step::Done(GenerateResult::cloud(partial))
        );
    }

    #[test]
    fn recover_carries_the_original_error() {
        let original = GenerateError::InvalidPayload("eof".to_string());
        assert_eq!(
            after_recover(original.clone(), Ok(vec![item("a")])),
            Step::Done(GenerateResult::cloud(vec![item("a")]))
        );
        assert_eq!(
            after_recover(original.clone(), Err(GenerateError::transport("later"))),
            Step::Fallback { error: original }
        );
    }

    #[tokio::test]
    async fn full_primary_is_returned_without_retry() -> anyhow::Result<()> {
        let (model, generator) = generator(vec![payload(&["a", "b", "c"])]);
        let result = generator.generate(&brief(3)).await?;
        assert_eq!(result.source, GenerateSource::Cloud);
        assert_eq!(result.reason, None);
        assert_eq!(result.items.len(), 3);
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains(STRICT_LINE));
        Ok(())
    }

    #[tokio::test]
    async fn short_primary_is_topped_up_by_strict_retry() -> anyhow::Result<()> {
        let (model, generator) = generator(vec![payload(&["a"]), payload(&["x", "y", "z"])]);
        let result = generator.generate(&brief(3)).await?;
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.items[0].content, "x");
        assert!(model.prompts()[1].contains(STRICT_LINE));
        Ok(())
    }

    #[tokio::test]
    async fn failed_top_up_keeps_primary_items() -> anyhow::Result<()> {
        let (_, generator) = generator(vec![
            payload(&["a", "b"]),
            Scripted::Fail(GenerateError::transport("reset")),
        ]);
        let result = generator.generate(&brief(5)).await?;
        assert_eq!(result.source, GenerateSource::Cloud);
        assert_eq!(result.items.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_items_twice_falls_back_to_mock() -> anyhow::Result<()> {
        let (model, generator) = generator(vec![
            Scripted::Text(vec!["[]".to_string()]),
            Scripted::Text(vec!["[{\"content\":\"  \"}]".to_string()]),
        ]);
        let result = generator.generate(&brief(3)).await?;
        assert_eq!(result.source, GenerateSource::Mock);
        assert_eq!(result.reason.as_deref(), Some("EMPTY_MODEL_ITEMS"));
        assert_eq!(result.items.len(), 3);
        assert_eq!(model.prompts().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn recoverable_failure_then_success_is_cloud() -> anyhow::Result<()> {
        let (_, generator) = generator(vec![
            Scripted::Text(vec!["抱歉，我无法".to_string(), "完成".to_string()]),
            payload(&["a"]),
        ]);
        let result = generator.generate(&brief(3)).await?;
        assert_eq!(result.source, GenerateSource::Cloud);
        assert_eq!(result.items.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_stream_is_recoverable() -> anyhow::Result<()> {
        let (model, generator) = generator(vec![
            Scripted::Events(vec!["[DONE]".to_string()]),
            Scripted::Events(vec![
                json!({"choices": [{"delta": {"content": "[{\"content\":\"ok\"}]"}}]}).to_string(),
                "[DONE]".to_string(),
            ]),
        ]);
        let result = generator.generate(&brief(1)).await?;
        assert_eq!(result.source, GenerateSource::Cloud);
        assert_eq!(result.items[0].content, "ok");
        assert_eq!(model.prompts().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn transport_failure_skips_retry_and_keeps_detail() -> anyhow::Result<()> {
        let (model, generator) =
            generator(vec![Scripted::Fail(GenerateError::transport("connection refused"))]);
        let result = generator.generate(&brief(3)).await?;
        assert_eq!(result.source, GenerateSource::Mock);
        assert_eq!(
            result.reason.as_deref(),
            Some("TRANSPORT_ERROR: connection refused")
        );
        assert_eq!(model.prompts().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn disabled_fallback_returns_original_error() {
        let config = GeneratorConfig {
            mock_fallback: false,
            ..GeneratorConfig::default()
        };
        let (_, generator) = generator_with(
            vec![
                Scripted::Text(vec!["not json".to_string()]),
                Scripted::Fail(GenerateError::transport("later")),
            ],
            config,
        );
        let err = generator.generate(&brief(3)).await.err();
        assert!(matches!(err, Some(GenerateError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn mock_mode_never_calls_the_model() -> anyhow::Result<()> {
        let config = GeneratorConfig {
            mode: GeneratorMode::Mock,
            ..GeneratorConfig::default()
        };
        let (model, generator) = generator_with(Vec::new(), config);
        let result = generator.generate(&brief(5)).await?;
        assert_eq!(result.reason.as_deref(), Some(MOCK_MODE_REASON));
        assert_eq!(result.items.len(), 5);
        assert!(model.prompts().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn transitions_are_written_to_the_event_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let (_, generator) = generator(vec![
            Scripted::Text(vec!["[]".to_string()]),
            Scripted::Text(vec!["[]".to_string()]),
        ]);
        let generator = generator.with_events(EventWriter::new(&path, "session-1"));
        generator.generate(&brief(3)).await?;

        let types: Vec<String> = fs::read_to_string(&path)?
            .lines()
            .map(|line| serde_json::from_str::<Value>(line))
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            types,
            vec![
                "generation_started",
                "generation_attempt_failed",
                "generation_retry",
                "generation_attempt_failed",
                "generation_fallback",
                "generation_finished",
            ]
        );
        Ok(())
    }
}
