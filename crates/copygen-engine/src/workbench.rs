//! Session facade over the generator, the image adapter and local storage.
//!
//! Holds the current brief and results the way a single editing page would,
//! and reports user-facing outcomes through a [`Notifier`].

use std::path::PathBuf;
use std::sync::Arc;

use copygen_contracts::brief::Brief;
use copygen_contracts::items::{now_millis, CopyItem, GenerateResult, GenerateSource};
use copygen_contracts::store::{DraftStore, HistoryEntry, HistoryStore};

use crate::error::{GenerateError, ImageError};
use crate::generator::Generator;
use crate::image::{image_prompt_for, ImageAdapter, ImageCards, ImageOutcome};
use crate::mock::{RandomSource, ThreadRandom};

pub const REWRITE_TIPS: [&str; 3] = [
    "补一句当下感受，让文案更有画面感。",
    "把语序再口语一点，像在和朋友聊天。",
    "收尾加一个开放问题，提高互动率。",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EmptyTopic,
    MockFallback { reason: Option<String> },
    GenerationFailed,
    Copied,
    ImageFailed,
    HistoryCleared,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::EmptyTopic => "先输入主题".to_string(),
            Notice::MockFallback { reason: Some(reason) } => {
                format!("当前为Mock数据（{reason}）")
            }
            Notice::MockFallback { reason: None } => "当前为Mock数据".to_string(),
            Notice::GenerationFailed => "生成失败，请重试".to_string(),
            Notice::Copied => "已复制".to_string(),
            Notice::ImageFailed => "配图生成失败，请稍后重试".to_string(),
            Notice::HistoryCleared => "已清空历史".to_string(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

pub struct Workbench {
    generator: Generator,
    images: ImageAdapter,
    history: HistoryStore,
    drafts: DraftStore,
    notifier: Arc<dyn Notifier>,
    rng: Arc<dyn RandomSource>,
    brief: Brief,
    results: Vec<CopyItem>,
    cards: ImageCards,
    last_source: Option<GenerateSource>,
}

impl Workbench {
    /// Opens the storage file and restores the saved draft.
    pub fn new(
        generator: Generator,
        images: ImageAdapter,
        storage_path: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let storage_path = storage_path.into();
        let history = HistoryStore::new(storage_path.clone());
        let mut drafts = DraftStore::new(storage_path);
        let brief = drafts.load();
        Self {
            generator,
            images,
            history,
            drafts,
            notifier,
            rng: Arc::new(ThreadRandom),
            brief,
            results: Vec::new(),
            cards: ImageCards::default(),
            last_source: None,
        }
    }

    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn brief(&self) -> &Brief {
        &self.brief
    }

    pub fn set_brief(&mut self, brief: Brief) {
        self.brief = brief.normalized();
    }

    pub fn results(&self) -> &[CopyItem] {
        &self.results
    }

    pub fn cards(&self) -> &ImageCards {
        &self.cards
    }

    pub fn last_source(&self) -> Option<GenerateSource> {
        self.last_source
    }

    pub fn history(&mut self) -> Vec<HistoryEntry> {
        self.history.load()
    }

    pub async fn generate(&mut self, brief: Brief) -> Result<GenerateResult, GenerateError> {
        let brief = brief.normalized();
        if !brief.has_topic() {
            self.notifier.notify(&Notice::EmptyTopic);
            return Err(GenerateError::Validation("topic is empty".to_string()));
        }
        self.brief = brief;

        let result = match self.generator.generate(&self.brief).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "generate failed");
                self.notifier.notify(&Notice::GenerationFailed);
                return Err(err);
            }
        };

        self.results = result.items.clone();
        self.cards.clear();
        self.last_source = Some(result.source);

        let entry = HistoryEntry::new(&self.brief, result.items.clone());
        if let Err(err) = self.history.push(entry) {
            tracing::warn!(error = %err, "save history failed");
        }
        if let Err(err) = self.drafts.save(&self.brief) {
            tracing::warn!(error = %err, "save draft failed");
        }

        if result.is_mock() {
            self.notifier.notify(&Notice::MockFallback {
                reason: result.reason.clone(),
            });
        }
        Ok(result)
    }

    /// Returns the new favorite flag, or `None` for an unknown id.
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let item = self.results.iter_mut().find(|item| item.id == id)?;
        item.favorite = !item.favorite;
        Some(item.favorite)
    }

    /// Appends one rewrite tip to the item's content.
    pub fn rewrite(&mut self, id: &str) -> Option<&CopyItem> {
        let tip = REWRITE_TIPS[self.rng.pick(REWRITE_TIPS.len())];
        let item = self.results.iter_mut().find(|item| item.id == id)?;
        item.content = format!("{}\n{tip}", item.content);
        item.created_at = now_millis();
        Some(item)
    }

    /// Restores a past brief snapshot and its results.
    pub fn use_history(&mut self, id: &str) -> Option<HistoryEntry> {
        let entry = self.history.find(id)?;
        self.brief.apply_snapshot(&entry.prompt);
        self.results = entry.results.clone();
        self.cards.clear();
        if let Err(err) = self.drafts.save(&self.brief) {
            tracing::warn!(error = %err, "save draft failed");
        }
        Some(entry)
    }

    pub fn clear_history(&mut self) -> anyhow::Result<()> {
        self.history.clear()?;
        self.notifier.notify(&Notice::HistoryCleared);
        Ok(())
    }

    /// Content of the item, for the clipboard.
    pub fn copy_text(&self, id: &str) -> Option<String> {
        let item = self.results.iter().find(|item| item.id == id)?;
        if item.content.is_empty() {
            return None;
        }
        self.notifier.notify(&Notice::Copied);
        Some(item.content.clone())
    }

    /// Illustrates one result. An unknown id has no prompt and gets no card.
    pub async fn illustrate(&mut self, id: &str) -> Result<ImageOutcome, ImageError> {
        let Some(prompt) = self
            .results
            .iter()
            .find(|item| item.id == id)
            .map(image_prompt_for)
        else {
            self.notifier.notify(&Notice::ImageFailed);
            return Err(ImageError::EmptyPrompt);
        };

        self.cards.begin(id);
        match self.images.generate(&prompt).await {
            Ok(outcome) => {
                self.cards.succeed(id, &outcome);
                Ok(outcome)
            }
            Err(err) => {
                self.cards.fail(id, &err);
                self.notifier.notify(&Notice::ImageFailed);
                Err(err)
            }
        }
    }

    pub fn save_draft(&mut self) -> anyhow::Result<()> {
        self.drafts.save(&self.brief)
    }

    pub fn reset_draft(&mut self) -> anyhow::Result<()> {
        self.brief = Brief::default();
        self.drafts.reset()
    }
}
