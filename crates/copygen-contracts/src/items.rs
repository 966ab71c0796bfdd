use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::brief::{Platform, Tone};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyItem {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub tone: Tone,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: i64,
}

impl CopyItem {
    /// Content followed by hashtags on a new line. Used as the image prompt.
    pub fn share_text(&self) -> String {
        if self.hashtags.is_empty() {
            return self.content.clone();
        }
        format!("{}\n{}", self.content, self.hashtags.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateSource {
    Mock,
    Cloud,
}

impl GenerateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerateSource::Mock => "mock",
            GenerateSource::Cloud => "cloud",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResult {
    pub items: Vec<CopyItem>,
    pub source: GenerateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GenerateResult {
    pub fn cloud(items: Vec<CopyItem>) -> Self {
        Self {
            items,
            source: GenerateSource::Cloud,
            reason: None,
        }
    }

    pub fn mock(items: Vec<CopyItem>, reason: impl Into<String>) -> Self {
        Self {
            items,
            source: GenerateSource::Mock,
            reason: Some(reason.into()),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.source == GenerateSource::Mock
    }
}

/// Per-item image generation state shown next to a result card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCardState {
    pub loading: bool,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub revised_prompt: Option<String>,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn item(hashtags: &[&str]) -> CopyItem {
        CopyItem {
            id: "copy_1_0".to_string(),
            title: "小红书风格 1".to_string(),
            content: "第一行\n第二行".to_string(),
            hashtags: hashtags.iter().map(|tag| tag.to_string()).collect(),
            platform: Platform::Xiaohongshu,
            tone: Tone::Natural,
            favorite: false,
            created_at: 1,
        }
    }

    #[test]
    fn share_text_appends_hashtags_on_new_line() {
        assert_eq!(item(&[]).share_text(), "第一行\n第二行");
        assert_eq!(
            item(&["#咖啡", "#今日灵感"]).share_text(),
            "第一行\n第二行\n#咖啡 #今日灵感"
        );
    }

    #[test]
    fn cloud_result_omits_reason_when_serialized() -> anyhow::Result<()> {
        let value = serde_json::to_value(GenerateResult::cloud(vec![item(&[])]))?;
        assert_eq!(value["source"], json!("cloud"));
        assert!(value.get("reason").is_none());
        assert_eq!(value["items"][0]["createdAt"], json!(1));

        let mock = serde_json::to_value(GenerateResult::mock(Vec::new(), "MOCK_MODE"))?;
        assert_eq!(mock["reason"], Value::String("MOCK_MODE".to_string()));
        Ok(())
    }
}
