use std::fmt;

use serde::{Deserialize, Serialize};

pub const RESULT_COUNT_OPTIONS: [usize; 3] = [1, 3, 5];
pub const DEFAULT_RESULT_COUNT: usize = 3;
pub const DEFAULT_DIVERSITY: u8 = 50;
pub const MAX_DIVERSITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "朋友圈")]
    Moments,
    #[serde(rename = "小红书")]
    Xiaohongshu,
    #[serde(rename = "微博")]
    Weibo,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Moments, Platform::Xiaohongshu, Platform::Weibo];

    pub fn label(self) -> &'static str {
        match self {
            Platform::Moments => "朋友圈",
            Platform::Xiaohongshu => "小红书",
            Platform::Weibo => "微博",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|item| item.label() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    #[serde(rename = "自然")]
    Natural,
    #[serde(rename = "治愈")]
    Healing,
    #[serde(rename = "高级")]
    Refined,
    #[serde(rename = "幽默")]
    Humorous,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Natural, Tone::Healing, Tone::Refined, Tone::Humorous];

    pub fn label(self) -> &'static str {
        match self {
            Tone::Natural => "自然",
            Tone::Healing => "治愈",
            Tone::Refined => "高级",
            Tone::Humorous => "幽默",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|item| item.label() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Length {
    #[serde(rename = "短")]
    Short,
    #[default]
    #[serde(rename = "中")]
    Medium,
    #[serde(rename = "长")]
    Long,
}

impl Length {
    pub const ALL: [Length; 3] = [Length::Short, Length::Medium, Length::Long];

    pub fn label(self) -> &'static str {
        match self {
            Length::Short => "短",
            Length::Medium => "中",
            Length::Long => "长",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|item| item.label() == raw)
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_label!(Platform, Tone, Length);

/// The content brief a user fills in before generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Brief {
    pub topic: String,
    pub scene: String,
    pub audience: String,
    pub requirements: String,
    pub platform: Platform,
    pub tone: Tone,
    pub length: Length,
    pub result_count: usize,
    pub diversity: u8,
    pub image_count: u32,
    pub with_emoji: bool,
    pub with_hashtags: bool,
}

impl Default for Brief {
    fn default() -> Self {
        Self {
            topic: String::new(),
            scene: String::new(),
            audience: String::new(),
            requirements: String::new(),
            platform: Platform::default(),
            tone: Tone::default(),
            length: Length::default(),
            result_count: DEFAULT_RESULT_COUNT,
            diversity: DEFAULT_DIVERSITY,
            image_count: 0,
            with_emoji: true,
            with_hashtags: true,
        }
    }
}

impl Brief {
    pub fn has_topic(&self) -> bool {
        !self.topic.trim().is_empty()
    }

    /// Clamps values that arrive from outside the option sets.
    pub fn normalized(mut self) -> Self {
        self.result_count = normalize_result_count(self.result_count);
        self.diversity = self.diversity.min(MAX_DIVERSITY);
        self
    }

    pub fn snapshot(&self) -> BriefSnapshot {
        BriefSnapshot {
            topic: self.topic.clone(),
            scene: self.scene.clone(),
            audience: self.audience.clone(),
            platform: self.platform,
            tone: self.tone,
            length: self.length,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &BriefSnapshot) {
        self.topic = snapshot.topic.clone();
        self.scene = snapshot.scene.clone();
        self.audience = snapshot.audience.clone();
        self.platform = snapshot.platform;
        self.tone = snapshot.tone;
        self.length = snapshot.length;
    }
}

pub fn normalize_result_count(value: usize) -> usize {
    if RESULT_COUNT_OPTIONS.contains(&value) {
        value
    } else {
        DEFAULT_RESULT_COUNT
    }
}

/// The subset of brief fields recorded alongside each history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSnapshot {
    pub topic: String,
    pub scene: String,
    pub audience: String,
    pub platform: Platform,
    pub tone: Tone,
    pub length: Length,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn labels_round_trip_through_serde() -> anyhow::Result<()> {
        let value = serde_json::to_value(Platform::Xiaohongshu)?;
        assert_eq!(value, json!("小红书"));
        let tone: Tone = serde_json::from_value(json!("幽默"))?;
        assert_eq!(tone, Tone::Humorous);
        assert!(serde_json::from_value::<Length>(json!("超长")).is_err());
        Ok(())
    }

    #[test]
    fn from_label_trims_input() {
        assert_eq!(Platform::from_label(" 微博 "), Some(Platform::Weibo));
        assert_eq!(Tone::from_label("自然"), Some(Tone::Natural));
        assert_eq!(Length::from_label("long"), None);
    }

    #[test]
    fn brief_deserializes_camel_case_with_defaults() -> anyhow::Result<()> {
        let brief: Brief = serde_json::from_value(json!({
            "topic": "咖啡",
            "resultCount": 5,
            "withEmoji": false,
        }))?;
        assert_eq!(brief.topic, "咖啡");
        assert_eq!(brief.result_count, 5);
        assert!(!brief.with_emoji);
        assert!(brief.with_hashtags);
        assert_eq!(brief.length, Length::Medium);
        assert_eq!(brief.diversity, DEFAULT_DIVERSITY);
        Ok(())
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let brief = Brief {
            result_count: 4,
            diversity: 250,
            ..Brief::default()
        }
        .normalized();
        assert_eq!(brief.result_count, DEFAULT_RESULT_COUNT);
        assert_eq!(brief.diversity, MAX_DIVERSITY);
    }

    #[test]
    fn has_topic_ignores_whitespace() {
        let mut brief = Brief::default();
        assert!(!brief.has_topic());
        brief.topic = "   ".to_string();
        assert!(!brief.has_topic());
        brief.topic = " 旅行 ".to_string();
        assert!(brief.has_topic());
    }

    #[test]
    fn snapshot_restores_selected_fields_only() {
        let source = Brief {
            topic: "春日野餐".to_string(),
            scene: "公园".to_string(),
            platform: Platform::Weibo,
            tone: Tone::Healing,
            length: Length::Long,
            ..Brief::default()
        };
        let mut target = Brief {
            requirements: "少用形容词".to_string(),
            result_count: 5,
            ..Brief::default()
        };
        target.apply_snapshot(&source.snapshot());
        assert_eq!(target.topic, "春日野餐");
        assert_eq!(target.platform, Platform::Weibo);
        assert_eq!(target.length, Length::Long);
        assert_eq!(target.requirements, "少用形容词");
        assert_eq!(target.result_count, 5);
    }
}
