use std::sync::Arc;

use copygen_contracts::brief::{Brief, Length, Platform};
use copygen_contracts::items::{now_millis, CopyItem};
use rand::Rng;

/// Source of the few cosmetic random choices; swapped for a fixed one in tests.
pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..upper`.
    fn pick(&self, upper: usize) -> usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Always answers the same index (wrapped into range).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRandom(pub usize);

impl RandomSource for FixedRandom {
    fn pick(&self, upper: usize) -> usize {
        self.0 % upper.max(1)
    }
}

const DEFAULT_TOPIC: &str = "今天";
const DEFAULT_HASHTAG_SEED: &str = "今日分享";
const DEFAULT_SCENE: &str = "普通的一天";
const DEFAULT_AUDIENCE: &str = "朋友们";

const TRANSITIONS: [&str; 5] = [
    "说真的，这种感觉很难用一句话讲完。",
    "后来想想，快乐其实没那么复杂。",
    "有些瞬间，只有停下来才看得见。",
    "不需要很隆重，刚刚好就已经足够。",
    "把它记下来，是想提醒以后的自己。",
];

const CLOSINGS: [&str; 5] = [
    "你最近有没有类似的时刻？",
    "就先记录到这里吧。",
    "愿明天也有这样的好心情。",
    "如果你也在，就更好了。",
    "下次见，继续分享。",
];

fn platform_hooks(platform: Platform) -> [&'static str; 3] {
    match platform {
        Platform::Xiaohongshu => ["今天挖到一个小确幸", "这条想给同频的人", "直接说结论：值得"],
        Platform::Weibo => ["今日份更新：", "一些碎碎念：", "突然想记录一下："],
        Platform::Moments => ["今天想分享一件小事", "这一刻很想发个朋友圈", "留个生活切片"],
    }
}

fn length_hint(length: Length) -> &'static str {
    match length {
        Length::Short => "一句话点题，干净利落。",
        Length::Medium => "控制在 2-3 句，信息和情绪平衡。",
        Length::Long => "补充场景与细节，让情绪更完整。",
    }
}

pub fn build_hashtags(topic: &str, platform: Platform) -> Vec<String> {
    let seed = topic.trim();
    let seed = if seed.is_empty() {
        DEFAULT_HASHTAG_SEED
    } else {
        seed
    };
    let fixed: &[&str] = match platform {
        Platform::Xiaohongshu => &["#真实体验", "#今日灵感"],
        Platform::Weibo => &["#碎碎念", "#记录生活"],
        Platform::Moments => &["#朋友圈日常"],
    };
    std::iter::once(format!("#{seed}"))
        .chain(fixed.iter().map(|tag| tag.to_string()))
        .collect()
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

/// Local stand-in for the text model. Never fails.
#[derive(Clone)]
pub struct MockGenerator {
    rng: Arc<dyn RandomSource>,
}

impl MockGenerator {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    pub fn build(&self, brief: &Brief) -> Vec<CopyItem> {
        let topic = or_default(&brief.topic, DEFAULT_TOPIC);
        let scene = or_default(&brief.scene, DEFAULT_SCENE);
        let audience = or_default(&brief.audience, DEFAULT_AUDIENCE);
        let hooks = platform_hooks(brief.platform);
        let hashtags = if brief.with_hashtags {
            build_hashtags(&brief.topic, brief.platform)
        } else {
            Vec::new()
        };
        let emoji = if brief.with_emoji { "✨" } else { "" };
        let hint = length_hint(brief.length);
        let now = now_millis();

        (0..brief.result_count)
            .map(|idx| {
                let created_at = now + idx as i64;
                let sign_off = if self.rng.pick(2) == 0 {
                    format!("写给{audience}，也提醒自己慢一点、真一点。")
                } else {
                    format!("分享给{audience}，愿我们都慢一点、真一点。")
                };
                let content = [
                    format!("{}{emoji}", hooks[idx % hooks.len()]),
                    format!("{scene}里，我对“{topic}”有了新的感受。{hint}"),
                    TRANSITIONS[idx % TRANSITIONS.len()].to_string(),
                    CLOSINGS[idx % CLOSINGS.len()].to_string(),
                    sign_off,
                ]
                .join("\n");
                CopyItem {
                    id: format!("copy_{created_at}_{idx}"),
                    title: format!("{}风格 {}", brief.platform, idx + 1),
                    content,
                    hashtags: hashtags.clone(),
                    platform: brief.platform,
                    tone: brief.tone,
                    favorite: false,
                    created_at,
                }
            })
            .collect()
    }
}
