use copygen_contracts::brief::{Brief, Length};

const EMPTY_FIELD: &str = "无";
const ITEM_SHAPE: &str =
    r#"{"title":"", "content":"", "hashtags":[""], "platform":"", "tone":""}"#;
pub(crate) const STRICT_LINE: &str =
    "再次强调：只输出一个可以被 JSON.parse 直接解析的 JSON 数组，第一个字符必须是 [，最后一个字符必须是 ]，不要输出任何其他文字。";

pub fn length_range(length: Length) -> &'static str {
    match length {
        Length::Short => "40-80 字",
        Length::Medium => "80-150 字",
        Length::Long => "150-300 字",
    }
}

fn or_placeholder(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        EMPTY_FIELD
    } else {
        trimmed
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "是"
    } else {
        "否"
    }
}

/// Renders the instruction sent to the text model.
///
/// `strict` adds one closing line that insists on bare, parseable JSON; it is
/// only used for the retry attempt.
pub fn build_prompt(brief: &Brief, strict: bool) -> String {
    let count = brief.result_count;
    let mut lines = vec![
        "你是中文社媒文案助手，擅长朋友圈/小红书/微博。".to_string(),
        format!("请基于以下信息生成 {count} 条文案候选。"),
        "要求：".to_string(),
        "1. 只输出 JSON 数组，不要输出解释、前后缀文字或 ``` 代码块。".to_string(),
        format!("2. 数组必须恰好包含 {count} 个对象。"),
        "3. 每条文案内部不要重复句子，不同文案之间不要使用相同的开头或相同的句子。".to_string(),
        "4. 语气自然，像真人随手写下的，避免模板化、套话式表达。".to_string(),
        format!(
            "5. 创意度：{}（0-100），数值越高句式与结构变化越大。",
            brief.diversity
        ),
        format!("6. 每条正文长度约 {}。", length_range(brief.length)),
        format!("平台：{}", brief.platform),
        format!("主题：{}", brief.topic.trim()),
        format!("场景：{}", or_placeholder(&brief.scene)),
        format!("受众：{}", or_placeholder(&brief.audience)),
        format!("补充要求：{}", or_placeholder(&brief.requirements)),
        format!("语气：{}", brief.tone),
        format!("长度：{}", brief.length),
        format!("是否包含 emoji：{}", yes_no(brief.with_emoji)),
        format!("是否包含 hashtag：{}", yes_no(brief.with_hashtags)),
        format!("配图数量：{}", brief.image_count),
        "JSON 数组内每个对象格式如下：".to_string(),
        ITEM_SHAPE.to_string(),
    ];
    if strict {
        lines.push(STRICT_LINE.to_string());
    }
    lines.join("\n")
}
