use std::collections::HashSet;

use copygen_contracts::brief::{Brief, Platform, Tone};
use copygen_contracts::items::{now_millis, CopyItem};
use serde_json::{Map, Value};

use crate::error::GenerateError;

/// Picks the most likely JSON payload out of free-form model output.
///
/// Order: first fenced block (optionally tagged `json`), then the span from
/// the first `[` to the last `]`, then the trimmed text.
pub fn extract_json_text(raw: &str) -> String {
    if let Some(fenced) = fenced_block(raw) {
        let fenced = fenced.trim();
        if !fenced.is_empty() {
            return fenced.to_string();
        }
    }

    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if end > start {
            return raw[start..=end].to_string();
        }
    }

    raw.trim().to_string()
}

fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let mut body = &raw[open + 3..];
    if body
        .get(..4)
        .map(|tag| tag.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        body = &body[4..];
    }
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Trims each line, drops blanks and repeats, keeps first-seen order.
pub fn sanitize_content(content: &str) -> String {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .collect::<Vec<&str>>()
        .join("\n")
}

pub fn decode_items(raw: &str, brief: &Brief) -> Result<Vec<CopyItem>, GenerateError> {
    let json_text = extract_json_text(raw);
    let parsed: Value = serde_json::from_str(&json_text)
        .map_err(|err| GenerateError::InvalidPayload(err.to_string()))?;
    let Some(rows) = parsed.as_array() else {
        return Err(GenerateError::InvalidPayload(format!(
            "expected array, got {}",
            value_kind(&parsed)
        )));
    };

    let now = now_millis();
    let mut seen_content = HashSet::new();
    let mut seen_ids = HashSet::new();
    let items: Vec<CopyItem> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx, normalize_item(row, brief, idx, now)))
        .filter(|(_, item)| !item.content.is_empty())
        .filter(|(_, item)| seen_content.insert(item.content.clone()))
        .take(brief.result_count)
        // Model ids are not trusted to be unique.
        .map(|(idx, mut item)| {
            let mut bump = 0;
            while !seen_ids.insert(item.id.clone()) {
                item.id = synthetic_id(now + (idx + bump) as i64, idx);
                bump += 1;
            }
            item
        })
        .collect();

    if items.is_empty() {
        return Err(GenerateError::EmptyResult);
    }
    Ok(items)
}

fn synthetic_id(stamp: i64, idx: usize) -> String {
    format!("copy_{stamp}_{idx}")
}

fn normalize_item(row: &Value, brief: &Brief, idx: usize, now: i64) -> CopyItem {
    let empty = Map::new();
    let obj = row.as_object().unwrap_or(&empty);
    let created_at = now + idx as i64;

    CopyItem {
        id: non_blank_str(obj, "id")
            .map(str::to_string)
            .unwrap_or_else(|| synthetic_id(created_at, idx)),
        title: non_blank_str(obj, "title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}风格 {}", brief.platform, idx + 1)),
        content: sanitize_content(obj.get("content").and_then(Value::as_str).unwrap_or("")),
        hashtags: obj
            .get("hashtags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        platform: non_blank_str(obj, "platform")
            .and_then(Platform::from_label)
            .unwrap_or(brief.platform),
        tone: non_blank_str(obj, "tone")
            .and_then(Tone::from_label)
            .unwrap_or(brief.tone),
        favorite: obj.get("favorite").and_then(Value::as_bool).unwrap_or(false),
        created_at: obj
            .get("createdAt")
            .and_then(Value::as_i64)
            .unwrap_or(created_at),
    }
}

fn non_blank_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
