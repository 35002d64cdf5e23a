use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{Intent, RawExtraction};

/// Reads the single intent label the classification prompt asks for.
///
/// Anything non-empty that isn't a known label resolves to [`Intent::Other`]
/// so format drift never blocks a reply. Only an empty response is an error.
pub fn parse_intent(raw: &str) -> Result<Intent, AppError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(AppError::MalformedResponse(
            "empty intent response".to_string(),
        ));
    }

    if let Some(intent) = Intent::from_label(cleaned) {
        return Ok(intent);
    }

    // Older prompt shape: {"intent": "add_event", "confidence": 0.9}
    if let Some(Value::Object(map)) = find_json_object(cleaned) {
        if let Some(label) = map.get("intent").and_then(Value::as_str) {
            return Ok(Intent::from_label(label).unwrap_or(Intent::Other));
        }
    }

    // "Intent: add_event" or a label on its own first line
    let first_line = cleaned.lines().next().unwrap_or(cleaned);
    let candidates = [
        first_line.rsplit(':').next().unwrap_or(first_line),
        first_line,
    ];
    for candidate in candidates {
        if let Some(intent) = Intent::from_label(candidate) {
            return Ok(intent);
        }
    }

    tracing::warn!(response = %cleaned, "unrecognized intent label, treating as other");
    Ok(Intent::Other)
}

/// Reads the extraction JSON object, tolerating code fences, surrounding
/// prose, and the older `summary`/`start_time`/`end_time` key names.
pub fn parse_extraction(raw: &str) -> Result<RawExtraction, AppError> {
    let cleaned = strip_code_fences(raw);
    let map = match find_json_object(cleaned) {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(AppError::MalformedResponse(format!(
                "no JSON object in extraction response: {}",
                truncate(cleaned, 120)
            )))
        }
    };

    Ok(RawExtraction {
        title: text_field(&map, &["title", "summary", "event"]),
        date_expression: text_field(&map, &["date_expression", "date", "start_time", "start"]),
        time_expression: text_field(&map, &["time_expression", "time"]),
        end_time_expression: text_field(&map, &["end_time_expression", "end_time", "end"]),
        location: text_field(&map, &["location", "place", "venue"]),
        description: text_field(&map, &["description", "details", "notes"]),
        confidence: number_field(&map, "confidence"),
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    // Skip the fence and its language tag up to the end of that line.
    let after_open = &trimmed[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

fn find_json_object(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) => {
            let s = s.trim();
            let placeholder = s.is_empty()
                || s.eq_ignore_ascii_case("null")
                || s.eq_ignore_ascii_case("none")
                || s.eq_ignore_ascii_case("n/a");
            (!placeholder).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
