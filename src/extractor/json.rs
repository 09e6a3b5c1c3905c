//! Helpers for digging JSON payloads out of HTML pages

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

/// Return the balanced `{...}` object that follows the first occurrence of
/// `marker`. Braces inside string literals are ignored.
pub fn balanced_json_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    balanced_object(&text[start..])
}

/// Every balanced object that follows an occurrence of `marker`
pub fn all_balanced_json_after<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    text.match_indices(marker)
        .filter_map(|(idx, m)| balanced_object(&text[idx + m.len()..]))
        .collect()
}

fn balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    // Only whitespace, `=`, `(`, `,` and a leading string argument may sit
    // between the marker and the object.
    if text[..open].contains(';') || text[..open].contains('}') {
        return None;
    }
    let body = &text[open..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in body.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the JSON body of `<script id="...">`
pub fn script_json(html: &str, script_id: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!("script#{}", script_id)).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    serde_json::from_str(text.trim()).ok()
}

/// Decode the raw contents of a JSON string literal (`/`, `\/`, `\"`).
/// Malformed input is returned with the common URL escapes replaced.
pub fn decode_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| {
        raw.replace("\\u002F", "/")
            .replace("\\u0026", "&")
            .replace("\\/", "/")
    })
}

/// First capture group of the first pattern that matches, JSON-decoded
pub fn capture_json_string(text: &str, patterns: &[&Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| decode_json_string(m.as_str()))
}

/// Truncate to `max` characters, appending "..." when anything was cut
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}

/// Video reference found somewhere inside a JSON tree
#[derive(Debug, Clone, PartialEq)]
pub struct JsonVideoHit {
    pub video_url: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_secs: Option<f64>,
}

const VIDEO_KEYS: &[&str] = &["video_url", "videoUrl", "src", "contentUrl"];

/// Depth-first search for the first object holding a video URL
pub fn find_video_object(value: &Value) -> Option<JsonVideoHit> {
    match value {
        Value::Object(map) => {
            for key in VIDEO_KEYS {
                if let Some(Value::String(candidate)) = map.get(*key) {
                    if candidate.contains(".mp4") || candidate.contains("video") {
                        let string_field = |names: &[&str]| {
                            names
                                .iter()
                                .find_map(|n| map.get(*n).and_then(Value::as_str))
                                .map(str::to_string)
                        };
                        return Some(JsonVideoHit {
                            video_url: candidate.clone(),
                            title: string_field(&["caption", "title"]),
                            thumbnail: string_field(&["display_url", "thumbnail"]),
                            duration_secs: map.get("video_duration").and_then(Value::as_f64),
                        });
                    }
                }
            }
            map.values().find_map(find_video_object)
        }
        Value::Array(items) => items.iter().find_map(find_video_object),
        _ => None,
    }
}

/// Walk a path of object keys
pub fn pointer<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Read a number that platforms sometimes encode as a string
pub fn loose_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn loose_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_balanced_json_simple() {
        let html = r#"var ytInitialPlayerResponse = {"test":"value"};</script>"#;
        assert_eq!(
            balanced_json_after(html, "ytInitialPlayerResponse"),
            Some(r#"{"test":"value"}"#)
        );
    }

    #[test]
    fn test_balanced_json_ignores_braces_in_strings() {
        let html = r#"x = {"a":"}{","b":{"c":"He said \"}\""}}; more"#;
        assert_eq!(
            balanced_json_after(html, "x ="),
            Some(r#"{"a":"}{","b":{"c":"He said \"}\""}}"#)
        );
    }

    #[test]
    fn test_balanced_json_handles_multibyte() {
        let html = r#"data = {"title":"café ☕"};"#;
        assert_eq!(balanced_json_after(html, "data ="), Some(r#"{"title":"café ☕"}"#));
    }

    #[test]
    fn test_balanced_json_unterminated() {
        assert_eq!(balanced_json_after(r#"x = {"a": {"b": 1}"#, "x ="), None);
        assert_eq!(balanced_json_after("nothing here", "x ="), None);
    }

    #[test]
    fn test_marker_without_object_does_not_jump_ahead() {
        let html = r#"window._sharedData = null; other = {"a":1};"#;
        assert_eq!(balanced_json_after(html, "window._sharedData"), None);
    }

    #[test]
    fn test_all_balanced_after_function_call() {
        let html = r#"window.__additionalDataLoaded('/p/x/',{"a":1});window.__additionalDataLoaded('/p/y/',{"b":2});"#;
        let found = all_balanced_json_after(html, "window.__additionalDataLoaded(");
        assert_eq!(found, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_script_json() {
        let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">{"props":{"x":1}}</script></body></html>"#;
        let value = script_json(html, "__NEXT_DATA__").unwrap();
        assert_eq!(value["props"]["x"], 1);
        assert!(script_json(html, "SIGI_STATE").is_none());
    }

    #[test]
    fn test_decode_json_string() {
        assert_eq!(
            decode_json_string(r"https://v16.tiktokcdn.com/a.mp4?x=1&y=2"),
            "https://v16.tiktokcdn.com/a.mp4?x=1&y=2"
        );
        assert_eq!(decode_json_string(r"https:\/\/a.b\/c"), "https://a.b/c");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
    }

    #[test]
    fn test_find_video_object_nested() {
        let value = json!({
            "entry_data": {
                "PostPage": [{
                    "graphql": {
                        "shortcode_media": {
                            "display_url": "https://cdn.example/thumb.jpg",
                            "video_url": "https://cdn.example/clip.mp4",
                            "video_duration": 12.5,
                            "title": "A reel"
                        }
                    }
                }]
            }
        });
        let hit = find_video_object(&value).unwrap();
        assert_eq!(hit.video_url, "https://cdn.example/clip.mp4");
        assert_eq!(hit.thumbnail.as_deref(), Some("https://cdn.example/thumb.jpg"));
        assert_eq!(hit.duration_secs, Some(12.5));
        assert_eq!(hit.title.as_deref(), Some("A reel"));
    }

    #[test]
    fn test_find_video_object_skips_non_video_src() {
        let value = json!({"src": "https://cdn.example/logo.png", "child": {"videoUrl": "https://cdn.example/v.mp4"}});
        assert_eq!(find_video_object(&value).unwrap().video_url, "https://cdn.example/v.mp4");
    }

    #[test]
    fn test_loose_numbers() {
        let value = json!({"a": "212", "b": 15, "c": 1.5});
        assert_eq!(loose_u64(value.get("a")), Some(212));
        assert_eq!(loose_u64(value.get("b")), Some(15));
        assert_eq!(loose_f64(value.get("c")), Some(1.5));
        assert_eq!(loose_u64(value.get("missing")), None);
    }

    #[test]
    fn test_pointer() {
        let value = json!({"a": {"b": {"c": 3}}});
        assert_eq!(pointer(&value, &["a", "b", "c"]), Some(&json!(3)));
        assert_eq!(pointer(&value, &["a", "x"]), None);
    }
}
