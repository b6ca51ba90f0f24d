//! Turning model output into timed footage queries.

use crate::timeline::{self, Caption, Interval, TimedQuery};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

const COVERAGE_TOLERANCE_SECS: f64 = 2.0;
const FALLBACK_SEGMENT_SECS: f64 = 3.0;
const FALLBACK_MAX_WORDS: usize = 10;
const GENERIC_TERMS: [&str; 3] = ["nature scene", "landscape view", "abstract background"];

fn fence_regex() -> Option<&'static Regex> {
    static FENCE_RE: OnceCell<Regex> = OnceCell::new();
    FENCE_RE
        .get_or_try_init(|| Regex::new(r"(?m)^```(?:json)?\s*|\s*```$"))
        .ok()
}

fn adjacent_array_regex() -> Option<&'static Regex> {
    static ADJ_RE: OnceCell<Regex> = OnceCell::new();
    ADJ_RE.get_or_try_init(|| Regex::new(r"\]\s*\[")).ok()
}

fn trailing_comma_regex() -> Option<&'static Regex> {
    static TRAIL_RE: OnceCell<Regex> = OnceCell::new();
    TRAIL_RE.get_or_try_init(|| Regex::new(r",\s*([\]}])")).ok()
}

fn script_word_regex() -> Option<&'static Regex> {
    static WORD_RE: OnceCell<Regex> = OnceCell::new();
    WORD_RE
        .get_or_try_init(|| Regex::new(r"\b[A-Z][a-z]+\b|\b[a-z]{4,}\b"))
        .ok()
}

pub(crate) fn strip_code_fences(content: &str) -> String {
    match fence_regex() {
        Some(re) => re.replace_all(content, "").trim().to_string(),
        None => content.trim().to_string(),
    }
}

/// Narrows mixed model output down to its outermost `[...]`.
pub fn extract_json_array(content: &str) -> String {
    let content = strip_code_fences(content);
    match (content.find('['), content.rfind(']')) {
        (Some(start), Some(end)) if end > start => content[start..=end].to_string(),
        _ => content,
    }
}

/// Repairs the usual formatting slips: typographic or single quotes,
/// missing commas between arrays, trailing commas.
pub fn repair_json(content: &str) -> String {
    let mut text = content
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\'', "\"");
    if let Some(re) = adjacent_array_regex() {
        text = re.replace_all(&text, "],[").into_owned();
    }
    if let Some(re) = trailing_comma_regex() {
        text = re.replace_all(&text, "$1").into_owned();
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn as_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keeps only well-formed `[[start, end], [keyword, ...]]` items.
pub fn validate_queries(items: &[Value]) -> Vec<TimedQuery> {
    let mut out = Vec::new();
    for item in items {
        let Some([span, keywords]) = item.as_array().map(Vec::as_slice).and_then(|s| <&[Value; 2]>::try_from(s).ok())
        else {
            continue;
        };
        let Some([start, end]) = span.as_array().map(Vec::as_slice).and_then(|s| <&[Value; 2]>::try_from(s).ok())
        else {
            continue;
        };
        let (Some(start), Some(end)) = (as_seconds(start), as_seconds(end)) else {
            continue;
        };
        let Some(keywords) = keywords.as_array() else {
            continue;
        };
        let keywords: Vec<String> = keywords
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if keywords.is_empty() {
            continue;
        }
        out.push(TimedQuery {
            interval: Interval::new(start, end),
            keywords,
        });
    }
    out
}

/// Tries progressively more forgiving readings of `raw` and accepts the
/// first one whose last interval ends within tolerance of `expected_end`.
pub fn parse_timed_queries(raw: &str, expected_end: f64) -> Option<Vec<TimedQuery>> {
    let candidates = [
        raw.to_string(),
        extract_json_array(raw),
        repair_json(raw),
        repair_json(&extract_json_array(raw)),
        raw.replace('\'', "\""),
    ];

    for (idx, candidate) in candidates.iter().enumerate() {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        let queries = validate_queries(&items);
        let Some(last) = queries.last() else {
            continue;
        };
        if (last.interval.end - expected_end).abs() <= COVERAGE_TOLERANCE_SECS {
            tracing::debug!(strategy = idx + 1, segments = queries.len(), "parsed search queries");
            return Some(queries);
        }
        tracing::debug!(
            strategy = idx + 1,
            last_end = last.interval.end,
            expected_end,
            "search queries do not cover the narration"
        );
    }
    None
}

fn distinct_script_words(script: &str) -> Vec<String> {
    let Some(re) = script_word_regex() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    re.find_iter(script)
        .map(|m| m.as_str().to_string())
        .filter(|w| seen.insert(w.clone()))
        .take(FALLBACK_MAX_WORDS)
        .collect()
}

/// Queries built without the model: fixed-length slices keyed by words
/// lifted from the script, padded with generic scenery.
pub fn fallback_queries(script: &str, captions: &[Caption]) -> Vec<TimedQuery> {
    let Some(total) = timeline::end_of(captions).filter(|t| *t > 0.0) else {
        return vec![
            TimedQuery {
                interval: Interval::new(0.0, 10.0),
                keywords: GENERIC_TERMS.iter().map(|s| s.to_string()).collect(),
            },
            TimedQuery {
                interval: Interval::new(10.0, 20.0),
                keywords: vec!["city view".into(), "modern building".into(), "urban scene".into()],
            },
            TimedQuery {
                interval: Interval::new(20.0, 30.0),
                keywords: vec!["sky view".into(), "clouds".into(), "peaceful scene".into()],
            },
        ];
    };

    let words = distinct_script_words(script);
    let mut next_word = words.into_iter();
    let mut out = Vec::new();
    let mut current = 0.0;
    while current < total {
        let end = (current + FALLBACK_SEGMENT_SECS).min(total);
        let keywords = (0..GENERIC_TERMS.len())
            .map(|i| next_word.next().unwrap_or_else(|| GENERIC_TERMS[i].to_string()))
            .collect();
        out.push(TimedQuery {
            interval: Interval::new(current, end),
            keywords,
        });
        current = end;
    }
    out
}

/// Renders captions the way the query prompt expects them.
pub fn describe_captions(captions: &[Caption]) -> String {
    captions
        .iter()
        .map(|c| format!("(({}, {}), '{}')", c.interval.start, c.interval.end, c.text))
        .collect()
}
