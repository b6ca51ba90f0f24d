use crate::timeline::{Caption, Interval};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

pub const MAX_CAPTION_CHARS: usize = 15;
const DEFAULT_TRANSCRIPT_SECS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Packs words into lines of at most `max_chars`; a line is closed early
/// once it reaches half the limit and more words remain.
pub fn split_words_by_size<S: AsRef<str>>(words: &[S], max_chars: usize) -> Vec<Vec<usize>> {
    let width = |i: usize| words[i].as_ref().chars().count();
    let mut groups = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let mut group = vec![i];
        let mut len = width(i);
        i += 1;
        while i < words.len() && len + 1 + width(i) <= max_chars {
            len += 1 + width(i);
            group.push(i);
            i += 1;
            // Half of an odd limit is fractional, so compare doubled lengths.
            if 2 * len >= max_chars && i < words.len() {
                break;
            }
        }
        groups.push(group);
    }
    groups
}

fn clean_regex() -> Result<&'static Regex> {
    static CLEAN_RE: OnceCell<Regex> = OnceCell::new();
    CLEAN_RE.get_or_try_init(|| {
        Regex::new(r#"[^\w\s\-_"']"#).context("failed to compile caption clean regex")
    })
}

pub fn clean_caption(text: &str) -> Result<String> {
    Ok(clean_regex()?.replace_all(text, "").trim().to_string())
}

/// Builds captions from word-level timings. Each caption starts where the
/// previous one ended and ends with its last word.
pub fn captions_from_words(words: &[TimedWord], max_chars: usize) -> Result<Vec<Caption>> {
    let tokens: Vec<&str> = words.iter().map(|w| w.word.trim()).collect();
    let mut captions = Vec::new();
    let mut start = 0.0;
    for group in split_words_by_size(&tokens, max_chars) {
        let Some(&last) = group.last() else {
            continue;
        };
        let line = group.iter().map(|&i| tokens[i]).collect::<Vec<_>>().join(" ");
        let text = clean_caption(&line)?;
        if text.is_empty() {
            continue;
        }
        let end = words[last].end.max(start);
        captions.push(Caption {
            interval: Interval::new(start, end),
            text,
        });
        start = end;
    }
    Ok(captions)
}

/// Spreads the transcript evenly over `total_secs` when no word timings exist.
pub fn estimate_captions(text: &str, total_secs: Option<f64>, max_chars: usize) -> Result<Vec<Caption>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let groups = split_words_by_size(&tokens, max_chars);
    if groups.is_empty() {
        return Ok(Vec::new());
    }
    let total = total_secs
        .filter(|t| *t > 0.0)
        .unwrap_or(DEFAULT_TRANSCRIPT_SECS);
    let per = total / groups.len() as f64;

    let mut captions = Vec::new();
    for (idx, group) in groups.iter().enumerate() {
        let line = group.iter().map(|&i| tokens[i]).collect::<Vec<_>>().join(" ");
        let text = clean_caption(&line)?;
        if text.is_empty() {
            continue;
        }
        captions.push(Caption {
            interval: Interval::new(idx as f64 * per, (idx + 1) as f64 * per),
            text,
        });
    }
    Ok(captions)
}
