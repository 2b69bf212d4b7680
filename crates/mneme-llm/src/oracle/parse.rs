//! Lenient parsers for model replies.
//!
//! Models wrap JSON in code fences, add prose around it, or ignore the
//! requested format entirely. Each parser tries the strict reading first and
//! degrades step by step; `None` means nothing usable was found.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::{Sentiment, TextAnalysis, Tone};

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid regex"));

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").expect("valid regex"));

static META_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(?:here's|here is) a (?:summary|concise summary|brief summary)[:.]\s*",
        r"(?i)^#*\s*summary\s*:\s*",
        r"(?i)^the (?:text|conversation|passage|document) (?:is about|discusses|covers|describes)[:.]?\s*",
        r"(?i)^this (?:text|conversation|passage|document)[^.]*?(?:talks about|covers|discusses|describes)[:.]?\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static META_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)\s+in summary,.*$",
        r"(?is)\s+to summarize,.*$",
        r"(?is)\s+this summary captures.*$",
        r"(?is)\s+this is a concise summary.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Openers that signal the model narrated its plan instead of answering.
const REASONING_OPENERS: &[&str] = &[
    "I'll acknowledge",
    "Let me acknowledge",
    "I'll respond",
    "I should",
    "I'm going to",
    "I will now",
    "Let me provide",
    "I'll give",
    "I need to",
    "I notice that",
    "My response should",
];

/// Strip markdown code fences from model output.
pub fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();

    for fence in ["```json", "```"] {
        if let Some(rest) = s.strip_prefix(fence)
            && let Some(inner) = rest.trim_end().strip_suffix("```")
        {
            return inner.trim();
        }
    }

    s
}

/// Find the outermost `[...]` span in the text.
pub fn extract_json_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (end > start).then(|| &s[start..=end])
}

/// Find the outermost `{...}` span in the text.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Parse a list of strings: JSON array, then quoted strings, then a comma split.
///
/// An explicit empty JSON array is a valid empty list.
pub fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return None;
    }

    let as_json = serde_json::from_str::<Vec<String>>(cleaned).ok().or_else(|| {
        extract_json_array(cleaned).and_then(|a| serde_json::from_str::<Vec<String>>(a).ok())
    });
    if let Some(items) = as_json {
        return Some(tidy(items));
    }

    let quoted: Vec<String> = QUOTED
        .captures_iter(cleaned)
        .map(|c| c[1].to_string())
        .collect();
    if !quoted.is_empty() {
        return Some(tidy(quoted));
    }

    if cleaned.contains(',') {
        let items = cleaned
            .replace(['[', ']'], "")
            .split(',')
            .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .collect();
        let items = tidy(items);
        if !items.is_empty() {
            return Some(items);
        }
    }

    None
}

/// Parse a newline-separated list, dropping bullets and numbering.
pub fn parse_line_list(raw: &str) -> Vec<String> {
    strip_code_fences(raw)
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn tidy(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse ranking indices: JSON array, then integers inside the first
/// `[...]`. Numbers in free prose are not indices.
pub fn parse_index_list(raw: &str) -> Option<Vec<usize>> {
    let cleaned = strip_code_fences(raw);

    if let Some(array) = extract_json_array(cleaned)
        && let Ok(values) = serde_json::from_str::<Vec<i64>>(array)
    {
        let indices: Vec<usize> = values
            .into_iter()
            .filter_map(|v| usize::try_from(v).ok())
            .collect();
        if !indices.is_empty() {
            return Some(indices);
        }
    }

    let inner = BRACKETED.captures(cleaned)?.get(1)?.as_str();
    let indices: Vec<usize> = INTEGER
        .find_iter(inner)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    (!indices.is_empty()).then_some(indices)
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    sentiment: Option<String>,
}

/// Parse a `{keywords, themes, sentiment}` object.
pub fn parse_analysis(raw: &str) -> Option<TextAnalysis> {
    let cleaned = strip_code_fences(raw);
    let parsed = serde_json::from_str::<RawAnalysis>(cleaned).ok().or_else(|| {
        extract_json_object(cleaned).and_then(|o| serde_json::from_str::<RawAnalysis>(o).ok())
    })?;

    Some(TextAnalysis {
        keywords: tidy(parsed.keywords),
        themes: tidy(parsed.themes),
        sentiment: parsed
            .sentiment
            .as_deref()
            .map(Sentiment::parse)
            .unwrap_or_default(),
    })
}

/// Read a tone label: exact label first, then the first label word in the reply.
pub fn parse_tone(raw: &str) -> Tone {
    let cleaned = raw.trim().trim_matches(|c: char| !c.is_alphanumeric());
    if let Some(tone) = Tone::from_label(cleaned) {
        return tone;
    }
    cleaned
        .split(|c: char| !c.is_alphabetic())
        .find_map(Tone::from_label)
        .unwrap_or_default()
}

/// Remove labels and meta-commentary around a summary.
pub fn clean_summary(raw: &str) -> String {
    let mut s = strip_code_fences(raw).to_string();

    for pattern in META_PREFIXES.iter() {
        s = pattern.replace(&s, "").into_owned();
    }
    for pattern in META_SUFFIXES.iter() {
        s = pattern.replace(&s, "").into_owned();
    }

    s.trim().to_string()
}

/// Drop a narrated preamble ("I'll respond by...") from a generated reply.
///
/// Prefers quoted text when the reply wraps its answer in quotes; otherwise
/// skips the first sentence if enough remains afterwards.
pub fn strip_reasoning_preamble(raw: &str) -> String {
    let reply = raw.trim();
    if !REASONING_OPENERS.iter().any(|p| reply.starts_with(p)) {
        return reply.to_string();
    }

    if let (Some(start), Some(end)) = (reply.find('"'), reply.rfind('"'))
        && end > start
    {
        let quoted = reply[start + 1..end].trim();
        if !quoted.is_empty() {
            return quoted.to_string();
        }
    }

    for separator in [". ", "! ", "? "] {
        if let Some(pos) = reply.find(separator) {
            let rest = reply[pos + separator.len()..].trim();
            if rest.chars().count() > 20 {
                return rest.to_string();
            }
        }
    }

    reply.to_string()
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
