//! Script generation: analysis report markdown to a speaker-tagged script
//!
//! The report is parsed block by block. Top-level headings and plain
//! paragraphs are read by the host; deeper headings and list items carry the
//! detail and go to the expert voice. Consecutive blocks with the same
//! speaker merge into one segment. Text normalization rules from config are
//! applied before segmentation so the synthesis provider pronounces
//! acronyms and symbols correctly.

pub mod segmenter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wavecast_common::config::ScriptConfig;

/// Speaker role for a script segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerRole {
    #[serde(rename = "HOST")]
    Host,
    #[serde(rename = "EXPERT")]
    Expert,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Host => "HOST",
            SpeakerRole::Expert => "EXPERT",
        }
    }
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a segment within the episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Intro,
    Main,
    Outro,
}

/// One contiguous piece of script attributed to a single speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub speaker: SpeakerRole,
    pub content: String,
    /// Words worth stressing during synthesis (acronyms, amounts)
    #[serde(default)]
    pub emphasis: Vec<String>,
}

/// Complete episode script: framing plus the ordered body segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastScript {
    pub title: String,
    pub date: String,
    pub category: String,
    pub intro: String,
    pub outro: String,
    pub segments: Vec<ScriptSegment>,
}

/// Build a complete script from an analysis report.
///
/// The intro and outro come from the configured templates with `{category}`
/// and `{date}` placeholders filled in.
pub fn build_script(
    report: &str,
    category: &str,
    config: &ScriptConfig,
    now: DateTime<Utc>,
) -> PodcastScript {
    let date = now.format("%Y-%m-%d").to_string();
    let display_date = now.format("%d %B %Y").to_string();

    let segments = parse_report(report, &config.text_normalization);

    PodcastScript {
        title: format!("{} {} - {}", config.title_prefix, display_date, category),
        date,
        category: category.to_string(),
        intro: fill_template(&config.intro_template, category, &display_date),
        outro: fill_template(&config.outro_template, category, &display_date),
        segments,
    }
}

fn fill_template(template: &str, category: &str, date: &str) -> String {
    template
        .replace("{category}", category)
        .replace("{date}", date)
}

/// Parse report markdown into speaker-attributed segments.
///
/// Consecutive lines with the same speaker merge; a speaker change flushes
/// the accumulated segment.
fn parse_report(report: &str, normalization: &BTreeMap<String, String>) -> Vec<ScriptSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_role = SpeakerRole::Host;

    for raw in report.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (role, text) = classify_line(line);
        let text = normalize_text(&text, normalization);
        if text.is_empty() {
            continue;
        }

        if role != current_role && !current.is_empty() {
            segments.push(make_segment(current_role, &current));
            current.clear();
        }
        current_role = role;
        current.push_str(&text);
        current.push(' ');
    }

    if !current.trim().is_empty() {
        segments.push(make_segment(current_role, &current));
    }

    segments
}

fn make_segment(speaker: SpeakerRole, content: &str) -> ScriptSegment {
    let content = content.trim().to_string();
    let emphasis = extract_emphasis_words(&content);
    ScriptSegment {
        speaker,
        content,
        emphasis,
    }
}

/// Map a markdown line to its speaker and strip the markup.
///
/// Section headings (one or two `#`) and plain paragraphs are host
/// narration; deeper headings and list items are expert detail.
fn classify_line(line: &str) -> (SpeakerRole, String) {
    if let Some(rest) = line.strip_prefix('#') {
        let depth = 1 + rest.chars().take_while(|c| *c == '#').count();
        let text = line.trim_start_matches('#').trim();
        let role = if depth <= 2 {
            SpeakerRole::Host
        } else {
            SpeakerRole::Expert
        };
        return (role, strip_inline_markup(text));
    }

    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return (SpeakerRole::Expert, strip_inline_markup(rest.trim()));
    }

    (SpeakerRole::Host, strip_inline_markup(line))
}

fn strip_inline_markup(text: &str) -> String {
    text.replace("**", "").replace('`', "")
}

/// Apply pronunciation normalization rules with word-boundary,
/// case-insensitive matching.
pub fn normalize_text(text: &str, rules: &BTreeMap<String, String>) -> String {
    let mut result = text.to_string();
    for (original, normalized) in rules {
        result = replace_word(&result, original, normalized);
    }
    result
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn replace_word(text: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }

    let lower_text: Vec<char> = text.to_lowercase().chars().collect();
    let lower_needle: Vec<char> = needle.to_lowercase().chars().collect();
    let chars: Vec<char> = text.chars().collect();

    // Lowercasing can change char counts for some scripts; fall back to a
    // literal pass when the mapping is not 1:1.
    if lower_text.len() != chars.len() {
        return text.replace(needle, replacement);
    }

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let matches = i + lower_needle.len() <= lower_text.len()
            && lower_text[i..i + lower_needle.len()] == lower_needle[..]
            && (i == 0 || !is_word_char(chars[i - 1]))
            && (i + lower_needle.len() == chars.len()
                || !is_word_char(chars[i + lower_needle.len()]));

        if matches {
            out.push_str(replacement);
            i += lower_needle.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Pick words worth stressing: acronyms, dollar amounts, capitalized terms.
/// Deduplicated in first-seen order, capped at five.
fn extract_emphasis_words(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();

    for token in text.split(|c: char| !is_word_char(c) && c != '$') {
        if seen.len() >= 5 {
            break;
        }
        if token.is_empty() || seen.iter().any(|s| s == token) {
            continue;
        }
        if is_emphasis_token(token) {
            seen.push(token.to_string());
        }
    }

    seen
}

fn is_emphasis_token(token: &str) -> bool {
    // Acronyms: two or more uppercase letters
    let upper_count = token.chars().filter(|c| c.is_uppercase()).count();
    if upper_count >= 2 && token.chars().all(|c| c.is_uppercase() || c.is_numeric()) {
        return true;
    }

    // Dollar amounts like $10M or $500K
    if let Some(rest) = token.strip_prefix('$') {
        if !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_numeric() || c == 'M' || c == 'K')
        {
            return true;
        }
    }

    false
}
