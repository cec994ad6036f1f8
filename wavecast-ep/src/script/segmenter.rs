//! Sentence-aware text segmentation for synthesis requests
//!
//! Synthesis providers cap request length, so script segments are packed
//! into chunks that never split a sentence. The tokenizer is tuned for the
//! French and English text the reports contain: honorifics, Latin
//! abbreviations, decimal numbers and ellipses do not end a sentence.

use crate::script::{PodcastScript, SegmentKind, SpeakerRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Abbreviations whose trailing period does not terminate a sentence.
/// Stored lowercase, including the period.
const ABBREVIATIONS: &[&str] = &[
    "m.", "mme.", "mlle.", "dr.", "mr.", "mrs.", "ms.", "prof.", "st.", "etc.", "cf.", "vs.",
    "approx.", "env.", "ex.", "e.g.", "i.e.", "p.ex.", "resp.", "min.", "max.", "no.",
];

/// Locale-aware sentence boundary detector for French and English
pub struct SentenceTokenizer {
    abbreviations: HashSet<&'static str>,
}

impl Default for SentenceTokenizer {
    fn default() -> Self {
        Self {
            abbreviations: ABBREVIATIONS.iter().copied().collect(),
        }
    }
}

impl SentenceTokenizer {
    /// Split text into sentences. Whitespace runs inside a sentence are
    /// preserved; leading and trailing whitespace of each sentence is not.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            current.push(c);

            if self.is_boundary(&chars, i, &current) {
                // Closing quotes and brackets stay with the sentence
                let mut j = i + 1;
                while j < chars.len() && is_closer(chars[j]) {
                    current.push(chars[j]);
                    j += 1;
                }

                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
                i = j;
                continue;
            }

            i += 1;
        }

        let rest = current.trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }

        sentences
    }

    fn is_boundary(&self, chars: &[char], i: usize, current: &str) -> bool {
        let c = chars[i];
        if c != '.' && c != '!' && c != '?' && c != '…' {
            return false;
        }

        // The terminator must close the text or be followed by whitespace
        // (possibly after closing quotes), otherwise it is inside a token
        // such as a URL or version number.
        let mut j = i + 1;
        while j < chars.len() && is_closer(chars[j]) {
            j += 1;
        }
        if j < chars.len() && !chars[j].is_whitespace() {
            return false;
        }

        if c == '!' || c == '?' || c == '…' {
            return true;
        }

        // Inside an ellipsis written as consecutive periods
        if i + 1 < chars.len() && chars[i + 1] == '.' {
            return false;
        }

        // Decimal number such as 3.5
        if i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_ascii_digit()
            && chars[i + 1].is_ascii_digit()
        {
            return false;
        }

        if self.ends_with_abbreviation(current) {
            return false;
        }

        // A period followed by a lowercase continuation is treated as an
        // unlisted abbreviation rather than a boundary.
        let mut k = i + 1;
        while k < chars.len() && (chars[k].is_whitespace() || is_closer(chars[k])) {
            k += 1;
        }
        if k < chars.len() && chars[k].is_lowercase() {
            return false;
        }

        true
    }

    fn ends_with_abbreviation(&self, current: &str) -> bool {
        let lower = current.to_lowercase();
        self.abbreviations.iter().any(|abbr| {
            if !lower.ends_with(abbr) {
                return false;
            }
            // Require a word boundary before the abbreviation
            let prefix_len = lower.len() - abbr.len();
            lower[..prefix_len]
                .chars()
                .next_back()
                .map(|p| !p.is_alphanumeric())
                .unwrap_or(true)
        })
    }
}

/// Characters that stay attached to the sentence they close
fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '»' | '”' | '’' | ')' | ']' | '}')
}

/// Pack sentences greedily into chunks of at most `max_chars` characters.
///
/// A sentence joins the current chunk when the chunk, the sentence and one
/// separating space still fit. A single sentence longer than the limit is
/// emitted alone, never truncated. Character counts are Unicode scalar
/// counts, not bytes.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    let tokenizer = SentenceTokenizer::default();
    let sentences = tokenizer.tokenize(text);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();
        if current_chars + sentence_chars + 1 <= max_chars {
            current.push_str(&sentence);
            current.push(' ');
            current_chars += sentence_chars + 1;
        } else {
            let finished = current.trim_end();
            if !finished.is_empty() {
                chunks.push(finished.to_string());
            }
            current_chars = sentence.chars().count() + 1;
            current = sentence;
            current.push(' ');
        }
    }

    let finished = current.trim_end();
    if !finished.is_empty() {
        chunks.push(finished.to_string());
    }

    chunks
}

/// One synthesis-ready chunk: at most `max_chars` characters, one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisChunk {
    /// Position in the final episode; clips are assembled in this order
    pub index: usize,
    /// Script segment this chunk came from: 0 is the intro, body segments
    /// follow in order, the outro is last
    pub source_segment_index: usize,
    /// Position of this chunk within its source segment
    pub chunk_index: usize,
    pub speaker: SpeakerRole,
    pub kind: SegmentKind,
    pub content: String,
    #[serde(default)]
    pub emphasis: Vec<String>,
}

/// Flatten a script into ordered synthesis chunks.
///
/// The intro and outro are framing lines sized to fit a single request and
/// pass through unsplit; body segments are packed sentence-aware.
pub fn chunk_script(script: &PodcastScript, max_chars: usize) -> Vec<SynthesisChunk> {
    let mut chunks = Vec::new();
    let mut index = 0;

    let mut push = |source_segment_index: usize,
                    chunk_index: usize,
                    speaker: SpeakerRole,
                    kind: SegmentKind,
                    content: String,
                    emphasis: Vec<String>| {
        chunks.push(SynthesisChunk {
            index,
            source_segment_index,
            chunk_index,
            speaker,
            kind,
            content,
            emphasis,
        });
        index += 1;
    };

    if !script.intro.trim().is_empty() {
        push(
            0,
            0,
            SpeakerRole::Host,
            SegmentKind::Intro,
            script.intro.trim().to_string(),
            Vec::new(),
        );
    }

    for (segment_index, body) in script.segments.iter().enumerate() {
        for (chunk_index, piece) in segment(&body.content, max_chars).into_iter().enumerate() {
            push(
                segment_index + 1,
                chunk_index,
                body.speaker,
                SegmentKind::Main,
                piece,
                body.emphasis.clone(),
            );
        }
    }

    if !script.outro.trim().is_empty() {
        push(
            script.segments.len() + 1,
            0,
            SpeakerRole::Host,
            SegmentKind::Outro,
            script.outro.trim().to_string(),
            Vec::new(),
        );
    }

    chunks
}
