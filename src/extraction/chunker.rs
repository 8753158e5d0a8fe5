//! Text Chunker
//!
//! Splits large documents into pieces that fit an LLM token budget.
//! Budgets are approximated at 4 characters per token.
//!
//! ## Splitting Order
//!
//! 1. Blank-line paragraph boundaries (LF or CRLF, whitespace-only lines count)
//! 2. Sentence boundaries (`. `, `! `, `? `) for oversized paragraphs
//! 3. Hard character split for a single oversized sentence

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::chunking;

/// A line break, an optional run of spaces or tabs, then another line break
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("valid regex"));

/// Estimate token count for text (4 chars per token, rounded up)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(chunking::CHARS_PER_TOKEN)
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    default_max_tokens: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(chunking::DEFAULT_MAX_TOKENS)
    }
}

impl TextChunker {
    /// Create a chunker; `0` selects the built-in default budget
    pub fn new(default_max_tokens: usize) -> Self {
        let default_max_tokens = if default_max_tokens == 0 {
            chunking::DEFAULT_MAX_TOKENS
        } else {
            default_max_tokens
        };
        Self { default_max_tokens }
    }

    pub fn default_max_tokens(&self) -> usize {
        self.default_max_tokens
    }

    /// Split `text` into chunks of at most `max_tokens * 4` characters.
    ///
    /// `max_tokens == 0` uses the instance default. Always returns at least
    /// one chunk; empty input yields a single empty string.
    pub fn chunk(&self, text: &str, max_tokens: usize) -> Vec<String> {
        let max_tokens = if max_tokens == 0 {
            self.default_max_tokens
        } else {
            max_tokens
        };
        let max_chars = max_tokens * chunking::CHARS_PER_TOKEN;

        let mut acc = Accumulator::new(max_chars);

        for paragraph in PARAGRAPH_BREAK.split(text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            if char_len(paragraph) <= max_chars {
                acc.push(paragraph, "\n\n");
                continue;
            }

            acc.flush();
            for sentence in split_sentences(paragraph) {
                if char_len(sentence) <= max_chars {
                    acc.push(sentence, " ");
                } else {
                    acc.flush();
                    for piece in hard_split(sentence, max_chars) {
                        acc.push(piece, "");
                        acc.flush();
                    }
                }
            }
        }

        let mut chunks = acc.finish();
        if chunks.is_empty() {
            chunks.push(String::new());
        }
        chunks
    }
}

// =============================================================================
// Internal
// =============================================================================

/// Running buffer that flushes whenever the next piece would overflow
struct Accumulator {
    max_chars: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Accumulator {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let piece_len = char_len(piece);
        let sep_len = if self.current.is_empty() {
            0
        } else {
            char_len(separator)
        };

        if !self.current.is_empty() && self.current_len + sep_len + piece_len > self.max_chars {
            self.flush();
        }

        if !self.current.is_empty() {
            self.current.push_str(separator);
            self.current_len += sep_len;
        }
        self.current.push_str(piece);
        self.current_len += piece_len;
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `. `, `! `, `? ` keeping the terminating punctuation
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(next_idx, ' ')) = chars.peek()
        {
            let sentence = paragraph[start..next_idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = next_idx + 1;
        }
    }

    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split at character boundaries into pieces of at most `max_chars`
fn hard_split(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
