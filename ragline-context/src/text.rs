//! This module splits raw document text into overlapping windows ("chunks")
//! that serve as the unit of embedding and retrieval in a RAG (Retrieval
//! Augmented Generation) pipeline.
//!
//! The module defines three main types:
//! - [`ChunkConfig`]: window size, overlap, tokenization unit and an optional
//!   cap on the number of chunks.
//! - [`Chunker`]: a validated configuration that turns text into chunks.
//! - [`Chunk`]: a single window of the source text with its ordinal id, its
//!   byte offsets in the source and its position in the token stream.
//!
//! # Windowing
//!
//! The text is first tokenized according to [`ChunkUnit`]:
//!
//! *   **Word**: whitespace-delimited words. Runs of whitespace (including
//!     leading and trailing whitespace) never produce empty tokens.
//! *   **Char**: individual Unicode scalar values.
//!
//! Windows of `size` tokens are then produced, advancing the window start by
//! `size - overlap` tokens each step. The window that reaches the end of the
//! token stream is the last one and may be shorter than `size`.
//!
//! # Reassembly
//!
//! Word windows are rejoined with single spaces, char windows are
//! concatenated with no separator. Indexes built by other tools with the same
//! policy can therefore be queried with chunks produced here.
//!
//! # Usage
//!
//! ```
//! use ragline_context::text::{ChunkConfig, ChunkUnit, Chunker};
//!
//! let chunker = Chunker::new(ChunkConfig::new(5, 2, ChunkUnit::Word)).unwrap();
//! let chunks = chunker.chunk("the quick brown fox jumps over the lazy dog and runs fast");
//!
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(
//!     texts,
//!     vec![
//!         "the quick brown fox jumps",
//!         "fox jumps over the lazy",
//!         "the lazy dog and runs",
//!         "and runs fast",
//!     ]
//! );
//! assert_eq!(chunks.last().unwrap().token_end, 12);
//! ```
use crate::error::{ChunkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Default window size, in tokens.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive windows, in tokens.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Unit used to tokenize text before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Whitespace-delimited words, rejoined with single spaces.
    #[default]
    Word,
    /// Unicode scalar values, concatenated without separator.
    Char,
}

impl ChunkUnit {
    /// Separator placed between tokens when a window is reassembled.
    pub fn separator(&self) -> &'static str {
        match self {
            ChunkUnit::Word => " ",
            ChunkUnit::Char => "",
        }
    }
}

impl fmt::Display for ChunkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkUnit::Word => write!(f, "word"),
            ChunkUnit::Char => write!(f, "char"),
        }
    }
}

impl FromStr for ChunkUnit {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "word" => Ok(ChunkUnit::Word),
            "char" => Ok(ChunkUnit::Char),
            other => Err(ChunkError::invalid_config(format!(
                "unknown chunk unit '{other}', expected 'word' or 'char'"
            ))),
        }
    }
}

/// Configuration for splitting text into windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Number of tokens per window. Must be greater than zero.
    pub size: usize,
    /// Number of tokens shared by consecutive windows. Must be smaller than `size`.
    pub overlap: usize,
    /// Tokenization unit.
    pub unit: ChunkUnit,
    /// Optional cap on the number of windows produced.
    pub max_chunks: Option<usize>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            unit: ChunkUnit::Word,
            max_chunks: None,
        }
    }
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize, unit: ChunkUnit) -> Self {
        Self {
            size,
            overlap,
            unit,
            max_chunks: None,
        }
    }

    /// Stop after `max_chunks` whole windows (builder style)
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    /// Check that the window advances on every step.
    ///
    /// # Errors
    /// [`ChunkError::InvalidConfiguration`] when `size` is zero or when
    /// `overlap >= size`.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ChunkError::invalid_config(
                "chunk size must be greater than zero",
            ));
        }
        if self.overlap >= self.size {
            return Err(ChunkError::invalid_config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    /// Number of tokens the window start advances per step.
    pub fn stride(&self) -> usize {
        self.size.saturating_sub(self.overlap)
    }
}

/// A window of source text, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal position of the chunk (0-indexed).
    pub id: usize,
    /// Reassembled window text.
    pub text: String,
    /// Byte offset of the first token of the window in the source text.
    pub source_offset_start: usize,
    /// Byte offset just past the last token of the window in the source text.
    pub source_offset_end: usize,
    /// Index of the first token of the window.
    pub token_start: usize,
    /// Index just past the last token of the window.
    pub token_end: usize,
}

impl Chunk {
    /// Number of tokens in this window.
    pub fn token_len(&self) -> usize {
        self.token_end - self.token_start
    }
}

/// Splits text into overlapping windows according to a validated [`ChunkConfig`].
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    /// Creates a chunker, rejecting configurations that would never advance.
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_context::text::{ChunkConfig, ChunkUnit, Chunker};
    ///
    /// assert!(Chunker::new(ChunkConfig::new(10, 10, ChunkUnit::Word)).is_err());
    /// assert!(Chunker::new(ChunkConfig::new(0, 0, ChunkUnit::Char)).is_err());
    /// assert!(Chunker::new(ChunkConfig::new(10, 9, ChunkUnit::Char)).is_ok());
    /// ```
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Splits `text` into windows.
    ///
    /// Windows never start at or past the end of the token stream, and the
    /// window reaching the end of the stream is the last one emitted. For a
    /// token count `L > overlap` this yields exactly
    /// `ceil((L - overlap) / (size - overlap))` chunks; shorter non-empty
    /// inputs yield a single chunk and empty input yields none.
    ///
    /// When `max_chunks` is set the chunker stops after that many whole
    /// windows; no window is ever cut short.
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_context::text::{ChunkConfig, ChunkUnit, Chunker};
    ///
    /// let chunker = Chunker::new(ChunkConfig::new(4, 1, ChunkUnit::Char)).unwrap();
    /// let chunks = chunker.chunk("abcdefghij");
    ///
    /// let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    /// assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    /// assert_eq!(chunks[1].source_offset_start, 3);
    /// assert_eq!(chunks[1].source_offset_end, 7);
    /// ```
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let spans = tokenize(text, self.config.unit);
        let total = spans.len();
        let stride = self.config.stride();

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut start = 0;

        while start < total {
            if let Some(cap) = self.config.max_chunks {
                if chunks.len() >= cap {
                    tracing::warn!(
                        "Chunk cap of {} reached at token {} of {}; remaining text is not chunked",
                        cap,
                        start,
                        total
                    );
                    break;
                }
            }

            let end = (start + self.config.size).min(total);
            let window = &spans[start..end];
            chunks.push(Chunk {
                id: chunks.len(),
                text: self.reassemble(text, window),
                source_offset_start: window[0].start,
                source_offset_end: window[window.len() - 1].end,
                token_start: start,
                token_end: end,
            });

            if end == total {
                break;
            }
            start += stride;
        }

        tracing::debug!(
            "Chunked {} {} tokens into {} chunks (size: {}, overlap: {})",
            total,
            self.config.unit,
            chunks.len(),
            self.config.size,
            self.config.overlap
        );

        chunks
    }

    fn reassemble(&self, text: &str, window: &[Range<usize>]) -> String {
        match self.config.unit {
            ChunkUnit::Word => window
                .iter()
                .map(|span| &text[span.clone()])
                .collect::<Vec<_>>()
                .join(self.config.unit.separator()),
            // Char spans are contiguous, so the slice is the concatenation.
            ChunkUnit::Char => text[window[0].start..window[window.len() - 1].end].to_string(),
        }
    }
}

/// Convenience wrapper: validate the parameters and chunk `text` in one call.
///
/// # Errors
/// [`ChunkError::InvalidConfiguration`] when `size == 0` or `overlap >= size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize, unit: ChunkUnit) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkConfig::new(size, overlap, unit))?.chunk(text))
}

/// Byte spans of the tokens of `text` for the given unit.
fn tokenize(text: &str, unit: ChunkUnit) -> Vec<Range<usize>> {
    match unit {
        ChunkUnit::Char => text
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect(),
        ChunkUnit::Word => {
            let mut spans = Vec::new();
            let mut word_start: Option<usize> = None;
            for (i, c) in text.char_indices() {
                match (c.is_whitespace(), word_start) {
                    (true, Some(start)) => {
                        spans.push(start..i);
                        word_start = None;
                    }
                    (false, None) => word_start = Some(i),
                    _ => {}
                }
            }
            if let Some(start) = word_start {
                spans.push(start..text.len());
            }
            spans
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const FOX: &str = "the quick brown fox jumps over the lazy dog and runs fast";

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        (len - overlap).div_ceil(size - overlap)
    }

    #[test]
    fn test_word_example_sentence() {
        let chunks = chunk_text(FOX, 5, 2, ChunkUnit::Word).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "the quick brown fox jumps",
                "fox jumps over the lazy",
                "the lazy dog and runs",
                "and runs fast",
            ]
        );
        let ids: Vec<usize> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(chunks[3].token_start, 9);
        assert_eq!(
            &FOX[chunks[3].source_offset_start..chunks[3].source_offset_end],
            "and runs fast"
        );
    }

    #[test]
    fn test_chunk_count_formula_words() {
        let words: Vec<String> = (0..37).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");

        for size in 1..12 {
            for overlap in 0..size {
                let chunks = chunk_text(&text, size, overlap, ChunkUnit::Word).unwrap();
                assert_eq!(
                    chunks.len(),
                    expected_count(words.len(), size, overlap),
                    "size={size} overlap={overlap}"
                );
                assert_eq!(chunks.last().unwrap().token_end, words.len());
            }
        }
    }

    #[test]
    fn test_chunk_count_formula_chars() {
        let text = "Ünïcödé text, with sömé multi-byte çhars!";
        let total = text.chars().count();

        for size in 1..9 {
            for overlap in 0..size {
                let chunks = chunk_text(text, size, overlap, ChunkUnit::Char).unwrap();
                assert_eq!(chunks.len(), expected_count(total, size, overlap));
                let last = chunks.last().unwrap();
                assert_eq!(last.token_end, total);
                assert_eq!(last.source_offset_end, text.len());
                for chunk in &chunks {
                    assert_eq!(
                        &text[chunk.source_offset_start..chunk.source_offset_end],
                        chunk.text
                    );
                }
            }
        }
    }

    #[test]
    fn test_offsets_are_monotonic() {
        let chunks = chunk_text(FOX, 4, 3, ChunkUnit::Word).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[0].source_offset_start <= pair[1].source_offset_start);
            assert!(pair[0].source_offset_end <= pair[1].source_offset_end);
            assert_eq!(pair[1].token_start - pair[0].token_start, 1);
        }
    }

    #[test]
    fn test_non_overlapping_words_reassemble_normalized() {
        let text = "  Lorem   ipsum\tdolor sit\namet,\n\n consectetur  adipiscing elit  ";
        let chunks = chunk_text(text, 3, 0, ChunkUnit::Word).unwrap();

        let reassembled = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(reassembled, normalized);
    }

    #[test]
    fn test_non_overlapping_chars_reassemble_exactly() {
        let text = "line one\nline two\n";
        let chunks = chunk_text(text, 4, 0, ChunkUnit::Char).unwrap();
        let reassembled: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(reassembled, text);
    }

    #[test]
    fn test_short_and_empty_input() {
        assert!(chunk_text("", 5, 2, ChunkUnit::Word).unwrap().is_empty());
        assert!(chunk_text("   \n\t ", 5, 2, ChunkUnit::Word).unwrap().is_empty());

        let chunks = chunk_text("hello", 5, 2, ChunkUnit::Word).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!(chunks[0].token_len(), 1);
    }

    #[test]
    fn test_invalid_configuration() {
        let err = chunk_text(FOX, 0, 0, ChunkUnit::Word).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfiguration { .. }));

        let err = chunk_text(FOX, 5, 5, ChunkUnit::Word).unwrap_err();
        assert!(err.to_string().contains("must be smaller than chunk size"));

        assert!(chunk_text(FOX, 5, 9, ChunkUnit::Char).is_err());
    }

    #[test]
    #[traced_test]
    fn test_max_chunks_stops_on_window_boundary() {
        let config = ChunkConfig::new(5, 2, ChunkUnit::Word).with_max_chunks(2);
        let chunks = Chunker::new(config).unwrap().chunk(FOX);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "fox jumps over the lazy");
        assert_eq!(chunks[1].token_len(), 5);
        assert!(logs_contain("Chunk cap of 2 reached"));
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("word".parse::<ChunkUnit>().unwrap(), ChunkUnit::Word);
        assert_eq!("CHAR".parse::<ChunkUnit>().unwrap(), ChunkUnit::Char);
        assert!("sentence".parse::<ChunkUnit>().is_err());
        assert_eq!(ChunkUnit::Char.to_string(), "char");
    }

    #[test]
    fn test_config_defaults() {
        let config = ChunkConfig::default();
        assert_eq!(config.size, 1000);
        assert_eq!(config.overlap, 100);
        assert_eq!(config.unit, ChunkUnit::Word);
        assert_eq!(config.stride(), 900);
        assert!(config.validate().is_ok());
    }
}
