use anyhow::{Context, Result};
use std::env;
use thiserror::Error;

/// Errors raised by the chunker
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// The window would never advance, or has no size at all
    #[error(
        "invalid chunk configuration: window_size {window_size} must be greater than overlap {overlap}"
    )]
    InvalidConfig { window_size: usize, overlap: usize },
}

/// A contiguous piece of a contract together with its position in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Ordinal position of this chunk within its document
    pub position: usize,
}

/// Window and overlap sizes, in characters, used to split a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    window_size: usize,
    overlap: usize,
}

impl ChunkConfig {
    /// Storage-level granularity used when contracts are indexed
    pub const STORAGE: ChunkConfig = ChunkConfig {
        window_size: 3000,
        overlap: 500,
    };

    /// Create a configuration, rejecting windows that cannot advance
    pub fn new(window_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if window_size == 0 || overlap >= window_size {
            return Err(ChunkError::InvalidConfig {
                window_size,
                overlap,
            });
        }

        Ok(ChunkConfig {
            window_size,
            overlap,
        })
    }

    /// Read `RAG_CHUNK_SIZE` and `RAG_CHUNK_OVERLAP`, falling back to the storage preset
    pub fn from_env() -> Result<Self> {
        let window_size = read_usize("RAG_CHUNK_SIZE", Self::STORAGE.window_size)?;
        let overlap = read_usize("RAG_CHUNK_OVERLAP", Self::STORAGE.overlap)?;

        Ok(ChunkConfig::new(window_size, overlap)?)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of two consecutive chunks
    pub fn step(&self) -> usize {
        self.window_size - self.overlap
    }

    /// Split text into overlapping windows.
    ///
    /// Windows are counted in characters, so a multi-byte character is never cut.
    /// The last chunk may be shorter than the window. Empty text yields a single
    /// empty chunk.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![String::new()];
        }

        // Byte offset of every char, plus the end of the string
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(char_count / self.step() + 1);
        let mut start = 0;
        while start < char_count {
            let end = (start + self.window_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            start += self.step();
        }

        chunks
    }

    /// Split text and tag every chunk with its position
    pub fn chunk_document(&self, text: &str) -> Vec<TextChunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| TextChunk { text, position })
            .collect()
    }
}

/// Split text into windows of `window_size` characters that overlap by `overlap`
pub fn chunk_text(text: &str, window_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    Ok(ChunkConfig::new(window_size, overlap)?.split(text))
}

fn read_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Rebuild the original text by taking `step` chars from every chunk but the last
    fn reassemble(chunks: &[String], config: ChunkConfig) -> String {
        let mut text = String::new();
        let last = chunks.len().saturating_sub(1);
        for (idx, chunk) in chunks.iter().enumerate() {
            if idx == last {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().take(config.step()));
            }
        }
        text
    }

    #[test]
    fn test_chunk_text_small_window() {
        let chunks = chunk_text("ABCDEFGHIJ", 4, 2).unwrap();
        assert_eq!(chunks, vec!["ABCD", "CDEF", "EFGH", "GHIJ", "IJ"]);

        for pair in chunks.windows(2) {
            assert_eq!(&pair[0][2..], &pair[1][..2]);
        }
    }

    #[test]
    fn test_empty_text_yields_single_empty_chunk() {
        assert_eq!(chunk_text("", 4, 2).unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_text_shorter_than_window() {
        assert_eq!(chunk_text("short", 3000, 500).unwrap(), vec!["short"]);
    }

    #[test]
    fn test_zero_overlap_partitions_text() {
        let chunks = chunk_text("abcdefg", 3, 0).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_rejects_non_advancing_window() {
        assert_eq!(
            chunk_text("abc", 4, 4),
            Err(ChunkError::InvalidConfig {
                window_size: 4,
                overlap: 4
            })
        );
        assert!(chunk_text("abc", 2, 5).is_err());
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_invalid_config_message_names_both_sizes() {
        let err = ChunkConfig::new(10, 12).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("10"));
        assert!(message.contains("12"));
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let text = "Vertrag über Lieferung – §1 Größe";
        let chunks = chunk_text(text, 5, 1).unwrap();
        let config = ChunkConfig::new(5, 1).unwrap();
        assert_eq!(reassemble(&chunks, config), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }

    #[test]
    fn test_chunk_document_positions() {
        let chunks = ChunkConfig::new(4, 2).unwrap().chunk_document("ABCDEFGHIJ");
        let positions: Vec<usize> = chunks.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
        assert_eq!(chunks[1].text, "CDEF");
    }

    #[test]
    fn test_storage_preset_is_valid() {
        let config = ChunkConfig::new(3000, 500).unwrap();
        assert_eq!(config, ChunkConfig::STORAGE);
        assert_eq!(config.step(), 2500);
    }

    #[test]
    fn test_env_values() {
        assert_eq!(read_usize("CONTRACT_RAG_TEST_UNSET_SIZE", 3000).unwrap(), 3000);

        env::set_var("CONTRACT_RAG_TEST_BAD_SIZE", "lots");
        let err = read_usize("CONTRACT_RAG_TEST_BAD_SIZE", 3000).unwrap_err();
        assert!(err.to_string().contains("CONTRACT_RAG_TEST_BAD_SIZE"));

        env::set_var("CONTRACT_RAG_TEST_GOOD_SIZE", " 1200 ");
        assert_eq!(read_usize("CONTRACT_RAG_TEST_GOOD_SIZE", 3000).unwrap(), 1200);
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_text(text in "\\PC{0,300}", window in 1usize..40, overlap_seed in 0usize..40) {
            let overlap = overlap_seed % window;
            let config = ChunkConfig::new(window, overlap).unwrap();
            let chunks = config.split(&text);
            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(reassemble(&chunks, config), text);
        }

        #[test]
        fn prop_full_chunks_overlap_their_follower(text in "[a-z ]{0,300}", window in 1usize..40, overlap_seed in 0usize..40) {
            let overlap = overlap_seed % window;
            let chunks = chunk_text(&text, window, overlap).unwrap();
            for pair in chunks.windows(2) {
                if pair[0].chars().count() == window {
                    let tail: String = pair[0].chars().skip(window - overlap).collect();
                    let head: String = pair[1].chars().take(overlap).collect();
                    prop_assert_eq!(tail, head);
                }
            }
        }

        #[test]
        fn prop_chunking_is_deterministic(text in "\\PC{0,200}", window in 1usize..20) {
            prop_assert_eq!(chunk_text(&text, window, 0).unwrap(), chunk_text(&text, window, 0).unwrap());
        }
    }
}
