//! Fixed-size overlapping text chunker

use std::collections::HashMap;

use medrag_core::{Chunk, ChunkingConfig, Document, Result};

/// Splits documents into character windows of `chunk_size` that overlap by
/// `chunk_overlap`. Lengths are counted in Unicode scalar values.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one text. Blank text yields no chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.config.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());

            if end >= chars.len() {
                break;
            }

            start = end - self.config.chunk_overlap;
        }

        chunks
    }

    /// Split documents in order. Chunk positions count up per source, so a
    /// multi-page PDF numbers its chunks across all of its pages.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut next_position: HashMap<&str, usize> = HashMap::new();
        let mut chunks = Vec::new();

        for document in documents {
            for content in self.split_text(&document.content) {
                let position = next_position.entry(document.source.as_str()).or_insert(0);
                chunks.push(Chunk {
                    content,
                    source: document.source.clone(),
                    position: *position,
                });
                *position += 1;
            }
        }

        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            config: ChunkingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlap_of(a: &str, b: &str, overlap: usize) -> bool {
        let tail: String = a.chars().skip(a.chars().count() - overlap).collect();
        let head: String = b.chars().take(overlap).collect();
        tail == head
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::default();
        let text = "Fever is a temperature above 38C.";
        assert_eq!(splitter.split_text(text), vec![text.to_string()]);

        let exact: String = "x".repeat(500);
        assert_eq!(splitter.split_text(&exact), vec![exact.clone()]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        let splitter = TextSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\t ").is_empty());
    }

    #[test]
    fn test_long_text_windows_overlap_exactly() {
        let splitter = TextSplitter::default();
        let text: String = (0..1337).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

        let chunks = splitter.split_text(&text);
        // Windows start at 0, 480, 960; the last one is 377 chars long.
        assert_eq!(chunks.len(), 3);
        assert!(chunks[..2].iter().all(|c| c.chars().count() == 500));
        assert_eq!(chunks[2].chars().count(), 377);

        for pair in chunks.windows(2) {
            assert!(overlap_of(&pair[0], &pair[1], 20));
        }
    }

    #[test]
    fn test_chunks_cover_the_input() {
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 3,
        })
        .unwrap();
        let text = "the quick brown fox jumps over the lazy dog";

        let chunks = splitter.split_text(text);
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(3));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_characters_count_as_one() {
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: 4,
            chunk_overlap: 1,
        })
        .unwrap();
        let chunks = splitter.split_text("température");
        assert_eq!(chunks, vec!["temp", "péra", "atur", "re"]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let splitter = TextSplitter::default();
        let text = "abc ".repeat(400);
        assert_eq!(splitter.split_text(&text), splitter.split_text(&text));
    }

    #[test]
    fn test_split_documents_preserves_source_and_positions() {
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size: 8,
            chunk_overlap: 2,
        })
        .unwrap();
        let documents = vec![
            Document::new("page one text", "data/a.pdf"),
            Document::new("short", "data/b.pdf"),
            Document::new("", "data/a.pdf"),
            Document::new("page two", "data/a.pdf"),
        ];

        let chunks = splitter.split_documents(&documents);
        let summary: Vec<(&str, usize, &str)> = chunks
            .iter()
            .map(|c| (c.source.as_str(), c.position, c.content.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("data/a.pdf", 0, "page one"),
                ("data/a.pdf", 1, "ne text"),
                ("data/b.pdf", 0, "short"),
                ("data/a.pdf", 2, "page two"),
            ]
        );
    }
}
