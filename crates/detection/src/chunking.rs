//! Overlapping text chunking for the NER escalation tier (§4.B "tiered
//! chunking"). Splits large extracted text into bounded, whitespace-aligned
//! chunks so a crashed pipeline invocation can resume by `(file_hash,
//! chunk_index)` without re-detecting already-processed chunks.

/// Target characters per chunk — roughly one tokenizer page for the NER
/// models this pipeline escalates to.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4_000;

/// Characters of overlap between consecutive chunks so entities straddling a
/// boundary are not missed by either chunk alone.
pub const DEFAULT_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    /// Character offset of this chunk's start in the original document.
    pub start: usize,
    pub end: usize,
    /// Position of this chunk within the document's chunk sequence; the
    /// restart key is `(file_hash, chunk_index)`.
    pub chunk_index: usize,
}

pub struct TextChunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl TextChunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Self {
        Self { max_chunk_size, overlap }
    }

    /// Splits `text` into chunks. Text at or under `max_chunk_size` is
    /// returned as a single chunk; longer text is split on whitespace
    /// boundaries where possible, with `overlap` characters shared between
    /// consecutive chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_chunk_size {
            return vec![TextChunk {
                text: text.to_string(),
                start: 0,
                end: chars.len(),
                chunk_index: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;

        while start < chars.len() {
            let mut end = (start + self.max_chunk_size).min(chars.len());

            if end < chars.len() {
                let search_from = start + self.max_chunk_size / 2;
                if let Some(break_at) = rfind_space(&chars, search_from, end) {
                    end = break_at + 1;
                }
            }

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                start,
                end,
                chunk_index,
            });
            chunk_index += 1;

            let step = if end - start > self.overlap { end - start - self.overlap } else { end - start };
            start += step.max(1);
        }

        chunks
    }
}

fn rfind_space(chars: &[char], from: usize, to: usize) -> Option<usize> {
    (from..to).rev().find(|&i| chars[i] == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_returns_a_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("hello world");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn empty_text_returns_no_chunks() {
        assert!(TextChunker::default().chunk("").is_empty());
    }

    #[test]
    fn long_text_is_split_with_overlap_and_sequential_indices() {
        let chunker = TextChunker::new(100, 20);
        let text = "word ".repeat(50);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
        assert!(chunks.windows(2).all(|w| w[1].start < w[0].end));
    }
}
