use crate::error::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Fixed-size character windows that overlap by `overlap` characters.
///
/// Built through [`Chunker::new`], which rejects parameters that would never
/// advance the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if overlap >= size {
            return Err(RagError::Configuration(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Splits `text` into ordered windows. Dropping the first `overlap`
    /// characters of every chunk after the first and concatenating gives
    /// back `text`.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < len {
            let end = (start + self.size).min(len);
            chunks.push(chars[start..end].iter().collect());
            if end == len {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }
}

pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(Chunker::new(size, overlap)?.split(text))
}
