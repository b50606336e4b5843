//! Pull-request diff loading.

use std::io::Read;

use crate::config::DiffSource;
use crate::error::{MirrorError, Result};

/// Diff text bounded to the oracle's input budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlob {
    text: String,
    original_chars: usize,
    original_bytes: usize,
}

impl DiffBlob {
    /// Bound `text` to at most `limit` characters.
    ///
    /// Text within the limit is kept byte-for-byte. Longer text is cut at
    /// exactly `limit` characters (never inside a UTF-8 sequence).
    pub fn new(mut text: String, limit: usize) -> Self {
        let original_chars = text.chars().count();
        let original_bytes = text.len();
        let cut = text.char_indices().nth(limit).map(|(idx, _)| idx);
        if let Some(cut) = cut {
            text.truncate(cut);
        }
        DiffBlob {
            text,
            original_chars,
            original_bytes,
        }
    }

    /// Load the diff from its configured source.
    pub fn load(source: &DiffSource, limit: usize) -> Result<Self> {
        let text = match source {
            DiffSource::Inline(text) => text.clone(),
            DiffSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| MirrorError::DiffRead {
                    source_name: path.display().to_string(),
                    source,
                })?
            }
            DiffSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|source| MirrorError::DiffRead {
                        source_name: "stdin".to_string(),
                        source,
                    })?;
                buf
            }
        };
        Ok(Self::new(text, limit))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Character count before truncation.
    pub fn original_chars(&self) -> usize {
        self.original_chars
    }

    pub fn is_truncated(&self) -> bool {
        self.text.len() < self.original_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
