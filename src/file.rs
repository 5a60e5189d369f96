use crate::discovery::DiscoveredFile;
use crate::error::{Error, Result};
use std::fs;
use std::path::PathBuf;

/// A discovered source file with its text content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Path relative to the input directory
    pub relative_path: PathBuf,

    /// File content, read once and never modified
    pub content: String,
}

impl SourceFile {
    /// Creates a source file from already loaded content.
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: PathBuf, content: String) -> Self {
        Self {
            absolute_path,
            relative_path,
            content,
        }
    }

    /// Reads a discovered file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or an invalid UTF-8
    /// error if the content is not text. Both are per-file failures.
    pub fn read(discovered: &DiscoveredFile) -> Result<Self> {
        let path = &discovered.absolute_path;
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::invalid_utf8(path)
            } else {
                Error::io(path, e)
            }
        })?;

        Ok(Self::new(
            discovered.absolute_path.clone(),
            discovered.relative_path.clone(),
            content,
        ))
    }

    /// Returns the relative path for display and logs.
    #[must_use]
    pub fn display_path(&self) -> String {
        self.relative_path.to_string_lossy().to_string()
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}
