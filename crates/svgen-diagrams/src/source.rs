//! Source documents read from disk.

use std::path::{Path, PathBuf};

/// Markers whose presence makes a source a full document rather than a
/// bare expression.
const DOCUMENT_MARKERS: &[&str] = &[r"\documentclass", r"\begin{document}"];

/// Raw diagram or math source plus its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    text: String,
    is_structured: bool,
}

impl SourceDocument {
    /// Wrap source text, classifying it once.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let is_structured = DOCUMENT_MARKERS.iter().any(|m| text.contains(m));
        Self {
            text,
            is_structured,
        }
    }

    /// Read a source file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or is not UTF-8.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(text))
    }

    /// Source text as read.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether document-level markers are present.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.is_structured
    }

    /// Size of the source in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the source is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Output path used when none is given: the input with its extension
/// replaced by `.svg`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("svg")
}
