//! Page-tagged text access over the open document.
//!
//! Every boundary in the pipeline speaks 1-based, both-ends-inclusive page
//! numbers; the marker format below is what the range-resolution prompt
//! teaches the model to read.

use std::path::Path;

use crate::backend::{BackendError, DocumentBackend, LoadedDocument, PageRect};

/// Documents longer than this get the tailored first+last treatment in
/// [`TextAccessor::tailored_text`].
pub const TAILOR_THRESHOLD: usize = 100;
const TAILOR_HEAD_PAGES: usize = 5;
const TAILOR_TAIL_PAGES: usize = 30;

/// The literal page marker embedded in context text.
pub fn page_marker(page: usize) -> String {
    format!("\n--- Page {page} ---\n")
}

/// Text accessor over the currently open document.
///
/// Absence of a document is a valid, silently-empty state: every accessor
/// call returns empty output rather than raising.
#[derive(Default)]
pub struct TextAccessor {
    doc: Option<Box<dyn LoadedDocument>>,
}

impl TextAccessor {
    pub fn new() -> Self {
        Self { doc: None }
    }

    /// Open a document, releasing any previously open handle.
    pub fn open(&mut self, backend: &dyn DocumentBackend, path: &Path) -> Result<(), BackendError> {
        self.doc = Some(backend.load(path)?);
        Ok(())
    }

    /// Install an already-loaded document. Test seam and backend bypass.
    pub fn install(&mut self, doc: Box<dyn LoadedDocument>) {
        self.doc = Some(doc);
    }

    pub fn clear(&mut self) {
        self.doc = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.doc.as_ref().map_or(0, |d| d.page_count())
    }

    /// Every page's text in document order, each prefixed with its marker.
    /// Never truncates: the complete document always goes to the model.
    pub fn full_text(&self) -> String {
        self.text_in_range(1, self.page_count())
    }

    /// Economy variant for very long documents: the first few pages (intro)
    /// plus the last stretch (where references live). Opt-in; callers that
    /// want the contract of [`full_text`] must call it directly.
    pub fn tailored_text(&self) -> String {
        let count = self.page_count();
        if count <= TAILOR_THRESHOLD {
            return self.full_text();
        }
        let tail_start = count.saturating_sub(TAILOR_TAIL_PAGES - 1).max(TAILOR_HEAD_PAGES + 1);
        let mut text = self.text_in_range(1, TAILOR_HEAD_PAGES);
        text.push_str(&self.text_in_range(tail_start, count));
        text
    }

    /// Marker-tagged text of pages `[start, end]`, inclusive, clamped to
    /// `[1, page_count]`. Empty when the range is inverted after clamping
    /// or when no document is open.
    pub fn text_in_range(&self, start: usize, end: usize) -> String {
        let Some(doc) = self.doc.as_ref() else {
            return String::new();
        };
        let count = doc.page_count();
        if count == 0 {
            return String::new();
        }
        let start = start.max(1);
        let end = end.min(count);
        if start > end {
            return String::new();
        }

        let mut text = String::new();
        for page in start..=end {
            text.push_str(&page_marker(page));
            match doc.page_text(page) {
                Ok(page_text) => text.push_str(&page_text),
                Err(e) => {
                    tracing::warn!(page, error = %e, "page text extraction failed");
                }
            }
        }
        text
    }

    /// Text intersecting a pixel-space rectangle on one page; captures the
    /// user's drag-selection. Empty when out of range or nothing is open.
    pub fn text_in_rect(&self, page: usize, rect: PageRect) -> String {
        let Some(doc) = self.doc.as_ref() else {
            return String::new();
        };
        if page < 1 || page > doc.page_count() {
            return String::new();
        }
        match doc.text_in_rect(page, rect) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(page, error = %e, "rect text extraction failed");
                String::new()
            }
        }
    }
}
