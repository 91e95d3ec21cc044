//! In-memory document backend for tests.

use std::path::Path;

use crate::backend::{BackendError, DocumentBackend, LoadedDocument, PageRect};

/// A document made of plain strings, optionally with positioned text blocks
/// for rectangle-selection tests.
pub struct FakeDocument {
    pages: Vec<String>,
    blocks: Vec<Vec<(PageRect, String)>>,
}

impl FakeDocument {
    pub fn new(pages: Vec<String>) -> Self {
        let blocks = vec![Vec::new(); pages.len()];
        Self { pages, blocks }
    }

    /// `count` pages reading "Content of page N."
    pub fn numbered(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|n| format!("Content of page {n}.\n"))
                .collect(),
        )
    }

    /// Attach positioned blocks to a page (1-based) for rect queries.
    pub fn with_blocks(mut self, page: usize, blocks: Vec<(PageRect, String)>) -> Self {
        self.blocks[page - 1] = blocks;
        self
    }
}

impl LoadedDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, BackendError> {
        self.pages
            .get(page - 1)
            .cloned()
            .ok_or_else(|| BackendError::ExtractionError(format!("page {page} out of range")))
    }

    fn text_in_rect(&self, page: usize, rect: PageRect) -> Result<String, BackendError> {
        let blocks = self
            .blocks
            .get(page - 1)
            .ok_or_else(|| BackendError::ExtractionError(format!("page {page} out of range")))?;
        Ok(blocks
            .iter()
            .filter(|(bounds, _)| bounds.intersects(&rect))
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Backend that ignores the path and serves a fixed page list.
pub struct FakeBackend {
    pages: Vec<String>,
}

impl FakeBackend {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    pub fn numbered(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|n| format!("Content of page {n}.\n"))
                .collect(),
        )
    }
}

impl DocumentBackend for FakeBackend {
    fn load(&self, _path: &Path) -> Result<Box<dyn LoadedDocument>, BackendError> {
        Ok(Box::new(FakeDocument::new(self.pages.clone())))
    }
}
