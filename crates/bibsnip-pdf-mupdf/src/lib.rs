use std::path::Path;

use mupdf::{Document, TextPageFlags};

use bibsnip_core::{BackendError, DocumentBackend, LoadedDocument, PageRect};

/// MuPDF-based implementation of [`DocumentBackend`].
///
/// This crate is the sole AGPL island — it isolates the mupdf dependency
/// (which is AGPL-3.0) so that non-PDF code paths do not transitively
/// depend on it.
///
/// Pages are extracted eagerly at load time into owned text blocks with
/// their bounds. MuPDF handles are context-bound and awkward to share
/// across tasks; owned page data makes the loaded document trivially
/// `Send + Sync`, and rectangle selection becomes a pure intersection
/// filter over cached blocks.
#[derive(Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

struct PageBlock {
    bounds: PageRect,
    text: String,
}

struct PageData {
    text: String,
    blocks: Vec<PageBlock>,
}

/// A fully-extracted document: plain data, no live MuPDF state.
pub struct MupdfDocument {
    pages: Vec<PageData>,
}

impl DocumentBackend for MupdfBackend {
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedDocument>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            let mut page_text = String::new();
            let mut blocks = Vec::new();

            // Block/line iteration keeps reading order stable across columns.
            for block in text_page.blocks() {
                let block_bounds = block.bounds();
                let mut block_text = String::new();
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    block_text.push_str(&line_text);
                    block_text.push('\n');
                }
                page_text.push_str(&block_text);

                blocks.push(PageBlock {
                    bounds: PageRect::new(
                        block_bounds.x0,
                        block_bounds.y0,
                        block_bounds.x1,
                        block_bounds.y1,
                    ),
                    text: block_text,
                });
            }

            pages.push(PageData {
                text: page_text,
                blocks,
            });
        }

        Ok(Box::new(MupdfDocument { pages }))
    }
}

impl LoadedDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, BackendError> {
        self.pages
            .get(page.wrapping_sub(1))
            .map(|p| p.text.clone())
            .ok_or_else(|| BackendError::ExtractionError(format!("page {page} out of range")))
    }

    fn text_in_rect(&self, page: usize, rect: PageRect) -> Result<String, BackendError> {
        let data = self
            .pages
            .get(page.wrapping_sub(1))
            .ok_or_else(|| BackendError::ExtractionError(format!("page {page} out of range")))?;

        // Block granularity: a drag that clips any part of a block grabs
        // the whole block, which is what selection capture wants anyway.
        let mut text = String::new();
        for block in &data.blocks {
            if block.bounds.intersects(&rect) {
                text.push_str(&block.text);
            }
        }
        Ok(text)
    }
}
