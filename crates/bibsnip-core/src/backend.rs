use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pixel-space rectangle on a page, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    /// Build a rectangle from any two opposite corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn intersects(&self, other: &PageRect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// An open multi-page document. Created on open, replaced wholesale on the
/// next open, never mutated.
pub trait LoadedDocument: Send + Sync {
    fn page_count(&self) -> usize;

    /// Text of one page. `page` is 1-based.
    fn page_text(&self, page: usize) -> Result<String, BackendError>;

    /// Text intersecting a rectangle on one page. `page` is 1-based.
    fn text_in_rect(&self, page: usize, rect: PageRect) -> Result<String, BackendError>;
}

/// Trait for document-loading backends.
///
/// Implementors provide the low-level open/extract step; the accessor and
/// the resolution pipeline live in this crate and never link a PDF library.
pub trait DocumentBackend: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedDocument>, BackendError>;
}
