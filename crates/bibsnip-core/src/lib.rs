//! Two-phase context narrowing and citation resolution over an open PDF.
//!
//! Pipeline: open a document, install its full marker-tagged text as the
//! context window, best-effort narrow that window to the bibliography
//! pages, detect the citation style once, then resolve each drag-selection
//! into BibTeX via the provider gateway. The only local judgment is the
//! handle scanner gating the no-handle sentinel and the parse fallback
//! chain salvaging range replies; everything else is delegated to the
//! model.

pub mod backend;
pub mod citation;
pub mod config_file;
pub mod document;
pub mod handles;
pub mod parse;
pub mod prompts;
pub mod range;
pub mod style;
pub mod testing;
pub mod workbench;

// Re-export for convenience
pub use backend::{BackendError, DocumentBackend, LoadedDocument, PageRect};
pub use citation::{NO_HANDLE_SENTINEL, RATE_LIMIT_COMMENT, error_comment, resolve_citation};
pub use document::TextAccessor;
pub use handles::{Handle, scan_handles};
pub use parse::{BibRange, parse_range_reply};
pub use range::resolve_bibliography_range;
pub use style::{STYLE_UNKNOWN, detect_citation_style};
pub use workbench::{Workbench, WorkbenchEvent};
