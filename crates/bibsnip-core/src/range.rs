//! Bibliography-range resolution: ask the model where the references live,
//! salvage what comes back.

use bibsnip_llm::{LlmError, Session};

use crate::parse::{BibRange, parse_range_reply};
use crate::prompts;

/// Ask the model for the references-section page range of a tagged
/// full-text dump.
///
/// `Ok(None)` is the "not found" contract: the caller must keep using the
/// unnarrowed full-text context. Transport errors bubble up so the caller
/// can log them, but they carry the same obligation.
pub async fn resolve_bibliography_range(
    session: &Session,
    full_text: &str,
) -> Result<Option<BibRange>, LlmError> {
    if full_text.trim().is_empty() {
        return Ok(None);
    }
    let reply = session
        .query(&prompts::range_prompt(full_text), true, 0.0)
        .await?;
    let range = parse_range_reply(&reply);
    match &range {
        Some(r) => tracing::debug!(start = r.start, end = r.end, "bibliography range resolved"),
        None => tracing::debug!("bibliography range not found, keeping full context"),
    }
    Ok(range)
}
