//! Selection-to-BibTeX resolution.
//!
//! Anything that must appear in the output log but is not BibTeX is
//! prefixed with `%` so downstream tools read it as a BibTeX comment.

use bibsnip_llm::{LlmError, Session};

use crate::handles::scan_handles;
use crate::prompts;

/// Exact output when the selection carries no citation handle. Never a
/// partial guess, never free text.
pub const NO_HANDLE_SENTINEL: &str = "% No valid citation handles found in selection.";

/// User-facing comment for rate-limit/quota failures.
pub const RATE_LIMIT_COMMENT: &str = "% [Error] LLM rate limit exceeded. Please wait a moment.";

/// Comment emitted when the model answers with nothing usable.
pub const EMPTY_REPLY_COMMENT: &str = "% No result returned.";

/// Error text is truncated to this many characters before display.
const ERROR_COMMENT_CAP: usize = 200;

/// Resolve a drag-selection against the current context window.
///
/// The deterministic scanner gates the sentinel: with zero recognized
/// handles the sentinel is returned without a model call. With at least
/// one, the model converts the matching context entries to BibTeX.
pub async fn resolve_citation(
    session: &Session,
    selection: &str,
    context: &str,
    style_hint: Option<&str>,
) -> Result<String, LlmError> {
    let handles = scan_handles(selection);
    if handles.is_empty() {
        tracing::debug!("no citation handles in selection");
        return Ok(NO_HANDLE_SENTINEL.to_string());
    }
    tracing::debug!(count = handles.len(), "resolving citation handles");

    let prompt = prompts::citation_prompt(selection, context, style_hint);
    let reply = session.query(&prompt, false, 0.0).await?;
    if reply.is_empty() {
        Ok(EMPTY_REPLY_COMMENT.to_string())
    } else {
        Ok(reply)
    }
}

/// Convert a gateway failure into the comment line that goes to the output
/// log in place of BibTeX.
pub fn error_comment(err: &LlmError) -> String {
    if err.is_rate_limited() {
        return RATE_LIMIT_COMMENT.to_string();
    }
    let msg = err.to_string();
    let display: String = if msg.chars().count() > ERROR_COMMENT_CAP {
        let capped: String = msg.chars().take(ERROR_COMMENT_CAP).collect();
        format!("{capped}...")
    } else {
        msg
    };
    format!("% [Error] {display}")
}
