//! One-shot citation-style detection over the document's opening pages.
//!
//! The label is advisory: it feeds the resolution prompt as a hint and is
//! never a control branch. Anything that goes wrong here degrades to the
//! unknown label.

use bibsnip_llm::{LlmError, Session};

use crate::prompts;

/// The explicit "no clear pattern" label; also what detection failures
/// degrade to.
pub const STYLE_UNKNOWN: &str = "Unknown/Generic";

/// How many opening pages feed the detector.
pub const STYLE_PROBE_PAGES: usize = 5;

/// A style label longer than this is the model chatting, not labeling.
const STYLE_LABEL_CAP: usize = 40;

pub fn is_unknown(label: &str) -> bool {
    label.to_lowercase().contains("unknown")
}

/// Ask the model to classify the citation notation used in the main body.
///
/// Returns a short free-text label. The reply is reduced to its first line;
/// empty or rambling replies collapse to [`STYLE_UNKNOWN`].
pub async fn detect_citation_style(
    session: &Session,
    early_text: &str,
) -> Result<String, LlmError> {
    if early_text.trim().is_empty() {
        return Ok(STYLE_UNKNOWN.to_string());
    }
    let reply = session
        .query(&prompts::style_prompt(early_text), false, 0.0)
        .await?;
    let label = reply
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .to_string();
    if label.is_empty() || label.chars().count() > STYLE_LABEL_CAP {
        Ok(STYLE_UNKNOWN.to_string())
    } else {
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibsnip_llm::Provider;
    use bibsnip_llm::mock::{MockProvider, MockReply};

    fn session(reply: MockReply) -> Session {
        Session::with_backend(
            Box::new(MockProvider::new(reply)),
            Provider::Gemini,
            "key",
            "gemini-1.5-flash",
        )
    }

    #[tokio::test]
    async fn returns_the_first_line_unquoted() {
        let s = session(MockReply::Text("\"Numeric Brackets\"\nBecause...".into()));
        let label = detect_citation_style(&s, "body text [1]").await.unwrap();
        assert_eq!(label, "Numeric Brackets");
    }

    #[tokio::test]
    async fn empty_input_short_circuits_to_unknown() {
        let s = session(MockReply::Text("never queried".into()));
        let label = detect_citation_style(&s, "   ").await.unwrap();
        assert_eq!(label, STYLE_UNKNOWN);
    }

    #[tokio::test]
    async fn rambling_replies_collapse_to_unknown() {
        let s = session(MockReply::Text(
            "Well, examining the text closely, I believe the citations look mostly numeric".into(),
        ));
        let label = detect_citation_style(&s, "text").await.unwrap();
        assert_eq!(label, STYLE_UNKNOWN);
    }

    #[test]
    fn unknown_predicate_is_case_insensitive() {
        assert!(is_unknown("Unknown/Generic"));
        assert!(is_unknown("unknown"));
        assert!(!is_unknown("Author-Year"));
    }
}
