//! Instruction templates for the three gateway calls.
//!
//! The decision policy lives in these strings; the Rust side contributes
//! the sentinel gating (`handles`), the parse fallbacks (`parse`), and
//! nothing else. Markers referenced here must match
//! [`crate::document::page_marker`].

use crate::style;

/// Prompt asking the model to locate the references/bibliography pages.
pub fn range_prompt(document_text: &str) -> String {
    format!(
        r#"You are analyzing the full text of an academic PDF. Page boundaries are
marked with lines of the form "--- Page N ---". Page numbers are 1-based.

TASK:
Locate the page range of the references/bibliography section.

INSTRUCTIONS:
1. Find the heading that starts the reference list itself ("References",
   "Bibliography", "Works Cited", or similar).
2. Do NOT report a table-of-contents entry. A heading line followed only by
   dotted leaders and a page number (e.g. "References .......... 41") is a
   ToC hit and must be rejected.
3. Verify that the pages you report actually contain citation-shaped lines
   (numbered entries, author lists, years, venues).
4. Reply with JSON only, no prose:
   {{"start_page": <int or null>, "end_page": <int or null>, "reason": "<short explanation>"}}
   Use null for both page fields if the document has no true references
   section. Both bounds are inclusive.

DOCUMENT:
"""{document_text}"""
"#
    )
}

/// Prompt asking the model to classify the in-text citation notation.
pub fn style_prompt(early_text: &str) -> String {
    format!(
        r#"You are analyzing the first pages of an academic PDF.

TASK:
Find where the main body text begins (skip the title, author block,
abstract, and any table of contents), then classify the notation used for
in-text citations there.

Choose exactly one label:
- "Numeric Brackets" (e.g. [1], [2,5], [3-6])
- "Author-Year" (e.g. (Smith 2020), (Jones et al., 2021))
- "Superscript" (raised numerals after the cited claim)
- "Alphanumeric" (e.g. [CLRS09])
- "Footnote" (numbered footnotes carrying the references)
- "{unknown}" when no clear pattern exists

Reply with the label only.

TEXT:
"""{early_text}"""
"#,
        unknown = style::STYLE_UNKNOWN,
    )
}

/// Prompt asking the model to resolve a selection into BibTeX entries.
pub fn citation_prompt(selection: &str, context: &str, style_hint: Option<&str>) -> String {
    let hint_block = match style_hint.filter(|h| !style::is_unknown(h)) {
        Some(hint) => format!(
            "3. Citation style hint: \"{hint}\". Expect that syntax first, but still\n   resolve well-formed handles of any other syntax you find.\n"
        ),
        None => String::new(),
    };

    format!(
        r#"You are an expert research assistant and BibTeX resolver.

TASK:
The user has selected a snippet of text from a PDF. Generate a correct,
complete BibTeX entry for every citation handle in that selection.

INPUTS:
1. User selection: "{selection}"
2. document_context (bibliography section text):
"""{context}"""
{hint_block}
INSTRUCTIONS:
1. ANALYZE the selection:
   - Identify EVERY citation handle, even if they are far apart
     (e.g. "...[1]... and also [5]").
   - EXPAND ranges, whatever dash they use: "[1-3]" -> 1, 2, 3.
   - Recognize author-year handles, single or semicolon-separated
     ("(Smith 2020; Jones et al., 2021)"); organization names are valid
     authors. Recognize textual handles ("Ref. 12", "Refs. 4-5",
     "Reference 3").
   - Numbers that are not citation handles are NOT handles: figure,
     section, table, and equation numbers, or units like "2D".
   - If the selection is itself a bibliography list, parse all lines.
2. LOCATE in context:
   - For EACH handle, find the full reference text in document_context.
     E.g. for "[1-2]", look for entries starting "1." and "2.".
3. EXTRACT & CONVERT:
   - Convert every located reference into one valid BibTeX entry.
   - Fill only fields actually present in the source text (authors, title,
     journal, volume, pages, year, DOI). If metadata is missing, do not
     hallucinate it.
4. OUTPUT:
   - If the selection contains no citation handle at all, reply with
     exactly: % No valid citation handles found in selection.
   - Otherwise return ONLY BibTeX entries, separated by blank lines.
     No markdown, no conversation.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::NO_HANDLE_SENTINEL;

    #[test]
    fn range_prompt_embeds_document_and_schema() {
        let p = range_prompt("--- Page 1 ---\nhello");
        assert!(p.contains("--- Page 1 ---\nhello"));
        assert!(p.contains("start_page"));
        assert!(p.contains("dotted leaders"));
    }

    #[test]
    fn style_prompt_offers_the_unknown_fallback() {
        let p = style_prompt("body text");
        assert!(p.contains(crate::style::STYLE_UNKNOWN));
        assert!(p.contains("abstract"));
    }

    #[test]
    fn citation_prompt_teaches_the_sentinel_verbatim() {
        let p = citation_prompt("[1]", "1. Some reference", None);
        assert!(p.contains(NO_HANDLE_SENTINEL.trim_start_matches("% ")));
        assert!(p.contains("User selection: \"[1]\""));
    }

    #[test]
    fn style_hint_is_included_unless_unknown() {
        let with = citation_prompt("[1]", "ctx", Some("Numeric Brackets"));
        assert!(with.contains("Numeric Brackets"));
        assert!(with.contains("any other syntax"));

        let without = citation_prompt("[1]", "ctx", Some("Unknown/Generic"));
        assert!(!without.contains("style hint"));

        let none = citation_prompt("[1]", "ctx", None);
        assert!(!none.contains("style hint"));
    }
}
