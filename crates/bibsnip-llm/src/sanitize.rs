//! Reply sanitation: models wrap BibTeX and JSON in markdown fences despite
//! instructions not to.

use once_cell::sync::Lazy;
use regex::Regex;

/// Remove every fenced-code marker (with or without a language tag) and trim
/// surrounding whitespace. Idempotent.
pub fn strip_code_fences(text: &str) -> String {
    static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").unwrap());
    FENCE_RE.replace_all(text, "").trim().to_string()
}
