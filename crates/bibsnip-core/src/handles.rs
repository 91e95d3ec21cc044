//! Deterministic citation-handle recognition.
//!
//! The scanner decides one thing only: whether a selection carries any
//! explicit citation handle. Zero handles means the resolver emits the
//! no-handle sentinel without spending a model call; the BibTeX conversion
//! itself stays with the model.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Widest numeric range a bracket like `[3-120]` is allowed to expand to.
const MAX_RANGE_SPAN: u32 = 200;

/// A recognized citation marker in the selected text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
    /// `[12]`, `Ref. 12`, one element of `[3,7]` or of an expanded range.
    Numeric(u32),
    /// `(Smith 2020)`, `Jones et al. (2021)`, `(OpenAI, 2023)`.
    AuthorYear { author: String, year: String },
}

/// Scan a selection for citation handles, in reading order, deduplicated.
pub fn scan_handles(selection: &str) -> Vec<Handle> {
    let mut handles = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |handle: Handle| {
        if seen.insert(handle.clone()) {
            handles.push(handle);
        }
    };

    scan_bracketed(selection, &mut push);
    scan_textual(selection, &mut push);
    scan_author_year(selection, &mut push);

    handles
}

/// `[1]`, `[2, 5]`, `[1-3]` with any dash-like separator, `[1,4-6]`.
fn scan_bracketed(selection: &str, push: &mut impl FnMut(Handle)) {
    static BRACKET_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\[([0-9][0-9,;\s\-\u{2010}\u{2013}\u{2014}]*)\]").unwrap()
    });
    static ITEM_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(\d+)(?:\s*[-\u{2010}\u{2013}\u{2014}]\s*(\d+))?").unwrap()
    });

    for group in BRACKET_RE.captures_iter(selection) {
        for item in ITEM_RE.captures_iter(&group[1]) {
            let Ok(first) = item[1].parse::<u32>() else {
                continue;
            };
            match item.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
                Some(last) if last >= first && last - first <= MAX_RANGE_SPAN => {
                    for n in first..=last {
                        push(Handle::Numeric(n));
                    }
                }
                Some(_) => {} // inverted or absurd range, not a handle
                None => push(Handle::Numeric(first)),
            }
        }
    }
}

/// `Ref. 12`, `Refs. 4-5`, `Reference 3`.
fn scan_textual(selection: &str, push: &mut impl FnMut(Handle)) {
    static TEXTUAL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:refs?\.?|reference)\s+(\d+)(?:\s*[-\u{2010}\u{2013}\u{2014}]\s*(\d+))?")
            .unwrap()
    });

    for caps in TEXTUAL_RE.captures_iter(selection) {
        let Ok(first) = caps[1].parse::<u32>() else {
            continue;
        };
        match caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
            Some(last) if last >= first && last - first <= MAX_RANGE_SPAN => {
                for n in first..=last {
                    push(Handle::Numeric(n));
                }
            }
            Some(_) => {}
            None => push(Handle::Numeric(first)),
        }
    }
}

/// Parenthesized author-year lists (`(Smith 2020; Jones et al., 2021)`) and
/// narrative citations (`Smith (2020)`). Organization names count as
/// authors; labels that are really figure/section/equation references do
/// not.
fn scan_author_year(selection: &str, push: &mut impl FnMut(Handle)) {
    static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]+)\)").unwrap());
    static PART_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(.+?),?\s+\(?(\d{4}[a-z]?)\)?$").unwrap());
    static NARRATIVE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"([A-Z][\w'\u{2019}-]+(?:\s+(?:and|&)\s+[A-Z][\w'\u{2019}-]+)?(?:\s+et al\.?)?)\s+\((\d{4}[a-z]?)\)",
        )
        .unwrap()
    });
    static NON_CITATION_LABEL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(?:fig|figure|eq|equation|sec|section|table|ch|chapter|alg|algorithm|appendix)\b")
            .unwrap()
    });

    for group in PAREN_RE.captures_iter(selection) {
        for part in group[1].split(';') {
            let part = part.trim();
            let Some(caps) = PART_RE.captures(part) else {
                continue;
            };
            let author = caps[1].trim().trim_end_matches(',').to_string();
            let year = caps[2].to_string();
            if is_author(&author, &NON_CITATION_LABEL) && is_citation_year(&year) {
                push(Handle::AuthorYear { author, year });
            }
        }
    }

    for caps in NARRATIVE_RE.captures_iter(selection) {
        let author = caps[1].trim().to_string();
        let year = caps[2].to_string();
        if is_author(&author, &NON_CITATION_LABEL) && is_citation_year(&year) {
            push(Handle::AuthorYear { author, year });
        }
    }
}

fn is_author(candidate: &str, non_citation: &Regex) -> bool {
    candidate.chars().any(|c| c.is_alphabetic()) && !non_citation.is_match(candidate)
}

/// Four leading digits in a plausible publication-year window.
fn is_citation_year(year: &str) -> bool {
    year[..4]
        .parse::<u32>()
        .map(|y| (1500..=2099).contains(&y))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numerics(selection: &str) -> Vec<u32> {
        scan_handles(selection)
            .into_iter()
            .filter_map(|h| match h {
                Handle::Numeric(n) => Some(n),
                Handle::AuthorYear { .. } => None,
            })
            .collect()
    }

    #[test]
    fn single_bracket() {
        assert_eq!(numerics("as shown in [7]"), vec![7]);
    }

    #[test]
    fn range_expands() {
        assert_eq!(numerics("[1-3]"), vec![1, 2, 3]);
        // Unicode dashes are equivalent.
        assert_eq!(numerics("[1\u{2013}3]"), vec![1, 2, 3]);
        assert_eq!(numerics("[1\u{2014}3]"), vec![1, 2, 3]);
        assert_eq!(numerics("[1\u{2010}3]"), vec![1, 2, 3]);
    }

    #[test]
    fn comma_lists_and_mixed_forms() {
        assert_eq!(numerics("[2, 5, 9]"), vec![2, 5, 9]);
        assert_eq!(numerics("[1,4-6]"), vec![1, 4, 5, 6]);
        assert_eq!(numerics("...[1]... and also [5]"), vec![1, 5]);
    }

    #[test]
    fn duplicates_collapse_in_order() {
        assert_eq!(numerics("[3] and again [3], plus [1-3]"), vec![3, 1, 2]);
    }

    #[test]
    fn inverted_or_absurd_ranges_are_dropped() {
        assert_eq!(numerics("[9-3]"), Vec::<u32>::new());
        assert_eq!(numerics("[1-99999]"), Vec::<u32>::new());
    }

    #[test]
    fn textual_forms() {
        assert_eq!(numerics("see Ref. 12 for details"), vec![12]);
        assert_eq!(numerics("Reference 3 disagrees"), vec![3]);
        assert_eq!(numerics("Refs. 4-5 both"), vec![4, 5]);
        assert_eq!(numerics("refs 7 and 8"), vec![7]);
    }

    #[test]
    fn non_citation_numbers_yield_nothing() {
        assert!(scan_handles("Fig. 2 shows...").is_empty());
        assert!(scan_handles("see Section 3 and Table 1").is_empty());
        assert!(scan_handles("a 2D lattice at 300 K").is_empty());
        assert!(scan_handles("Eq. (4) gives the bound").is_empty());
        assert!(scan_handles("").is_empty());
    }

    #[test]
    fn parenthesized_author_year_pairs() {
        let handles = scan_handles("(Smith 2020) and (Jones et al., 2021)");
        assert_eq!(handles.len(), 2);
        assert_eq!(
            handles[0],
            Handle::AuthorYear {
                author: "Smith".into(),
                year: "2020".into()
            }
        );
        assert_eq!(
            handles[1],
            Handle::AuthorYear {
                author: "Jones et al.".into(),
                year: "2021".into()
            }
        );
    }

    #[test]
    fn semicolon_separated_multiples() {
        let handles = scan_handles("(Smith 2020; Doe and Roe, 2019)");
        assert_eq!(handles.len(), 2);
    }

    #[test]
    fn organizations_are_valid_authors() {
        let handles = scan_handles("(World Health Organization, 2019)");
        assert_eq!(
            handles,
            vec![Handle::AuthorYear {
                author: "World Health Organization".into(),
                year: "2019".into()
            }]
        );
    }

    #[test]
    fn narrative_citation() {
        let handles = scan_handles("Smith (2020) already observed this.");
        assert_eq!(
            handles,
            vec![Handle::AuthorYear {
                author: "Smith".into(),
                year: "2020".into()
            }]
        );
    }

    #[test]
    fn year_suffix_and_window() {
        let handles = scan_handles("(Smith 2020a)");
        assert_eq!(
            handles,
            vec![Handle::AuthorYear {
                author: "Smith".into(),
                year: "2020a".into()
            }]
        );
        // A parenthesized page count is not a citation year.
        assert!(scan_handles("(page 1234)").is_empty());
    }

    #[test]
    fn mixed_syntaxes_coexist() {
        let handles = scan_handles("[2] contradicts (Smith 2020)");
        assert_eq!(handles.len(), 2);
        assert!(handles.contains(&Handle::Numeric(2)));
    }
}
