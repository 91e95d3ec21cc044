//! Salvage parsing for range-resolution replies.
//!
//! Models asked for JSON still answer in prose often enough that the
//! resolver runs an ordered chain of strategies: structured decode, then
//! key-value scraping, then the first bare numeric range. Exhaustion means
//! "not found" and the caller keeps the unnarrowed context.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A resolved references-section page range, 1-based, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibRange {
    pub start: usize,
    pub end: usize,
    /// The model's short justification, when the structured reply had one.
    pub reason: Option<String>,
}

enum Structured {
    Found(BibRange),
    /// Valid JSON carrying the expected keys with null/absent bounds: the
    /// model is saying "no references section", which is authoritative.
    Absent,
    NotJson,
}

fn parse_structured(reply: &str) -> Structured {
    let Ok(value) = serde_json::from_str::<Value>(reply) else {
        return Structured::NotJson;
    };
    let Some(obj) = value.as_object() else {
        return Structured::NotJson;
    };
    if !obj.contains_key("start_page") && !obj.contains_key("end_page") {
        // JSON, but not our shape; let the scrapers have a look.
        return Structured::NotJson;
    }

    let start = obj.get("start_page").and_then(Value::as_u64);
    let end = obj.get("end_page").and_then(Value::as_u64);
    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(String::from);

    match (start, end) {
        (Some(s), Some(e)) if s >= 1 && s <= e => Structured::Found(BibRange {
            start: s as usize,
            end: e as usize,
            reason,
        }),
        _ => Structured::Absent,
    }
}

/// Scrape `start_page`/`end_page` key-value pairs out of loose text.
fn parse_key_value(reply: &str) -> Option<BibRange> {
    static START_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)["']?start_page["']?\s*[:=]\s*(\d+)"#).unwrap());
    static END_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)["']?end_page["']?\s*[:=]\s*(\d+)"#).unwrap());

    let start: usize = START_RE.captures(reply)?.get(1)?.as_str().parse().ok()?;
    let end: usize = END_RE.captures(reply)?.get(1)?.as_str().parse().ok()?;
    valid_range(start, end)
}

/// Take the first "N-M" pattern anywhere in the reply. Any of the usual
/// dash-like separators counts.
fn parse_bare_range(reply: &str) -> Option<BibRange> {
    static RANGE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\d+)\s*[-\u{2010}\u{2013}\u{2014}]\s*(\d+)").unwrap());

    let caps = RANGE_RE.captures(reply)?;
    let start: usize = caps.get(1)?.as_str().parse().ok()?;
    let end: usize = caps.get(2)?.as_str().parse().ok()?;
    valid_range(start, end)
}

fn valid_range(start: usize, end: usize) -> Option<BibRange> {
    if start >= 1 && start <= end {
        Some(BibRange {
            start,
            end,
            reason: None,
        })
    } else {
        None
    }
}

/// Run the strategy chain over a sanitized reply. `None` means "not found":
/// narrowing is best-effort and the caller must keep the full-text context.
pub fn parse_range_reply(reply: &str) -> Option<BibRange> {
    match parse_structured(reply) {
        Structured::Found(range) => Some(range),
        Structured::Absent => None,
        Structured::NotJson => parse_key_value(reply).or_else(|| parse_bare_range(reply)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_reply_decodes_directly() {
        let reply = r#"{"start_page": 30, "end_page": 38, "reason": "heading on p.30"}"#;
        let range = parse_range_reply(reply).unwrap();
        assert_eq!((range.start, range.end), (30, 38));
        assert_eq!(range.reason.as_deref(), Some("heading on p.30"));
    }

    #[test]
    fn structured_nulls_are_authoritative_not_found() {
        let reply = r#"{"start_page": null, "end_page": null, "reason": "ToC entry only, pages 12-18 rejected"}"#;
        // The digits in the reason must not be scraped into a range.
        assert_eq!(parse_range_reply(reply), None);
    }

    #[test]
    fn key_value_fallback_salvages_prose() {
        let reply = "Sure! The references run from start_page: 12 to end_page: 18.";
        let range = parse_range_reply(reply).unwrap();
        assert_eq!((range.start, range.end), (12, 18));
        assert_eq!(range.reason, None);
    }

    #[test]
    fn key_value_fallback_accepts_quoted_keys() {
        let reply = r#"I think "start_page" = 7 and "end_page" = 9 here."#;
        let range = parse_range_reply(reply).unwrap();
        assert_eq!((range.start, range.end), (7, 9));
    }

    #[test]
    fn bare_range_fallback_is_last() {
        assert_eq!(
            parse_range_reply("12-18").map(|r| (r.start, r.end)),
            Some((12, 18))
        );
        // En dash and em dash are treated the same.
        assert_eq!(
            parse_range_reply("pages 30\u{2013}38 hold the bibliography")
                .map(|r| (r.start, r.end)),
            Some((30, 38))
        );
    }

    #[test]
    fn exhaustion_is_not_found() {
        assert_eq!(parse_range_reply("no references section present"), None);
        assert_eq!(parse_range_reply(""), None);
    }

    #[test]
    fn nonsensical_bounds_are_rejected() {
        assert_eq!(
            parse_range_reply(r#"{"start_page": 38, "end_page": 30}"#),
            None
        );
        assert_eq!(
            parse_range_reply(r#"{"start_page": 0, "end_page": 4}"#),
            None
        );
        assert_eq!(parse_range_reply("start_page: 9, end_page: 3"), None);
    }

    #[test]
    fn json_without_expected_keys_falls_through_to_scrapers() {
        let reply = r#"{"pages": "12-18"}"#;
        let range = parse_range_reply(reply).unwrap();
        assert_eq!((range.start, range.end), (12, 18));
    }

    #[test]
    fn strategies_run_in_order() {
        // Key-value wins over an earlier bare range in the same reply.
        let reply = "Candidates were 2-4 at first, but start_page: 30 and end_page: 38 checked out.";
        let range = parse_range_reply(reply).unwrap();
        assert_eq!((range.start, range.end), (30, 38));
    }
}
