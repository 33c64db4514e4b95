//! `|bidiSpanWrap` and the word-count direction estimator it falls back on.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

use crate::data::{string_or_html, BidiGlobalDir, ContentKind, Dir, SoyValue};

/// Share of strongly-directional words that must be RTL for text to count as RTL.
const RTL_DETECTION_THRESHOLD: f64 = 0.40;

const LTR_CHARS: &str = r"A-Za-z\x{00C0}-\x{00D6}\x{00D8}-\x{00F6}\x{00F8}-\x{02B8}\x{0300}-\x{0590}\x{0800}-\x{1FFF}\x{200E}\x{2C00}-\x{FB1C}\x{FE00}-\x{FE6F}\x{FEFD}-\x{FFFF}\x{10000}-\x{10FFFF}";
const RTL_CHARS: &str = r"\x{0591}-\x{07FF}\x{200F}\x{FB1D}-\x{FDFF}\x{FE70}-\x{FEFC}";

lazy_static! {
    static ref STARTS_WITH_RTL: Regex =
        Regex::new(&format!("^[^{}]*[{}]", LTR_CHARS, RTL_CHARS)).unwrap();
    static ref HAS_ANY_LTR: Regex = Regex::new(&format!("[{}]", LTR_CHARS)).unwrap();
    static ref HAS_NUMERALS: Regex = Regex::new(r"\d").unwrap();
    static ref HTML_SKIP: Regex = Regex::new(r"<[^>]*>|&[^;\s]+;").unwrap();
    static ref URL_PREFIX: Regex = Regex::new(r"^https?://").unwrap();
}

/// Estimates the direction of `text` by counting words whose first strong
/// character is RTL. Markup and entities are ignored when `is_html` is set.
pub fn estimate_direction(text: &str, is_html: bool) -> Dir {
    let text = if is_html {
        HTML_SKIP.replace_all(text, " ")
    } else {
        Cow::Borrowed(text)
    };

    let mut rtl_count = 0usize;
    let mut total_count = 0usize;
    let mut has_weakly_ltr = false;

    for token in text.split_whitespace() {
        if STARTS_WITH_RTL.is_match(token) {
            rtl_count += 1;
            total_count += 1;
        } else if URL_PREFIX.is_match(token) {
            has_weakly_ltr = true;
        } else if HAS_ANY_LTR.is_match(token) {
            total_count += 1;
        } else if HAS_NUMERALS.is_match(token) {
            has_weakly_ltr = true;
        }
    }

    if total_count == 0 {
        if has_weakly_ltr {
            Dir::Ltr
        } else {
            Dir::Neutral
        }
    } else if rtl_count as f64 / total_count as f64 > RTL_DETECTION_THRESHOLD {
        Dir::Rtl
    } else {
        Dir::Ltr
    }
}

fn dir_attribute(dir: Dir) -> &'static str {
    match dir {
        Dir::Rtl => "rtl",
        _ => "ltr",
    }
}

fn mark(global_dir: BidiGlobalDir) -> &'static str {
    match global_dir {
        BidiGlobalDir::Ltr => "&lrm;",
        BidiGlobalDir::Rtl => "&rlm;",
    }
}

/// Wraps `value` in `<span dir=...>` when its direction is strong and differs
/// from the page direction, then restores the page direction with a mark.
pub fn bidi_span_wrap(global_dir: BidiGlobalDir, value: &SoyValue) -> SoyValue {
    let text = value.coerce_to_string();
    let html = value
        .as_sanitized()
        .filter(|s| s.content_kind() == ContentKind::Html);
    let value_dir = html
        .and_then(|s| s.content_direction())
        .unwrap_or_else(|| estimate_direction(&text, html.is_some()));

    let context_dir = global_dir.to_dir();
    let result = if value_dir != Dir::Neutral && value_dir != context_dir {
        format!(
            "<span dir=\"{}\">{}</span>{}",
            dir_attribute(value_dir),
            text,
            mark(global_dir)
        )
    } else {
        text
    };
    string_or_html(result, value, Some(Some(context_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_direction() {
        assert_eq!(estimate_direction("hello world", false), Dir::Ltr);
        assert_eq!(estimate_direction("שלום עולם", false), Dir::Rtl);
        assert_eq!(estimate_direction("שלום hello", false), Dir::Rtl);
        assert_eq!(estimate_direction("שלום a b c", false), Dir::Ltr);
        assert_eq!(estimate_direction("123 456", false), Dir::Ltr);
        assert_eq!(estimate_direction("!? ...", false), Dir::Neutral);
        assert_eq!(estimate_direction("", false), Dir::Neutral);
    }

    #[test]
    fn test_estimate_direction_ignores_markup_in_html() {
        assert_eq!(estimate_direction("<b class=x>שלום</b>", true), Dir::Rtl);
        assert_eq!(estimate_direction("<b class=x>שלום</b>", false), Dir::Ltr);
        assert_eq!(estimate_direction("&nbsp;", true), Dir::Neutral);
    }

    #[test]
    fn test_wraps_opposite_direction() {
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Ltr, &SoyValue::string("שלום")),
            SoyValue::string("<span dir=\"rtl\">שלום</span>&lrm;")
        );
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Rtl, &SoyValue::string("hello")),
            SoyValue::string("<span dir=\"ltr\">hello</span>&rlm;")
        );
    }

    #[test]
    fn test_same_or_neutral_direction_is_noop() {
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Ltr, &SoyValue::string("hello")),
            SoyValue::string("hello")
        );
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Rtl, &SoyValue::string("...")),
            SoyValue::string("...")
        );
    }

    #[test]
    fn test_declared_direction_wins_for_html() {
        let value = SoyValue::html("<b>hello</b>", Some(Dir::Rtl));
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Ltr, &value),
            SoyValue::html("<span dir=\"rtl\"><b>hello</b></span>&lrm;", Some(Dir::Ltr))
        );

        let neutral = SoyValue::html("hello", Some(Dir::Neutral));
        assert_eq!(
            bidi_span_wrap(BidiGlobalDir::Rtl, &neutral),
            SoyValue::html("hello", Some(Dir::Rtl))
        );
    }

    #[test]
    fn test_declared_direction_matching_page_is_noop() {
        // The text itself estimates as RTL, but the declared LTR is trusted.
        let value = SoyValue::html("שלום", Some(Dir::Ltr));
        assert_eq!(bidi_span_wrap(BidiGlobalDir::Ltr, &value), value);
    }
}
