//! Render-time values.
//!
//! `SanitizedContent` is content some earlier stage has vouched for, tagged with
//! the kind of context it is safe in and optionally its text direction. Only
//! directives that re-validate their output may ordain new content.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTENT KIND & DIRECTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Html,
    Attributes,
    Js,
    Uri,
    TrustedResourceUri,
    Css,
    Text,
}

/// Text directionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    Ltr,
    Rtl,
    Neutral,
}

/// The directionality of the page being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidiGlobalDir {
    Ltr,
    Rtl,
}

impl BidiGlobalDir {
    pub fn to_dir(self) -> Dir {
        match self {
            BidiGlobalDir::Ltr => Dir::Ltr,
            BidiGlobalDir::Rtl => Dir::Rtl,
        }
    }

    pub fn from_is_rtl(is_rtl: bool) -> Self {
        if is_rtl {
            BidiGlobalDir::Rtl
        } else {
            BidiGlobalDir::Ltr
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedContent {
    content: String,
    kind: ContentKind,
    dir: Option<Dir>,
}

impl SanitizedContent {
    pub(crate) fn ordain_as_safe(
        content: impl Into<String>,
        kind: ContentKind,
        dir: Option<Dir>,
    ) -> Self {
        Self {
            content: content.into(),
            kind,
            dir,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_kind(&self) -> ContentKind {
        self.kind
    }

    pub fn content_direction(&self) -> Option<Dir> {
        self.dir
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SoyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<SoyValue>),
    Map(BTreeMap<String, SoyValue>),
    Sanitized(SanitizedContent),
}

impl SoyValue {
    pub fn string(s: impl Into<String>) -> Self {
        SoyValue::String(s.into())
    }

    /// Test-and-fixture constructor for content an upstream escaper produced.
    pub fn html(content: impl Into<String>, dir: Option<Dir>) -> Self {
        SoyValue::Sanitized(SanitizedContent::ordain_as_safe(
            content,
            ContentKind::Html,
            dir,
        ))
    }

    pub fn as_sanitized(&self) -> Option<&SanitizedContent> {
        match self {
            SoyValue::Sanitized(s) => Some(s),
            _ => None,
        }
    }

    pub fn coerce_to_string(&self) -> String {
        match self {
            SoyValue::Null => "null".to_string(),
            SoyValue::Bool(b) => b.to_string(),
            SoyValue::Integer(i) => i.to_string(),
            SoyValue::Float(f) => format_float(*f),
            SoyValue::String(s) => s.clone(),
            SoyValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.coerce_to_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            SoyValue::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.coerce_to_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            SoyValue::Sanitized(s) => s.content.clone(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SoyValue::Integer(_) | SoyValue::Float(_))
    }

    pub fn number_value(&self) -> Option<f64> {
        match self {
            SoyValue::Integer(i) => Some(*i as f64),
            SoyValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// String-shaped directive output: either plain string data or ordained
/// sanitized content.
pub(crate) fn string_or_html(
    result: String,
    original: &SoyValue,
    dir_override: Option<Option<Dir>>,
) -> SoyValue {
    match original.as_sanitized() {
        Some(sanitized) if sanitized.content_kind() == ContentKind::Html => {
            let dir = dir_override.unwrap_or(sanitized.content_direction());
            SoyValue::Sanitized(SanitizedContent::ordain_as_safe(
                result,
                ContentKind::Html,
                dir,
            ))
        }
        _ => SoyValue::String(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(SoyValue::Null.coerce_to_string(), "null");
        assert_eq!(SoyValue::Integer(3).coerce_to_string(), "3");
        assert_eq!(SoyValue::Float(2.0).coerce_to_string(), "2.0");
        assert_eq!(SoyValue::Float(2.5).coerce_to_string(), "2.5");
        assert_eq!(
            SoyValue::List(vec![SoyValue::Integer(1), SoyValue::string("a")]).coerce_to_string(),
            "[1, a]"
        );
        assert_eq!(SoyValue::html("<b>x</b>", None).coerce_to_string(), "<b>x</b>");
    }

    #[test]
    fn test_non_html_sanitized_content_becomes_plain_string() {
        let css = SoyValue::Sanitized(SanitizedContent::ordain_as_safe(
            "a{}",
            ContentKind::Css,
            Some(Dir::Ltr),
        ));
        assert_eq!(
            string_or_html("a{}".to_string(), &css, None),
            SoyValue::string("a{}")
        );
    }
}
