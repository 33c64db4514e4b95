//! Basic print directives: `|changeNewlineToBr`, `|insertWordBreaks`, `|truncate`.
//!
//! ## Invariants
//!
//! 1. Streaming output equals whole-string output for every way of splitting
//!    the input into appends on the same sink.
//! 2. HTML sanitized input stays HTML and keeps its declared direction. Any
//!    other input comes back as a plain string.

use lazy_static::lazy_static;
use regex::Regex;

use crate::appendable::{
    AppendResult, LogStatement, LoggingAdvisingAppendable, LoggingFunctionInvocation,
};
use crate::data::{string_or_html, SoyValue};

const BR: &str = "<br>";
const WBR: &str = "<wbr>";
const ELLIPSIS: &str = "...";

lazy_static! {
    static ref NEWLINE_PATTERN: Regex = Regex::new(r"\r\n|\r|\n").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// |changeNewlineToBr
// ═══════════════════════════════════════════════════════════════════════════════

pub fn change_newline_to_br(value: &SoyValue) -> SoyValue {
    let text = value.coerce_to_string();
    let result = NEWLINE_PATTERN.replace_all(&text, BR).into_owned();
    string_or_html(result, value, None)
}

/// Wraps `delegate` so that every newline written through it becomes `<br>`.
pub fn change_newline_to_br_streaming<A: LoggingAdvisingAppendable>(
    delegate: A,
) -> NewlineToBrAppendable<A> {
    NewlineToBrAppendable {
        delegate,
        last_char_was_carriage_return: false,
    }
}

/// Sink state carries a pending `\r` across appends so a `\r\n` split between
/// two appends still produces a single `<br>`.
#[derive(Debug)]
pub struct NewlineToBrAppendable<A> {
    delegate: A,
    last_char_was_carriage_return: bool,
}

impl<A> NewlineToBrAppendable<A> {
    pub fn get_ref(&self) -> &A {
        &self.delegate
    }

    pub fn into_inner(self) -> A {
        self.delegate
    }
}

impl<A: LoggingAdvisingAppendable> NewlineToBrAppendable<A> {
    fn flush_run(&mut self, s: &str, start: usize, end: usize) -> AppendResult {
        if start != end {
            self.delegate.append_range(s, start, end)?;
        }
        Ok(())
    }
}

impl<A: LoggingAdvisingAppendable> LoggingAdvisingAppendable for NewlineToBrAppendable<A> {
    fn append_str(&mut self, s: &str) -> AppendResult {
        self.append_range(s, 0, s.len())
    }

    fn append_char(&mut self, c: char) -> AppendResult {
        match c {
            '\n' => {
                if !self.last_char_was_carriage_return {
                    self.delegate.append_str(BR)?;
                }
                self.last_char_was_carriage_return = false;
            }
            '\r' => {
                self.delegate.append_str(BR)?;
                self.last_char_was_carriage_return = true;
            }
            _ => {
                self.delegate.append_char(c)?;
                self.last_char_was_carriage_return = false;
            }
        }
        Ok(())
    }

    fn append_range(&mut self, s: &str, start: usize, end: usize) -> AppendResult {
        let Some(range) = s.get(start..end) else {
            return self.delegate.append_range(s, start, end);
        };
        let mut appended_up_to = start;
        let mut carriage_return = self.last_char_was_carriage_return;
        // '\r' and '\n' are single bytes and never appear inside a multi-byte char.
        for (offset, byte) in range.bytes().enumerate() {
            let i = start + offset;
            match byte {
                b'\n' => {
                    self.flush_run(s, appended_up_to, i)?;
                    if !carriage_return {
                        self.delegate.append_str(BR)?;
                    }
                    appended_up_to = i + 1;
                    carriage_return = false;
                }
                b'\r' => {
                    self.flush_run(s, appended_up_to, i)?;
                    self.delegate.append_str(BR)?;
                    appended_up_to = i + 1;
                    carriage_return = true;
                }
                _ => carriage_return = false,
            }
        }
        self.flush_run(s, appended_up_to, end)?;
        self.last_char_was_carriage_return = carriage_return;
        Ok(())
    }

    fn enter_loggable_element(&mut self, statement: &LogStatement) -> AppendResult {
        self.delegate.enter_loggable_element(statement)
    }

    fn exit_loggable_element(&mut self) -> AppendResult {
        self.delegate.exit_loggable_element()
    }

    fn append_logging_function_invocation(
        &mut self,
        invocation: &LoggingFunctionInvocation,
    ) -> AppendResult {
        self.delegate.append_logging_function_invocation(invocation)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// |insertWordBreaks
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordBreakMode {
    Normal,
    InTag,
    MaybeInEntity,
}

/// Inserts `<wbr>` so that no run of visible non-space characters is longer
/// than `max_chars_between_word_breaks`. Markup inside tags is not counted and
/// an entity counts as one character.
pub fn insert_word_breaks(value: &SoyValue, max_chars_between_word_breaks: usize) -> SoyValue {
    let text = value.coerce_to_string();
    let mut result = String::with_capacity(text.len());

    let mut mode = WordBreakMode::Normal;
    let mut chars_without_break = 0usize;

    for c in text.chars() {
        if chars_without_break >= max_chars_between_word_breaks && c != ' ' {
            result.push_str(WBR);
            chars_without_break = 0;
        }

        match mode {
            WordBreakMode::InTag => {
                if c == '>' {
                    mode = WordBreakMode::Normal;
                }
            }
            WordBreakMode::MaybeInEntity => match c {
                ';' => {
                    mode = WordBreakMode::Normal;
                    chars_without_break += 1;
                }
                '<' => mode = WordBreakMode::InTag,
                ' ' => {
                    mode = WordBreakMode::Normal;
                    chars_without_break = 0;
                }
                _ => {}
            },
            WordBreakMode::Normal => match c {
                '<' => mode = WordBreakMode::InTag,
                '&' => mode = WordBreakMode::MaybeInEntity,
                ' ' => chars_without_break = 0,
                _ => chars_without_break += 1,
            },
        }

        result.push(c);
    }

    string_or_html(result, value, None)
}

// ═══════════════════════════════════════════════════════════════════════════════
// |truncate
// ═══════════════════════════════════════════════════════════════════════════════

/// Truncates to at most `max_len` UTF-16 code units, reserving room for `...`
/// when `add_ellipsis` is set and `max_len > 3`. A surrogate pair is never split.
pub fn truncate(s: &str, max_len: usize, add_ellipsis: bool) -> String {
    if s.encode_utf16().count() <= max_len {
        return s.to_string();
    }
    let (max_len, add_ellipsis) = match add_ellipsis {
        true if max_len > 3 => (max_len - 3, true),
        _ => (max_len, false),
    };

    let mut units = 0;
    let mut cut = 0;
    for (i, c) in s.char_indices() {
        if units + c.len_utf16() > max_len {
            break;
        }
        units += c.len_utf16();
        cut = i + c.len_utf8();
    }

    let mut result = s[..cut].to_string();
    if add_ellipsis {
        result.push_str(ELLIPSIS);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dir, SoyValue};

    #[test]
    fn test_change_newline_to_br() {
        assert_eq!(
            change_newline_to_br(&SoyValue::string("a\r\nb\rc\nd\n\re")),
            SoyValue::string("a<br>b<br>c<br>d<br><br>e")
        );
        assert_eq!(
            change_newline_to_br(&SoyValue::html("x\ny", Some(Dir::Rtl))),
            SoyValue::html("x<br>y", Some(Dir::Rtl))
        );
        assert_eq!(change_newline_to_br(&SoyValue::Null), SoyValue::string("null"));
    }

    #[test]
    fn test_streaming_newlines_single_append() {
        let mut sink = change_newline_to_br_streaming(String::new());
        sink.append_str("a\r\nb\n\nc\r").unwrap();
        assert_eq!(sink.into_inner(), "a<br>b<br><br>c<br>");
    }

    #[test]
    fn test_streaming_newlines_char_appends() {
        let mut sink = change_newline_to_br_streaming(String::new());
        for c in "x\r\ny\r\rz".chars() {
            sink.append_char(c).unwrap();
        }
        assert_eq!(sink.into_inner(), "x<br>y<br><br>z");
    }

    #[test]
    fn test_streaming_state_belongs_to_the_sink() {
        let mut first = change_newline_to_br_streaming(String::new());
        first.append_str("a\r").unwrap();
        let mut second = change_newline_to_br_streaming(first.into_inner());
        second.append_str("\nb").unwrap();
        assert_eq!(second.into_inner(), "a<br><br>b");
    }

    #[test]
    fn test_insert_word_breaks() {
        let cases = [
            ("abcdef", 3, "abc<wbr>def"),
            ("abc def", 3, "abc def"),
            ("abcd", 10, "abcd"),
            ("<b>abcd</b>", 2, "<b>ab<wbr>cd<wbr></b>"),
            ("a&amp;bc", 2, "a&amp;<wbr>bc"),
            ("&a b", 2, "&a b"),
            ("&ab<i>c", 1, "&ab<i>c"),
            ("aaaaaaaaaa", 5, "aaaaa<wbr>aaaaa"),
            ("&amp;aaaaaaaaaa", 5, "&amp;aaaa<wbr>aaaaa<wbr>a"),
            // Attribute values inside a tag never count towards a run.
            ("<a href=\"aaaaaaaaaa\">", 5, "<a href=\"aaaaaaaaaa\">"),
        ];
        for (input, max, expected) in cases {
            assert_eq!(
                insert_word_breaks(&SoyValue::string(input), max),
                SoyValue::string(expected),
                "insert_word_breaks({:?}, {})",
                input,
                max
            );
        }
    }

    #[test]
    fn test_insert_word_breaks_keeps_html_direction() {
        assert_eq!(
            insert_word_breaks(&SoyValue::html("abcd", Some(Dir::Ltr)), 2),
            SoyValue::html("ab<wbr>cd", Some(Dir::Ltr))
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 10, true), "abcdef");
        assert_eq!(truncate("abcdefgh", 6, true), "abc...");
        assert_eq!(truncate("abcdef", 3, true), "abc");
        assert_eq!(truncate("abcdef", 4, false), "abcd");
        // "a😀b" is 4 UTF-16 units; cutting at 2 would split the pair.
        assert_eq!(truncate("a😀b", 2, false), "a");
        assert_eq!(truncate("a😀b", 3, false), "a😀");
    }
}
