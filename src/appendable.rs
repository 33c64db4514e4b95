//! Output sinks used at render time.
//!
//! A sink accepts incremental text and is told when a logging block opens and
//! closes, or when a logging function is printed. Sinks that don't log ignore
//! the hooks and print the placeholder.

use std::fmt;
use std::io;

use crate::data::SoyValue;

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error(transparent)]
    Fmt(#[from] fmt::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("range {start}..{end} is not a char-aligned slice of a {len}-byte string")]
    InvalidRange { start: usize, end: usize, len: usize },
}

pub type AppendResult = Result<(), AppendError>;

/// Opening of a logging block at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct LogStatement {
    pub id: i64,
    pub metadata: Option<SoyValue>,
    pub logonly: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingFunctionInvocation {
    pub function_name: String,
    pub placeholder_value: String,
    pub args: Vec<SoyValue>,
}

pub trait LoggingAdvisingAppendable {
    fn append_str(&mut self, s: &str) -> AppendResult;

    fn append_char(&mut self, c: char) -> AppendResult {
        let mut buf = [0u8; 4];
        self.append_str(c.encode_utf8(&mut buf))
    }

    /// Appends `s[start..end]`. Offsets are in bytes.
    fn append_range(&mut self, s: &str, start: usize, end: usize) -> AppendResult {
        let slice = s.get(start..end).ok_or(AppendError::InvalidRange {
            start,
            end,
            len: s.len(),
        })?;
        self.append_str(slice)
    }

    fn enter_loggable_element(&mut self, _statement: &LogStatement) -> AppendResult {
        Ok(())
    }

    fn exit_loggable_element(&mut self) -> AppendResult {
        Ok(())
    }

    fn append_logging_function_invocation(
        &mut self,
        invocation: &LoggingFunctionInvocation,
    ) -> AppendResult {
        self.append_str(&invocation.placeholder_value)
    }
}

impl LoggingAdvisingAppendable for String {
    fn append_str(&mut self, s: &str) -> AppendResult {
        self.push_str(s);
        Ok(())
    }

    fn append_char(&mut self, c: char) -> AppendResult {
        self.push(c);
        Ok(())
    }
}

impl<A: LoggingAdvisingAppendable + ?Sized> LoggingAdvisingAppendable for &mut A {
    fn append_str(&mut self, s: &str) -> AppendResult {
        (**self).append_str(s)
    }

    fn append_char(&mut self, c: char) -> AppendResult {
        (**self).append_char(c)
    }

    fn append_range(&mut self, s: &str, start: usize, end: usize) -> AppendResult {
        (**self).append_range(s, start, end)
    }

    fn enter_loggable_element(&mut self, statement: &LogStatement) -> AppendResult {
        (**self).enter_loggable_element(statement)
    }

    fn exit_loggable_element(&mut self) -> AppendResult {
        (**self).exit_loggable_element()
    }

    fn append_logging_function_invocation(
        &mut self,
        invocation: &LoggingFunctionInvocation,
    ) -> AppendResult {
        (**self).append_logging_function_invocation(invocation)
    }
}

/// Adapts any `io::Write` as a non-logging sink.
#[derive(Debug)]
pub struct WriterAppendable<W: io::Write> {
    writer: W,
}

impl<W: io::Write> WriterAppendable<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> AppendResult {
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: io::Write> LoggingAdvisingAppendable for WriterAppendable<W> {
    fn append_str(&mut self, s: &str) -> AppendResult {
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_hooks_print_placeholder() {
        let mut out = String::new();
        out.enter_loggable_element(&LogStatement {
            id: 1,
            metadata: None,
            logonly: false,
        })
        .unwrap();
        out.append_logging_function_invocation(&LoggingFunctionInvocation {
            function_name: "track".to_string(),
            placeholder_value: "zSoyz".to_string(),
            args: vec![SoyValue::Integer(1)],
        })
        .unwrap();
        out.exit_loggable_element().unwrap();
        assert_eq!(out, "zSoyz");
    }

    #[test]
    fn test_append_range_rejects_split_char() {
        let mut out = String::new();
        out.append_range("héllo", 0, 2).unwrap_err();
        out.append_range("héllo", 1, 3).unwrap();
        assert_eq!(out, "é");
    }

    #[test]
    fn test_writer_appendable() {
        let mut sink = WriterAppendable::new(Vec::new());
        sink.append_str("a").unwrap();
        sink.append_char('→').unwrap();
        sink.append_range("xyz", 1, 2).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "a→y");
    }
}
