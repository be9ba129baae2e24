//! Splits raw script text into executable statements.
//!
//! This is not a SQL parser. The tokenizer understands just enough
//! lexical structure to find statement boundaries: string literals
//! (including dialect-specific alternate open quotes such as SQL
//! Server's `N'`), line and block comments, and the active delimiter.
//! Delimiters inside any quote or comment are inert.

use crate::error::{MigrateError, Result};
use crate::script::delimiter::Delimiter;

/// Dialect hook for alternate string-literal quoting.
///
/// Some dialects open a string with a multi-character token that closes
/// with a different one (`N'...'`). The tokenizer asks the dialect at
/// every position in NORMAL state; the default detects nothing.
pub trait AlternateQuoteRules {
    /// If `text` starts with an alternate open quote, return that open
    /// token.
    fn detect_alternate_open_quote(&self, text: &str) -> Option<String> {
        let _ = text;
        None
    }

    /// The close token matching an alternate open quote.
    fn alternate_close_quote(&self, open_quote: &str) -> String {
        let _ = open_quote;
        "'".to_string()
    }
}

/// Quote rules with no alternate quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlternateQuotes;

impl AlternateQuoteRules for NoAlternateQuotes {}

/// One executable statement produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// Line in the original script where the statement starts.
    pub line_number: u32,

    /// Statement text, trimmed, without its delimiter.
    pub sql: String,
}

enum State {
    Normal,
    SingleQuote { open_line: u32 },
    AlternateQuote { close: String, open_line: u32 },
    BlockComment { open_line: u32 },
}

/// Statement-splitting state machine.
///
/// Restartable: each [`tokenize`](StatementTokenizer::tokenize) call is
/// independent.
pub struct StatementTokenizer<'a> {
    delimiter: Delimiter,
    quotes: &'a dyn AlternateQuoteRules,
}

impl<'a> StatementTokenizer<'a> {
    /// Create a tokenizer for the given delimiter and quote rules.
    pub fn new(delimiter: Delimiter, quotes: &'a dyn AlternateQuoteRules) -> Self {
        Self { delimiter, quotes }
    }

    /// Split `text` into statements.
    ///
    /// `script` names the source in error messages. Ending inside a
    /// string literal or block comment is a malformed-script error; a
    /// trailing statement without a delimiter is emitted as long as it
    /// contains something other than whitespace and comments.
    pub fn tokenize(&self, script: &str, text: &str) -> Result<Vec<SqlStatement>> {
        let mut statements = Vec::new();
        let mut state = State::Normal;
        let mut buf = String::new();
        let mut has_content = false;
        let mut statement_line = 1u32;
        let mut line_no = 0u32;

        for line in text.lines() {
            line_no += 1;

            if matches!(state, State::Normal)
                && self.delimiter.standalone_line
                && line.trim().eq_ignore_ascii_case(&self.delimiter.token)
            {
                Self::flush(&mut statements, &mut buf, &mut has_content, statement_line);
                continue;
            }

            let mut i = 0;
            while i < line.len() {
                let rest = &line[i..];
                match &state {
                    State::Normal => {
                        if rest.starts_with("--") {
                            // Line comment: inert until the newline.
                            buf.push_str(rest);
                            break;
                        }
                        if rest.starts_with("/*") {
                            buf.push_str("/*");
                            i += 2;
                            state = State::BlockComment { open_line: line_no };
                            continue;
                        }
                        if let Some(open) = self.quotes.detect_alternate_open_quote(rest) {
                            let close = self.quotes.alternate_close_quote(&open);
                            if !has_content {
                                statement_line = line_no;
                                has_content = true;
                            }
                            i += open.len();
                            buf.push_str(&open);
                            state = State::AlternateQuote {
                                close,
                                open_line: line_no,
                            };
                            continue;
                        }
                        if rest.starts_with('\'') {
                            if !has_content {
                                statement_line = line_no;
                                has_content = true;
                            }
                            buf.push('\'');
                            i += 1;
                            state = State::SingleQuote { open_line: line_no };
                            continue;
                        }
                        if !self.delimiter.standalone_line && self.matches_delimiter(rest) {
                            i += self.delimiter.token.len();
                            Self::flush(&mut statements, &mut buf, &mut has_content, statement_line);
                            continue;
                        }
                        let ch = rest.chars().next().expect("non-empty rest");
                        if !ch.is_whitespace() && !has_content {
                            statement_line = line_no;
                            has_content = true;
                        }
                        buf.push(ch);
                        i += ch.len_utf8();
                    }
                    State::SingleQuote { .. } => {
                        if rest.starts_with("''") {
                            buf.push_str("''");
                            i += 2;
                            continue;
                        }
                        if rest.starts_with('\'') {
                            buf.push('\'');
                            i += 1;
                            state = State::Normal;
                            continue;
                        }
                        let ch = rest.chars().next().expect("non-empty rest");
                        buf.push(ch);
                        i += ch.len_utf8();
                    }
                    State::AlternateQuote { close, .. } => {
                        let close = close.clone();
                        if rest.len() >= close.len() * 2
                            && rest.starts_with(&close)
                            && rest[close.len()..].starts_with(&close)
                        {
                            // Doubled close token is an escape.
                            buf.push_str(&close);
                            buf.push_str(&close);
                            i += close.len() * 2;
                            continue;
                        }
                        if rest.starts_with(&close) {
                            buf.push_str(&close);
                            i += close.len();
                            state = State::Normal;
                            continue;
                        }
                        let ch = rest.chars().next().expect("non-empty rest");
                        buf.push(ch);
                        i += ch.len_utf8();
                    }
                    State::BlockComment { .. } => {
                        if rest.starts_with("*/") {
                            buf.push_str("*/");
                            i += 2;
                            state = State::Normal;
                            continue;
                        }
                        let ch = rest.chars().next().expect("non-empty rest");
                        buf.push(ch);
                        i += ch.len_utf8();
                    }
                }
            }

            if !buf.is_empty() {
                buf.push('\n');
            }
        }

        match state {
            State::Normal => {
                Self::flush(&mut statements, &mut buf, &mut has_content, statement_line);
                Ok(statements)
            }
            State::SingleQuote { open_line } | State::AlternateQuote { open_line, .. } => {
                Err(MigrateError::MalformedScript {
                    script: script.to_string(),
                    line: open_line,
                    message: "unterminated string literal".to_string(),
                })
            }
            State::BlockComment { open_line } => Err(MigrateError::MalformedScript {
                script: script.to_string(),
                line: open_line,
                message: "unterminated block comment".to_string(),
            }),
        }
    }

    fn matches_delimiter(&self, rest: &str) -> bool {
        rest.get(..self.delimiter.token.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.delimiter.token))
    }

    fn flush(
        statements: &mut Vec<SqlStatement>,
        buf: &mut String,
        has_content: &mut bool,
        statement_line: u32,
    ) {
        let trimmed = buf.trim();
        // Whitespace- or comment-only buffers are discarded.
        if *has_content && !trimmed.is_empty() {
            statements.push(SqlStatement {
                line_number: statement_line,
                sql: trimmed.to_string(),
            });
        }
        buf.clear();
        *has_content = false;
    }
}
