use std::{borrow::Cow, error::Error, fmt};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Syntax error found while parsing a template.
///
/// `pos` is a byte offset into the parsed source.
/// Mapping it to line and column is left to the caller.
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub pos: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// `{{`, `{%`, `{#`, `<` or a `raw` block without its closer before end of input.
    UnterminatedDelimiter,
    /// A token appears where no production accepts it.
    UnexpectedToken(&'static str),
    /// The word after `{%` is not a statement keyword.
    UnknownStatementKeyword,
    MalformedNumericLiteral,
    UnterminatedStringLiteral,
    /// Elements or expressions are nested deeper than `ParseOptions::max_depth`.
    NestingTooDeep,
}

impl SyntaxError {
    /// Human-readable reason, without position.
    pub fn message(&self) -> Cow<'static, str> {
        match self.kind {
            SyntaxErrorKind::UnterminatedDelimiter => "unterminated delimiter".into(),
            SyntaxErrorKind::UnexpectedToken(expected) => {
                format!("unexpected token, expect {expected}").into()
            }
            SyntaxErrorKind::UnknownStatementKeyword => "unknown statement keyword".into(),
            SyntaxErrorKind::MalformedNumericLiteral => "malformed numeric literal".into(),
            SyntaxErrorKind::UnterminatedStringLiteral => "unterminated string literal".into(),
            SyntaxErrorKind::NestingTooDeep => "nesting too deep".into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error '{}' at position {}", self.message(), self.pos)
    }
}

impl Error for SyntaxError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Returned by [`parse_cancellable`](crate::parse_cancellable)
/// when the cancellation flag was raised between two top-level items.
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("parsing was cancelled")
    }
}

impl Error for Cancelled {}
