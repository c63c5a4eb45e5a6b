//! Mode-switching scanner.
//!
//! The lexer never decides the mode on its own:
//! the parser knows what it expects at each position and asks for a token in that mode.
//! Lexing is a pure function of the position and the mode,
//! so backtracking is just resetting the cursor.

use crate::{
    error::{SyntaxError, SyntaxErrorKind},
    tree::Span,
};
use aho_corasick::{AhoCorasick, MatchKind};
use memchr::memmem;
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Outside any delimiter.
    Text,
    /// Inside `{{ }}` or `{% %}`, where an operator or a closer is expected.
    Code,
    /// Inside `{{ }}` or `{% %}`, where an operand is expected.
    /// Only here a sign or a dot can start a number.
    Operand,
    /// Inside a tag header, between `<` and `>` or `/>`.
    Tag,
    /// Inside `{# #}`.
    Comment,
    /// Body of a `raw` block.
    Raw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    CommentContent,
    RawText,

    ValueOpen,
    ValueClose,
    StatementOpen,
    StatementClose,
    CommentOpen,
    CommentClose,
    /// `-` touching `%}`.
    Trim,

    TagOpen,
    EndTagOpen,
    TagClose,
    SelfClose,

    Ident,
    Str,
    Int,
    Float,

    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,

    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Token {
    pub(crate) fn span(&self) -> Span {
        self.start..self.end
    }
}

/// Everything that ends a run of literal text.
pub(crate) static TEXT_STOP_AC: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostFirst)
        .build(["{{", "{%", "{#", "<"])
        .unwrap()
});

#[derive(Clone)]
pub(crate) struct Lexer<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn bump(&mut self, token: &Token) {
        self.pos = token.end;
    }

    pub(crate) fn slice(&self, token: &Token) -> &'s str {
        &self.source[token.start..token.end]
    }

    /// Lex the token at the cursor without consuming it.
    pub(crate) fn peek(&self, mode: Mode) -> Result<Token, SyntaxError> {
        match mode {
            Mode::Text => Ok(self.lex_text()),
            Mode::Code => self.lex_code(self.skip_ws(self.pos), false),
            Mode::Operand => self.lex_code(self.skip_ws(self.pos), true),
            Mode::Tag => self.lex_tag(self.skip_ws(self.pos)),
            Mode::Comment => Ok(self.lex_comment()),
            Mode::Raw => Ok(self.lex_raw()),
        }
    }

    /// Lex and consume the token at the cursor.
    pub(crate) fn next(&mut self, mode: Mode) -> Result<Token, SyntaxError> {
        let token = self.peek(mode)?;
        self.bump(&token);
        Ok(token)
    }

    fn skip_ws(&self, mut pos: usize) -> usize {
        let bytes = self.source.as_bytes();
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        pos
    }

    fn token(&self, kind: TokenKind, start: usize, len: usize) -> Token {
        Token {
            kind,
            start,
            end: start + len,
        }
    }

    fn lex_text(&self) -> Token {
        let rest = &self.source[self.pos..];
        let start = self.pos;
        if rest.is_empty() {
            return self.token(TokenKind::Eof, start, 0);
        }
        if rest.starts_with("{{") {
            return self.token(TokenKind::ValueOpen, start, 2);
        }
        if rest.starts_with("{%") {
            return self.token(TokenKind::StatementOpen, start, 2);
        }
        if rest.starts_with("{#") {
            return self.token(TokenKind::CommentOpen, start, 2);
        }
        if rest.starts_with("</") {
            return self.token(TokenKind::EndTagOpen, start, 2);
        }
        if rest.starts_with('<') {
            return self.token(TokenKind::TagOpen, start, 1);
        }

        let len = TEXT_STOP_AC
            .find(rest)
            .map(|found| found.start())
            .unwrap_or(rest.len());
        self.token(TokenKind::Text, start, len)
    }

    fn lex_comment(&self) -> Token {
        let rest = &self.source.as_bytes()[self.pos..];
        match memmem::find(rest, b"#}") {
            Some(0) => self.token(TokenKind::CommentClose, self.pos, 2),
            Some(len) => self.token(TokenKind::CommentContent, self.pos, len),
            None if rest.is_empty() => self.token(TokenKind::Eof, self.pos, 0),
            None => self.token(TokenKind::CommentContent, self.pos, rest.len()),
        }
    }

    /// The raw body stops before the `{%` of the first `endraw` statement.
    fn lex_raw(&self) -> Token {
        let bytes = self.source.as_bytes();
        let rest = &bytes[self.pos..];
        let len = memmem::find_iter(rest, b"{%")
            .find(|offset| {
                let mut i = self.pos + offset + 2;
                if bytes.get(i) == Some(&b'-') {
                    i += 1;
                }
                i = self.skip_ws(i);
                bytes[i..].starts_with(b"endraw")
                    && !bytes.get(i + 6).copied().is_some_and(is_ident_char)
            })
            .unwrap_or(rest.len());
        self.token(TokenKind::RawText, self.pos, len)
    }

    fn lex_tag(&self, start: usize) -> Result<Token, SyntaxError> {
        let bytes = self.source.as_bytes();
        match bytes.get(start) {
            None => Ok(self.token(TokenKind::Eof, start, 0)),
            Some(b'>') => Ok(self.token(TokenKind::TagClose, start, 1)),
            Some(b'/') if bytes.get(start + 1) == Some(&b'>') => {
                Ok(self.token(TokenKind::SelfClose, start, 2))
            }
            Some(b'=') => Ok(self.token(TokenKind::Assign, start, 1)),
            Some(b'{') if bytes.get(start + 1) == Some(&b'{') => {
                Ok(self.token(TokenKind::ValueOpen, start, 2))
            }
            Some(quote @ (b'"' | b'\'')) => self.lex_string(start, *quote),
            Some(c) if c.is_ascii_alphabetic() => {
                let mut end = start + 1;
                while bytes
                    .get(end)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'-')
                {
                    end += 1;
                }
                Ok(self.token(TokenKind::Ident, start, end - start))
            }
            Some(..) => Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedToken("attribute, `>` or `/>`"),
                pos: start,
            }),
        }
    }

    fn lex_code(&self, start: usize, operand: bool) -> Result<Token, SyntaxError> {
        let bytes = self.source.as_bytes();
        let Some(&c) = bytes.get(start) else {
            return Ok(self.token(TokenKind::Eof, start, 0));
        };
        let next = bytes.get(start + 1).copied();
        let starts_number = |i: usize| match bytes.get(i) {
            Some(c) if c.is_ascii_digit() => true,
            Some(b'.') => bytes.get(i + 1).is_some_and(u8::is_ascii_digit),
            _ => false,
        };

        let (kind, len) = match c {
            b'}' if next == Some(b'}') => (TokenKind::ValueClose, 2),
            b'%' if next == Some(b'}') => (TokenKind::StatementClose, 2),
            b'-' if self.source[start + 1..].starts_with("%}") => (TokenKind::Trim, 1),
            b'0'..=b'9' => return self.lex_number(start),
            b'.' | b'+' | b'-' if operand && starts_number(start + usize::from(c != b'.')) => {
                return self.lex_number(start);
            }
            b'"' | b'\'' => return self.lex_string(start, c),
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let len = bytes[start..]
                    .iter()
                    .take_while(|c| is_ident_char(**c))
                    .count();
                (TokenKind::Ident, len)
            }
            b'=' if next == Some(b'=') => (TokenKind::EqEq, 2),
            b'!' if next == Some(b'=') => (TokenKind::NotEq, 2),
            b'<' if next == Some(b'=') => (TokenKind::LtEq, 2),
            b'>' if next == Some(b'=') => (TokenKind::GtEq, 2),
            b'*' if next == Some(b'*') => (TokenKind::StarStar, 2),
            b'/' if next == Some(b'/') => (TokenKind::SlashSlash, 2),
            b'=' => (TokenKind::Assign, 1),
            b'<' => (TokenKind::Lt, 1),
            b'>' => (TokenKind::Gt, 1),
            b'+' => (TokenKind::Plus, 1),
            b'-' => (TokenKind::Minus, 1),
            b'*' => (TokenKind::Star, 1),
            b'/' => (TokenKind::Slash, 1),
            b'%' => (TokenKind::Percent, 1),
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b'[' => (TokenKind::LBracket, 1),
            b']' => (TokenKind::RBracket, 1),
            b'{' => (TokenKind::LBrace, 1),
            b'}' => (TokenKind::RBrace, 1),
            b',' => (TokenKind::Comma, 1),
            b':' => (TokenKind::Colon, 1),
            b'.' => (TokenKind::Dot, 1),
            _ => {
                return Err(SyntaxError {
                    kind: SyntaxErrorKind::UnexpectedToken("expression"),
                    pos: start,
                });
            }
        };
        Ok(self.token(kind, start, len))
    }

    /// Only a backslash followed by the same quote escapes.
    fn lex_string(&self, start: usize, quote: u8) -> Result<Token, SyntaxError> {
        let bytes = self.source.as_bytes();
        let mut i = start + 1;
        loop {
            match bytes.get(i) {
                None => {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::UnterminatedStringLiteral,
                        pos: start,
                    });
                }
                Some(b'\\') if bytes.get(i + 1) == Some(&quote) => i += 2,
                Some(c) if *c == quote => {
                    return Ok(self.token(TokenKind::Str, start, i + 1 - start));
                }
                Some(..) => i += 1,
            }
        }
    }

    fn lex_number(&self, start: usize) -> Result<Token, SyntaxError> {
        let bytes = self.source.as_bytes();
        let malformed = SyntaxError {
            kind: SyntaxErrorKind::MalformedNumericLiteral,
            pos: start,
        };

        let mut i = start;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let int_end = scan_digits(bytes, i);
        let mut end = int_end;
        let mut is_float = false;

        if bytes.get(end) == Some(&b'.') {
            let frac_end = scan_digits(bytes, end + 1);
            if int_end > i || frac_end > end + 1 {
                is_float = true;
                end = frac_end;
            }
        }
        if end == i {
            return Err(malformed);
        }

        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            let exp_end = scan_digits(bytes, exp);
            if exp_end == exp {
                return Err(malformed);
            }
            is_float = true;
            end = exp_end;
        }

        if bytes.get(end).copied().is_some_and(is_ident_char) {
            return Err(malformed);
        }

        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Int
        };
        Ok(self.token(kind, start, end - start))
    }
}

/// Digit group: a digit, then digits and single `_` separators.
/// Returns `start` when there's no digit.
///
/// Stops before `__`, which then reads as a trailing identifier character.
fn scan_digits(bytes: &[u8], start: usize) -> usize {
    if !bytes.get(start).is_some_and(u8::is_ascii_digit) {
        return start;
    }
    let mut end = start + 1;
    loop {
        match bytes.get(end) {
            Some(c) if c.is_ascii_digit() => end += 1,
            Some(b'_') if bytes.get(end + 1) != Some(&b'_') => end += 1,
            _ => return end,
        }
    }
}

pub(crate) fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, mode: Mode) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut kinds = vec![];
        loop {
            let token = lexer.next(mode).unwrap();
            kinds.push(token.kind);
            if token.kind == TokenKind::Eof {
                return kinds;
            }
        }
    }

    #[test]
    fn text_stops_at_openers() {
        let lexer = Lexer::new("a { b {{ c");
        let token = lexer.peek(Mode::Text).unwrap();
        assert_eq!(token.kind, TokenKind::Text);
        assert_eq!(lexer.slice(&token), "a { b ");

        let lexer = Lexer::new("x<y");
        assert_eq!(lexer.peek(Mode::Text).unwrap().end, 1);

        let lexer = Lexer::new("tail {");
        assert_eq!(lexer.peek(Mode::Text).unwrap().end, 6);
    }

    #[test]
    fn text_openers() {
        let kinds = ["{{", "{%", "{#", "</", "<"]
            .iter()
            .map(|source| Lexer::new(source).peek(Mode::Text).unwrap().kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [
                TokenKind::ValueOpen,
                TokenKind::StatementOpen,
                TokenKind::CommentOpen,
                TokenKind::EndTagOpen,
                TokenKind::TagOpen,
            ]
        );
    }

    #[test]
    fn comment_content_absorbs_lone_hash() {
        let mut lexer = Lexer::new(" a # b #}");
        let token = lexer.next(Mode::Comment).unwrap();
        assert_eq!(token.kind, TokenKind::CommentContent);
        assert_eq!(lexer.slice(&token), " a # b ");
        assert_eq!(lexer.next(Mode::Comment).unwrap().kind, TokenKind::CommentClose);
        assert_eq!(lexer.next(Mode::Comment).unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn raw_body_stops_at_endraw_only() {
        let source = "{{ x %}{% endrawing %}{%- endraw -%}";
        let lexer = Lexer::new(source);
        let token = lexer.peek(Mode::Raw).unwrap();
        assert_eq!(lexer.slice(&token), "{{ x %}{% endrawing %}");
    }

    #[test]
    fn operators_and_closers() {
        assert_eq!(
            kinds("a // b ** c != d -%}", Mode::Code),
            [
                TokenKind::Ident,
                TokenKind::SlashSlash,
                TokenKind::Ident,
                TokenKind::StarStar,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::Trim,
                TokenKind::StatementClose,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("}}} %", Mode::Code),
            [
                TokenKind::ValueClose,
                TokenKind::RBrace,
                TokenKind::Percent,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn signed_numbers_only_in_operand_position() {
        assert_eq!(
            Lexer::new("-1").peek(Mode::Operand).unwrap().kind,
            TokenKind::Int
        );
        assert_eq!(
            Lexer::new("-1").peek(Mode::Code).unwrap().kind,
            TokenKind::Minus
        );
        assert_eq!(
            Lexer::new(".5").peek(Mode::Operand).unwrap().kind,
            TokenKind::Float
        );
        assert_eq!(
            Lexer::new(".5").peek(Mode::Code).unwrap().kind,
            TokenKind::Dot
        );
        assert_eq!(
            Lexer::new("- 1").peek(Mode::Operand).unwrap().kind,
            TokenKind::Minus
        );
    }

    #[test]
    fn number_shapes() {
        for (source, kind) in [
            ("1_000", TokenKind::Int),
            ("1_0_0_", TokenKind::Int),
            ("1.", TokenKind::Float),
            (".5", TokenKind::Float),
            ("1.5e-3", TokenKind::Float),
            ("2E10", TokenKind::Float),
            ("+3.", TokenKind::Float),
        ] {
            let token = Lexer::new(source).peek(Mode::Operand).unwrap();
            assert_eq!(token.kind, kind, "{source}");
            assert_eq!(token.end, source.len(), "{source}");
        }
        for source in ["1e", "1e+", "12abc", "3.5x", "1__2", "1.5__0", "2e1__0"] {
            let error = Lexer::new(source).peek(Mode::Operand).unwrap_err();
            assert_eq!(error.kind, SyntaxErrorKind::MalformedNumericLiteral, "{source}");
            assert_eq!(error.pos, 0);
        }
    }

    #[test]
    fn strings() {
        let lexer = Lexer::new(r#"'it\'s' "a\"b" 'x\"'"#);
        let token = lexer.peek(Mode::Code).unwrap();
        assert_eq!(lexer.slice(&token), r"'it\'s'");

        let mut lexer = Lexer::new(r#""a\"b" 'x\"'"#);
        let token = lexer.next(Mode::Code).unwrap();
        assert_eq!(lexer.slice(&token), r#""a\"b""#);
        let token = lexer.next(Mode::Code).unwrap();
        assert_eq!(lexer.slice(&token), r#"'x\"'"#);

        let error = Lexer::new("  'open").peek(Mode::Code).unwrap_err();
        assert_eq!(error.kind, SyntaxErrorKind::UnterminatedStringLiteral);
        assert_eq!(error.pos, 2);
    }

    #[test]
    fn tag_header() {
        assert_eq!(
            kinds(r#"data-id = "x" {{ />"#, Mode::Tag)[..5],
            [
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Str,
                TokenKind::ValueOpen,
                TokenKind::SelfClose,
            ]
        );
    }
}
