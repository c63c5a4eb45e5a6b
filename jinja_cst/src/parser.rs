//! Recursive descent parser producing the concrete syntax tree.
//!
//! Markup, statements and expressions are mutually recursive only through [`Parser::parse_item`]:
//! element bodies reuse it, statements call into expressions, expressions never call back.
//!
//! The expression grammar is ambiguous by construction and is resolved with the precedence table
//! in [`prec`] plus two fixed tie-breaks:
//!
//! - a parenthesized argument list directly after any expression is always a call
//!   (at call precedence, so `a + b(c)` calls `a + b`);
//! - a statement keyword right after `{%` always selects the statement production,
//!   even where the same word would be a valid identifier.

use crate::{
    config::ParseOptions,
    error::{Cancelled, SyntaxError, SyntaxErrorKind},
    lexer::{Lexer, Mode, TEXT_STOP_AC, Token, TokenKind},
    tree::{Field, NodeData, NodeId, Span, SyntaxKind, SyntaxTree},
};
use index_vec::IndexVec;
use std::{
    mem,
    sync::atomic::{AtomicBool, Ordering},
};

/// Binding strength of expression operators, higher binds tighter.
/// Infix and postfix operators are left-associative, prefix operators are right-associative.
mod prec {
    pub(super) const COMPARISON: u8 = 1;
    pub(super) const BINARY: u8 = 1;
    pub(super) const CALL: u8 = 1;
    pub(super) const UNARY: u8 = 2;
    pub(super) const POSTFIX: u8 = 2;
}

const END_KEYWORDS: [&str; 7] = [
    "endmacro",
    "endfor",
    "endif",
    "endblock",
    "endraw",
    "endcall",
    "endfilter",
];

pub type PResult<T> = Result<T, SyntaxError>;

/// A child waiting to be attached, with the field its parent will hold it under.
type Slot = (Option<Field>, NodeId);

#[derive(Clone, Copy)]
enum Infix {
    Comparison,
    Binary,
    Call,
    Property,
    Subscript,
}

pub(crate) struct Parser<'s> {
    source: &'s str,
    lexer: Lexer<'s>,
    nodes: IndexVec<NodeId, NodeData>,
    error_recovery: bool,
    max_depth: usize,
    depth: usize,
    errors: Vec<SyntaxError>,
}

impl<'s> Parser<'s> {
    pub(crate) fn new(source: &'s str, options: &ParseOptions) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            nodes: IndexVec::new(),
            error_recovery: options.error_recovery,
            max_depth: options.max_depth.get(),
            depth: 0,
            errors: vec![],
        }
    }

    /// Parse the whole source, one top-level item at a time.
    ///
    /// `cancel` is only checked between top-level items.
    pub(crate) fn parse_source_file(
        mut self,
        cancel: Option<&AtomicBool>,
    ) -> Result<(SyntaxTree<'s>, Vec<SyntaxError>), Cancelled> {
        let mut items = vec![];

        while self.lexer.pos() < self.source.len() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(Cancelled);
            }
            self.depth = 0;
            if !self.parse_item_or_error(&mut items) {
                break;
            }
        }

        // Errors inside elements are recorded before the element's own error.
        let mut errors = mem::take(&mut self.errors);
        errors.sort_by_key(|error| error.pos);
        errors.dedup();
        let root = self.push(SyntaxKind::SourceFile, 0..self.source.len(), items);
        Ok((SyntaxTree::new(self.source, self.nodes, root), errors))
    }

    /// Parse one item, replacing it with an `ERROR` node if it fails.
    ///
    /// Without error recovery the `ERROR` node covers the rest of the input.
    /// Returns whether parsing can go on.
    fn parse_item_or_error(&mut self, items: &mut Vec<Slot>) -> bool {
        let start = self.lexer.pos();
        let checkpoint = self.nodes.len();
        let item_count = items.len();
        let depth = self.depth;
        let Err(error) = self.parse_item(items) else {
            return true;
        };

        self.nodes.truncate(checkpoint);
        items.truncate(item_count);
        self.depth = depth;
        let end = if self.error_recovery {
            self.resync_point(start, self.lexer.pos())
        } else {
            self.source.len()
        };
        log::debug!("{error}, skipping {start}..{end}");
        items.push((None, self.push(SyntaxKind::Error, start..end, vec![])));
        self.lexer.reset(end);
        self.errors.push(error);
        self.error_recovery
    }

    /// Next place an item can start after the item at `start` failed
    /// with the lexer stopped at `failed_at`.
    fn resync_point(&self, start: usize, failed_at: usize) -> usize {
        let from = failed_at.max(start + 1);
        TEXT_STOP_AC
            .find(&self.source.as_bytes()[from..])
            .map(|found| from + found.start())
            .unwrap_or(self.source.len())
    }

    fn try_parse<F, R>(&mut self, f: F) -> PResult<R>
    where
        F: FnOnce(&mut Self) -> PResult<R>,
    {
        let pos = self.lexer.pos();
        let node_count = self.nodes.len();
        let depth = self.depth;
        let result = f(self);
        if result.is_err() {
            self.lexer.reset(pos);
            self.nodes.truncate(node_count);
            self.depth = depth;
        }
        result
    }

    /// Report running out of input inside an opener as the opener being unterminated.
    fn within<F, R>(&mut self, opener: usize, f: F) -> PResult<R>
    where
        F: FnOnce(&mut Self) -> PResult<R>,
    {
        f(self).map_err(|error| match error.kind {
            SyntaxErrorKind::UnexpectedToken(..) if error.pos >= self.source.len() => SyntaxError {
                kind: SyntaxErrorKind::UnterminatedDelimiter,
                pos: opener,
            },
            _ => error,
        })
    }

    fn enter(&mut self, pos: usize) -> PResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            Err(SyntaxError {
                kind: SyntaxErrorKind::NestingTooDeep,
                pos,
            })
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn push(&mut self, kind: SyntaxKind, span: Span, children: Vec<Slot>) -> NodeId {
        let children = children
            .into_iter()
            .map(|(field, id)| {
                self.nodes[id].field = field;
                id
            })
            .collect();
        self.nodes.push(NodeData {
            kind,
            span,
            field: None,
            children,
        })
    }

    /// Composite node spanning from its first child to its last.
    fn node(&mut self, kind: SyntaxKind, children: Vec<Slot>) -> NodeId {
        let span = match (children.first(), children.last()) {
            (Some((_, first)), Some((_, last))) => {
                self.nodes[*first].span.start..self.nodes[*last].span.end
            }
            _ => self.lexer.pos()..self.lexer.pos(),
        };
        self.push(kind, span, children)
    }

    fn leaf(&mut self, kind: SyntaxKind, token: &Token) -> NodeId {
        self.push(kind, token.span(), vec![])
    }

    fn unexpected(&self, token: &Token, expected: &'static str) -> SyntaxError {
        SyntaxError {
            kind: SyntaxErrorKind::UnexpectedToken(expected),
            pos: token.start,
        }
    }

    fn expect(&mut self, mode: Mode, kind: TokenKind, expected: &'static str) -> PResult<Token> {
        let token = self.lexer.peek(mode)?;
        if token.kind == kind {
            self.lexer.bump(&token);
            Ok(token)
        } else {
            Err(self.unexpected(&token, expected))
        }
    }

    fn expect_leaf(
        &mut self,
        mode: Mode,
        kind: TokenKind,
        node_kind: SyntaxKind,
        expected: &'static str,
    ) -> PResult<NodeId> {
        let token = self.expect(mode, kind, expected)?;
        Ok(self.leaf(node_kind, &token))
    }

    fn at_keyword(&self, keyword: &str) -> PResult<Option<Token>> {
        let token = self.lexer.peek(Mode::Code)?;
        Ok((token.kind == TokenKind::Ident && self.lexer.slice(&token) == keyword).then_some(token))
    }

    fn eat_keyword(&mut self, keyword: &str) -> PResult<Option<NodeId>> {
        Ok(self.at_keyword(keyword)?.map(|token| {
            self.lexer.bump(&token);
            self.leaf(SyntaxKind::Keyword, &token)
        }))
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> PResult<NodeId> {
        match self.eat_keyword(keyword)? {
            Some(id) => Ok(id),
            None => {
                let token = self.lexer.peek(Mode::Code)?;
                Err(self.unexpected(&token, keyword))
            }
        }
    }

    fn parse_item(&mut self, items: &mut Vec<Slot>) -> PResult<()> {
        let token = self.lexer.peek(Mode::Text)?;
        let id = match token.kind {
            TokenKind::Text => {
                self.lexer.bump(&token);
                self.leaf(SyntaxKind::Text, &token)
            }
            TokenKind::ValueOpen => {
                self.lexer.bump(&token);
                self.parse_value(&token)?
            }
            TokenKind::StatementOpen => {
                self.lexer.bump(&token);
                let (id, body_kind) = self.parse_statement(&token)?;
                items.push((None, id));
                if body_kind == SyntaxKind::RawStatement {
                    self.parse_raw_body(&token, items)?;
                }
                return Ok(());
            }
            TokenKind::CommentOpen => {
                self.lexer.bump(&token);
                self.parse_comment(&token)?
            }
            TokenKind::TagOpen => {
                self.lexer.bump(&token);
                self.parse_element(&token)?
            }
            _ => return Err(self.unexpected(&token, "text, element or template tag")),
        };
        items.push((None, id));
        Ok(())
    }

    /// The body of `{% raw %}` is opaque text up to the next `endraw` statement.
    fn parse_raw_body(&mut self, opener: &Token, items: &mut Vec<Slot>) -> PResult<()> {
        let body = self.lexer.next(Mode::Raw)?;
        log::trace!("raw body at {}..{}", body.start, body.end);
        if body.end >= self.source.len() {
            return Err(SyntaxError {
                kind: SyntaxErrorKind::UnterminatedDelimiter,
                pos: opener.start,
            });
        }
        if body.start < body.end {
            items.push((None, self.leaf(SyntaxKind::Text, &body)));
        }
        Ok(())
    }

    fn parse_value(&mut self, open: &Token) -> PResult<NodeId> {
        let open_id = self.leaf(SyntaxKind::Delimiter, open);
        self.within(open.start, |parser| {
            let expr = parser.parse_expr()?;
            let close = parser.expect_leaf(
                Mode::Code,
                TokenKind::ValueClose,
                SyntaxKind::Delimiter,
                "`}}`",
            )?;
            Ok(parser.node(
                SyntaxKind::Value,
                vec![
                    (Some(Field::OpenDelimiter), open_id),
                    (Some(Field::Expression), expr),
                    (Some(Field::CloseDelimiter), close),
                ],
            ))
        })
    }

    fn parse_comment(&mut self, open: &Token) -> PResult<NodeId> {
        let mut children = vec![(
            Some(Field::OpenDelimiter),
            self.leaf(SyntaxKind::Delimiter, open),
        )];
        let mut token = self.lexer.next(Mode::Comment)?;
        log::trace!("comment body at {}..{}", token.start, token.end);
        if token.kind == TokenKind::CommentContent {
            children.push((
                Some(Field::Content),
                self.leaf(SyntaxKind::CommentContent, &token),
            ));
            token = self.lexer.next(Mode::Comment)?;
        }
        if token.kind != TokenKind::CommentClose {
            return Err(SyntaxError {
                kind: SyntaxErrorKind::UnterminatedDelimiter,
                pos: open.start,
            });
        }
        children.push((
            Some(Field::CloseDelimiter),
            self.leaf(SyntaxKind::Delimiter, &token),
        ));
        Ok(self.node(SyntaxKind::Comment, children))
    }

    fn parse_element(&mut self, open: &Token) -> PResult<NodeId> {
        self.enter(open.start)?;
        let mut children = vec![(None, self.leaf(SyntaxKind::Punctuation, open))];
        let element = self.within(open.start, |parser| {
            let name = parser.lexer.peek(Mode::Tag)?;
            if name.kind != TokenKind::Ident || name.start != open.end {
                return Err(parser.unexpected(&name, "tag name"));
            }
            parser.lexer.bump(&name);
            children.push((Some(Field::Name), parser.leaf(SyntaxKind::TagName, &name)));

            loop {
                let token = parser.lexer.peek(Mode::Tag)?;
                match token.kind {
                    TokenKind::Ident => children.push((None, parser.parse_attribute()?)),
                    TokenKind::SelfClose => {
                        parser.lexer.bump(&token);
                        children.push((None, parser.leaf(SyntaxKind::Punctuation, &token)));
                        return Ok(parser.node(SyntaxKind::Element, children));
                    }
                    TokenKind::TagClose => {
                        parser.lexer.bump(&token);
                        children.push((None, parser.leaf(SyntaxKind::Punctuation, &token)));
                        break;
                    }
                    _ => return Err(parser.unexpected(&token, "attribute, `>` or `/>`")),
                }
            }

            loop {
                let token = parser.lexer.peek(Mode::Text)?;
                match token.kind {
                    TokenKind::EndTagOpen => {
                        parser.lexer.bump(&token);
                        children.push((None, parser.leaf(SyntaxKind::Punctuation, &token)));
                        break;
                    }
                    TokenKind::Eof => return Err(parser.unexpected(&token, "closing tag")),
                    _ if parser.error_recovery => {
                        parser.parse_item_or_error(&mut children);
                    }
                    _ => parser.parse_item(&mut children)?,
                }
            }

            // Closing tag name isn't compared with the opening one.
            let close_name =
                parser.expect_leaf(Mode::Tag, TokenKind::Ident, SyntaxKind::TagName, "tag name")?;
            children.push((Some(Field::CloseName), close_name));
            let close =
                parser.expect_leaf(Mode::Tag, TokenKind::TagClose, SyntaxKind::Punctuation, "`>`")?;
            children.push((None, close));
            Ok(parser.node(SyntaxKind::Element, children))
        })?;
        self.leave();
        Ok(element)
    }

    fn parse_attribute(&mut self) -> PResult<NodeId> {
        let name = self.expect_leaf(
            Mode::Tag,
            TokenKind::Ident,
            SyntaxKind::AttributeName,
            "attribute name",
        )?;
        let mut children = vec![(Some(Field::Name), name)];

        let token = self.lexer.peek(Mode::Tag)?;
        if token.kind == TokenKind::Assign {
            self.lexer.bump(&token);
            children.push((None, self.leaf(SyntaxKind::Punctuation, &token)));

            let token = self.lexer.peek(Mode::Tag)?;
            let value = match token.kind {
                TokenKind::Str => {
                    self.lexer.bump(&token);
                    self.leaf(SyntaxKind::String, &token)
                }
                TokenKind::ValueOpen => {
                    self.lexer.bump(&token);
                    self.parse_value(&token)?
                }
                _ => return Err(self.unexpected(&token, "quoted attribute value or `{{`")),
            };
            children.push((Some(Field::Value), value));
        }
        Ok(self.node(SyntaxKind::Attribute, children))
    }

    /// Returns the statement and the kind of its body.
    fn parse_statement(&mut self, open: &Token) -> PResult<(NodeId, SyntaxKind)> {
        let mut children = vec![(
            Some(Field::OpenDelimiter),
            self.leaf(SyntaxKind::Delimiter, open),
        )];
        self.within(open.start, |parser| {
            let token = parser.lexer.peek(Mode::Code)?;
            if matches!(token.kind, TokenKind::Minus | TokenKind::Trim) && token.start == open.end {
                parser.lexer.bump(&token);
                children.push((
                    Some(Field::LeadingTrim),
                    parser.leaf(SyntaxKind::TrimMarker, &token),
                ));
            }

            let head = parser.lexer.peek(Mode::Code)?;
            let keyword = (head.kind == TokenKind::Ident).then(|| parser.lexer.slice(&head));
            let body = match keyword {
                Some("for") => parser.parse_for()?,
                Some("if") => parser.parse_if()?,
                Some("elif") => parser.parse_elif()?,
                Some("else") => parser.parse_else()?,
                Some("include") => parser.parse_include()?,
                Some("extends") => parser.parse_extends()?,
                Some("block") => parser.parse_block()?,
                Some("set") => parser.parse_set()?,
                Some("macro") => parser.parse_macro()?,
                Some("call") => parser.parse_call_statement()?,
                Some("filter") => parser.parse_filter()?,
                Some("raw") => parser.parse_raw()?,
                Some("import") => parser.parse_import()?,
                Some("from") => parser.parse_from()?,
                Some(keyword) if END_KEYWORDS.contains(&keyword) => parser.parse_end()?,
                _ if head.kind == TokenKind::Eof => {
                    return Err(parser.unexpected(&head, "statement keyword"));
                }
                _ => {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::UnknownStatementKeyword,
                        pos: head.start,
                    });
                }
            };
            let body_kind = parser.nodes[body].kind;
            children.push((None, body));

            let token = parser.lexer.peek(Mode::Code)?;
            if token.kind == TokenKind::Trim {
                parser.lexer.bump(&token);
                children.push((
                    Some(Field::TrailingTrim),
                    parser.leaf(SyntaxKind::TrimMarker, &token),
                ));
            }
            let close = parser.expect_leaf(
                Mode::Code,
                TokenKind::StatementClose,
                SyntaxKind::Delimiter,
                "`%}`",
            )?;
            children.push((Some(Field::CloseDelimiter), close));
            Ok((parser.node(SyntaxKind::Statement, children), body_kind))
        })
    }

    fn parse_for(&mut self) -> PResult<NodeId> {
        let mut children = vec![(None, self.expect_keyword("for")?)];
        // `in` would otherwise be taken as a comparison inside the target.
        let target = self.parse_expr_bp(0, true)?;
        children.push((Some(Field::Target), target));
        children.push((None, self.expect_keyword("in")?));
        children.push((Some(Field::Iterable), self.parse_expr()?));
        if let Some(keyword) = self.eat_keyword("if")? {
            children.push((None, keyword));
            children.push((Some(Field::Condition), self.parse_expr()?));
        }
        Ok(self.node(SyntaxKind::ForStatement, children))
    }

    fn parse_if(&mut self) -> PResult<NodeId> {
        let mut children = vec![
            (None, self.expect_keyword("if")?),
            (Some(Field::Condition), self.parse_expr()?),
        ];
        while self.at_keyword("elif")?.is_some() {
            children.push((Some(Field::Elif), self.parse_elif()?));
        }
        if self.at_keyword("else")?.is_some() {
            children.push((Some(Field::Else), self.parse_else()?));
        }
        Ok(self.node(SyntaxKind::IfStatement, children))
    }

    fn parse_elif(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("elif")?),
            (Some(Field::Condition), self.parse_expr()?),
        ];
        Ok(self.node(SyntaxKind::ElifClause, children))
    }

    fn parse_else(&mut self) -> PResult<NodeId> {
        let keyword = self.expect_keyword("else")?;
        Ok(self.node(SyntaxKind::ElseClause, vec![(None, keyword)]))
    }

    fn parse_include(&mut self) -> PResult<NodeId> {
        let mut children = vec![
            (None, self.expect_keyword("include")?),
            (Some(Field::Template), self.parse_string()?),
        ];
        if let Some(keyword) = self.eat_keyword("with")? {
            children.push((None, keyword));
            let open = self.expect(Mode::Operand, TokenKind::LBrace, "`{`")?;
            children.push((Some(Field::Context), self.parse_dict(&open)?));
        }
        if let Some(keyword) = self.eat_keyword("ignore")? {
            children.push((None, keyword));
            children.push((None, self.expect_keyword("missing")?));
        }
        Ok(self.node(SyntaxKind::IncludeStatement, children))
    }

    fn parse_extends(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("extends")?),
            (Some(Field::ParentTemplate), self.parse_string()?),
        ];
        Ok(self.node(SyntaxKind::ExtendsStatement, children))
    }

    fn parse_block(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("block")?),
            (Some(Field::BlockName), self.parse_identifier()?),
        ];
        Ok(self.node(SyntaxKind::BlockStatement, children))
    }

    fn parse_set(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("set")?),
            (Some(Field::Variable), self.parse_identifier()?),
            (
                None,
                self.expect_leaf(Mode::Code, TokenKind::Assign, SyntaxKind::Punctuation, "`=`")?,
            ),
            (Some(Field::Value), self.parse_expr()?),
        ];
        Ok(self.node(SyntaxKind::SetStatement, children))
    }

    fn parse_macro(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("macro")?),
            (Some(Field::MacroName), self.parse_identifier()?),
            (Some(Field::Params), self.parse_argument_list()?),
        ];
        Ok(self.node(SyntaxKind::MacroStatement, children))
    }

    /// `call [macro] [params]`.
    ///
    /// The macro is parsed greedily, so `call foo(x)` first reads `foo(x)` as one call expression.
    /// That call is then split: `foo` becomes the macro and `(x)` the params.
    fn parse_call_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![(None, self.expect_keyword("call")?)];

        let token = self.lexer.peek(Mode::Operand)?;
        match token.kind {
            TokenKind::StatementClose | TokenKind::Trim => {}
            TokenKind::LParen => {
                children.push((Some(Field::Params), self.parse_argument_list()?));
            }
            _ => {
                let callee = self.parse_expr()?;
                if self.nodes[callee].kind == SyntaxKind::Call
                    && callee.index() + 1 == self.nodes.len()
                {
                    let call = self.nodes.pop().map(|data| data.children).unwrap_or_default();
                    if let [function, arguments] = call[..] {
                        children.push((Some(Field::Macro), function));
                        children.push((Some(Field::Params), arguments));
                    }
                } else {
                    children.push((Some(Field::Macro), callee));
                }
            }
        }
        Ok(self.node(SyntaxKind::CallStatement, children))
    }

    fn parse_filter(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("filter")?),
            (Some(Field::FilterName), self.parse_identifier()?),
        ];
        Ok(self.node(SyntaxKind::FilterStatement, children))
    }

    fn parse_raw(&mut self) -> PResult<NodeId> {
        let keyword = self.expect_keyword("raw")?;
        Ok(self.node(SyntaxKind::RawStatement, vec![(None, keyword)]))
    }

    fn parse_import(&mut self) -> PResult<NodeId> {
        let children = vec![
            (None, self.expect_keyword("import")?),
            (Some(Field::Module), self.parse_string()?),
            (None, self.expect_keyword("as")?),
            (Some(Field::Alias), self.parse_identifier()?),
        ];
        Ok(self.node(SyntaxKind::ImportStatement, children))
    }

    fn parse_from(&mut self) -> PResult<NodeId> {
        let mut children = vec![
            (None, self.expect_keyword("from")?),
            (Some(Field::Module), self.parse_string()?),
            (None, self.expect_keyword("import")?),
        ];
        loop {
            let mut name = vec![(Some(Field::Name), self.parse_identifier()?)];
            if let Some(keyword) = self.eat_keyword("as")? {
                name.push((None, keyword));
                name.push((Some(Field::Alias), self.parse_identifier()?));
            }
            children.push((None, self.node(SyntaxKind::ImportedName, name)));

            let token = self.lexer.peek(Mode::Code)?;
            if token.kind != TokenKind::Comma {
                break;
            }
            self.lexer.bump(&token);
            children.push((None, self.leaf(SyntaxKind::Punctuation, &token)));
        }
        Ok(self.node(SyntaxKind::FromStatement, children))
    }

    fn parse_end(&mut self) -> PResult<NodeId> {
        let token = self.expect(Mode::Code, TokenKind::Ident, "end keyword")?;
        let keyword = self.leaf(SyntaxKind::Keyword, &token);
        Ok(self.node(SyntaxKind::EndStatement, vec![(None, keyword)]))
    }

    fn parse_identifier(&mut self) -> PResult<NodeId> {
        self.expect_leaf(
            Mode::Code,
            TokenKind::Ident,
            SyntaxKind::Identifier,
            "identifier",
        )
    }

    fn parse_string(&mut self) -> PResult<NodeId> {
        self.expect_leaf(
            Mode::Operand,
            TokenKind::Str,
            SyntaxKind::String,
            "string literal",
        )
    }

    fn parse_expr(&mut self) -> PResult<NodeId> {
        self.parse_expr_bp(0, false)
    }

    /// Precedence climbing: keep extending `lhs` with operators binding at least `min_prec`.
    fn parse_expr_bp(&mut self, min_prec: u8, no_in: bool) -> PResult<NodeId> {
        self.enter(self.lexer.pos())?;
        let mut lhs = self.parse_prefix()?;

        loop {
            let token = self.lexer.peek(Mode::Code)?;
            let Some((prec, infix, operator_end)) = self.infix_operator(&token, no_in)? else {
                break;
            };
            if prec < min_prec {
                break;
            }

            lhs = match infix {
                Infix::Comparison | Infix::Binary => {
                    self.lexer.reset(operator_end);
                    let operator =
                        self.push(SyntaxKind::Operator, token.start..operator_end, vec![]);
                    let rhs = self.parse_expr_bp(prec + 1, false)?;
                    let kind = if let Infix::Comparison = infix {
                        SyntaxKind::Comparison
                    } else {
                        SyntaxKind::BinaryOperation
                    };
                    self.node(
                        kind,
                        vec![
                            (Some(Field::Left), lhs),
                            (Some(Field::Operator), operator),
                            (Some(Field::Right), rhs),
                        ],
                    )
                }
                Infix::Call => {
                    let arguments = self.parse_argument_list()?;
                    self.node(
                        SyntaxKind::Call,
                        vec![
                            (Some(Field::Function), lhs),
                            (Some(Field::Arguments), arguments),
                        ],
                    )
                }
                Infix::Property => {
                    self.lexer.bump(&token);
                    let dot = self.leaf(SyntaxKind::Punctuation, &token);
                    let property = self.parse_identifier()?;
                    self.node(
                        SyntaxKind::PropertyAccess,
                        vec![
                            (Some(Field::Object), lhs),
                            (None, dot),
                            (Some(Field::Property), property),
                        ],
                    )
                }
                Infix::Subscript => {
                    self.lexer.bump(&token);
                    let open = self.leaf(SyntaxKind::Punctuation, &token);
                    let index = self.parse_expr()?;
                    let close = self.expect_leaf(
                        Mode::Code,
                        TokenKind::RBracket,
                        SyntaxKind::Punctuation,
                        "`]`",
                    )?;
                    self.node(
                        SyntaxKind::Subscript,
                        vec![
                            (Some(Field::Object), lhs),
                            (None, open),
                            (Some(Field::Index), index),
                            (None, close),
                        ],
                    )
                }
            };
        }

        self.leave();
        Ok(lhs)
    }

    /// Precedence, kind and end offset of the operator starting at `token`, if it is one.
    fn infix_operator(&self, token: &Token, no_in: bool) -> PResult<Option<(u8, Infix, usize)>> {
        let operator = match token.kind {
            TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq => Some((prec::COMPARISON, Infix::Comparison, token.end)),
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::StarStar
            | TokenKind::Slash
            | TokenKind::SlashSlash
            | TokenKind::Percent => Some((prec::BINARY, Infix::Binary, token.end)),
            TokenKind::LParen => Some((prec::CALL, Infix::Call, token.end)),
            TokenKind::Dot => Some((prec::POSTFIX, Infix::Property, token.end)),
            TokenKind::LBracket => Some((prec::POSTFIX, Infix::Subscript, token.end)),
            TokenKind::Ident if no_in => None,
            TokenKind::Ident => match self.lexer.slice(token) {
                "in" => Some((prec::COMPARISON, Infix::Comparison, token.end)),
                "not" => {
                    let mut lexer = self.lexer.clone();
                    lexer.bump(token);
                    let next = lexer.peek(Mode::Code)?;
                    (next.kind == TokenKind::Ident && lexer.slice(&next) == "in")
                        .then_some((prec::COMPARISON, Infix::Comparison, next.end))
                }
                _ => None,
            },
            _ => None,
        };
        Ok(operator)
    }

    fn parse_prefix(&mut self) -> PResult<NodeId> {
        let token = self.lexer.peek(Mode::Operand)?;
        let kind = match token.kind {
            TokenKind::Ident => match self.lexer.slice(&token) {
                "not" => return self.parse_unary(&token),
                "True" | "False" => SyntaxKind::Bool,
                _ => SyntaxKind::Identifier,
            },
            TokenKind::Minus | TokenKind::Plus => return self.parse_unary(&token),
            TokenKind::Str => SyntaxKind::String,
            TokenKind::Int => SyntaxKind::Integer,
            TokenKind::Float => SyntaxKind::Float,
            TokenKind::LBracket => {
                self.lexer.bump(&token);
                return self.parse_list(&token);
            }
            TokenKind::LBrace => {
                self.lexer.bump(&token);
                return self.parse_dict(&token);
            }
            _ => return Err(self.unexpected(&token, "expression")),
        };
        self.lexer.bump(&token);
        Ok(self.leaf(kind, &token))
    }

    fn parse_unary(&mut self, token: &Token) -> PResult<NodeId> {
        self.lexer.bump(token);
        let operator = self.leaf(SyntaxKind::Operator, token);
        let operand = self.parse_expr_bp(prec::UNARY, false)?;
        Ok(self.node(
            SyntaxKind::UnaryOperation,
            vec![
                (Some(Field::Operator), operator),
                (Some(Field::Operand), operand),
            ],
        ))
    }

    /// Comma-separated items until `close`, with an optional trailing comma.
    /// The opening token is already consumed and `children` holds it.
    fn parse_separated<F>(
        &mut self,
        children: &mut Vec<Slot>,
        close: TokenKind,
        mut item: F,
    ) -> PResult<()>
    where
        F: FnMut(&mut Self) -> PResult<Slot>,
    {
        let is_close = |kind: TokenKind| {
            kind == close || (close == TokenKind::RBrace && kind == TokenKind::ValueClose)
        };
        let token = self.lexer.peek(Mode::Code)?;
        if token.kind == TokenKind::Comma {
            // `[,]`: no items, only the trailing comma.
            self.lexer.bump(&token);
            children.push((None, self.leaf(SyntaxKind::Punctuation, &token)));
        } else {
            loop {
                if is_close(self.lexer.peek(Mode::Code)?.kind) {
                    break;
                }
                children.push(item(self)?);
                let token = self.lexer.peek(Mode::Code)?;
                if token.kind != TokenKind::Comma {
                    break;
                }
                self.lexer.bump(&token);
                children.push((None, self.leaf(SyntaxKind::Punctuation, &token)));
            }
        }

        let token = self.lexer.peek(Mode::Code)?;
        if !is_close(token.kind) {
            return Err(self.unexpected(
                &token,
                match close {
                    TokenKind::RParen => "`,` or `)`",
                    TokenKind::RBracket => "`,` or `]`",
                    _ => "`,` or `}`",
                },
            ));
        }
        // In `{'a': {}}}` the lexer sees `}}` first, but only one `}` closes the dict.
        let token = Token {
            end: token.start + 1,
            ..token
        };
        self.lexer.bump(&token);
        children.push((None, self.leaf(SyntaxKind::Punctuation, &token)));
        Ok(())
    }

    fn parse_list(&mut self, open: &Token) -> PResult<NodeId> {
        let mut children = vec![(None, self.leaf(SyntaxKind::Punctuation, open))];
        self.parse_separated(&mut children, TokenKind::RBracket, |parser| {
            Ok((None, parser.parse_expr()?))
        })?;
        Ok(self.node(SyntaxKind::List, children))
    }

    fn parse_dict(&mut self, open: &Token) -> PResult<NodeId> {
        let mut children = vec![(None, self.leaf(SyntaxKind::Punctuation, open))];
        self.parse_separated(&mut children, TokenKind::RBrace, |parser| {
            let key = parser.parse_expr()?;
            let colon =
                parser.expect_leaf(Mode::Code, TokenKind::Colon, SyntaxKind::Punctuation, "`:`")?;
            let value = parser.parse_expr()?;
            let pair = parser.node(
                SyntaxKind::Pair,
                vec![
                    (Some(Field::Key), key),
                    (None, colon),
                    (Some(Field::Value), value),
                ],
            );
            Ok((None, pair))
        })?;
        Ok(self.node(SyntaxKind::Dict, children))
    }

    /// Positional and keyword arguments may come in any order.
    fn parse_argument_list(&mut self) -> PResult<NodeId> {
        let open = self.expect_leaf(
            Mode::Code,
            TokenKind::LParen,
            SyntaxKind::Punctuation,
            "`(`",
        )?;
        let mut children = vec![(None, open)];
        self.parse_separated(&mut children, TokenKind::RParen, |parser| {
            let argument = match parser.try_parse(Self::parse_keyword_argument_key) {
                Ok((key, assign)) => {
                    let value = parser.parse_expr()?;
                    parser.node(
                        SyntaxKind::KeywordArgument,
                        vec![
                            (Some(Field::Key), key),
                            (None, assign),
                            (Some(Field::Value), value),
                        ],
                    )
                }
                Err(..) => parser.parse_expr()?,
            };
            Ok((None, argument))
        })?;
        Ok(self.node(SyntaxKind::ArgumentList, children))
    }

    fn parse_keyword_argument_key(&mut self) -> PResult<(NodeId, NodeId)> {
        let key = self.parse_identifier()?;
        let assign = self.expect_leaf(
            Mode::Code,
            TokenKind::Assign,
            SyntaxKind::Punctuation,
            "`=`",
        )?;
        Ok((key, assign))
    }
}
