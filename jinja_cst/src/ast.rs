//! Typed views over [`SyntaxTree`](crate::SyntaxTree) nodes.
//!
//! Every view is a thin wrapper of a [`Node`] and is as cheap to copy.
//! Accessors return `None` only when the node is missing from the tree,
//! which doesn't happen for trees without errors.

use crate::tree::{Field, Node, SyntaxKind};
use std::borrow::Cow;

macro_rules! ast_node {
    ($($name:ident => $kind:ident,)*) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct $name<'t, 's>(Node<'t, 's>);

            impl<'t, 's> $name<'t, 's> {
                pub fn cast(node: Node<'t, 's>) -> Option<Self> {
                    (node.kind() == SyntaxKind::$kind).then_some(Self(node))
                }

                pub fn syntax(&self) -> Node<'t, 's> {
                    self.0
                }
            }
        )*
    };
}

ast_node! {
    SourceFile => SourceFile,
    Text => Text,
    Value => Value,
    Statement => Statement,
    Comment => Comment,
    Element => Element,
    Attribute => Attribute,
    ForStatement => ForStatement,
    IfStatement => IfStatement,
    ElifClause => ElifClause,
    ElseClause => ElseClause,
    IncludeStatement => IncludeStatement,
    ExtendsStatement => ExtendsStatement,
    BlockStatement => BlockStatement,
    SetStatement => SetStatement,
    MacroStatement => MacroStatement,
    CallStatement => CallStatement,
    FilterStatement => FilterStatement,
    RawStatement => RawStatement,
    ImportStatement => ImportStatement,
    FromStatement => FromStatement,
    ImportedName => ImportedName,
    EndStatement => EndStatement,
    Comparison => Comparison,
    BinaryOperation => BinaryOperation,
    UnaryOperation => UnaryOperation,
    Call => Call,
    PropertyAccess => PropertyAccess,
    Subscript => Subscript,
    List => List,
    Dict => Dict,
    Pair => Pair,
    StringLiteral => String,
    Bool => Bool,
    Integer => Integer,
    Float => Float,
    Identifier => Identifier,
    ArgumentList => ArgumentList,
    KeywordArgument => KeywordArgument,
}

fn field<'t, 's, T>(
    node: Node<'t, 's>,
    field: Field,
    cast: fn(Node<'t, 's>) -> Option<T>,
) -> Option<T> {
    node.child_by_field(field).and_then(cast)
}

fn has_keyword(node: Node<'_, '_>, keyword: &str) -> bool {
    node.children()
        .any(|child| child.kind() == SyntaxKind::Keyword && child.text() == keyword)
}

/// Top-level or element-body content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Item<'t, 's> {
    Text(Text<'t, 's>),
    Value(Value<'t, 's>),
    Statement(Statement<'t, 's>),
    Comment(Comment<'t, 's>),
    Element(Element<'t, 's>),
    /// Region skipped after a syntax error.
    Error(Node<'t, 's>),
}

impl<'t, 's> Item<'t, 's> {
    pub fn cast(node: Node<'t, 's>) -> Option<Self> {
        match node.kind() {
            SyntaxKind::Text => Some(Item::Text(Text(node))),
            SyntaxKind::Value => Some(Item::Value(Value(node))),
            SyntaxKind::Statement => Some(Item::Statement(Statement(node))),
            SyntaxKind::Comment => Some(Item::Comment(Comment(node))),
            SyntaxKind::Element => Some(Item::Element(Element(node))),
            SyntaxKind::Error => Some(Item::Error(node)),
            _ => None,
        }
    }

    pub fn syntax(&self) -> Node<'t, 's> {
        match self {
            Item::Text(text) => text.syntax(),
            Item::Value(value) => value.syntax(),
            Item::Statement(statement) => statement.syntax(),
            Item::Comment(comment) => comment.syntax(),
            Item::Element(element) => element.syntax(),
            Item::Error(node) => *node,
        }
    }
}

impl<'t, 's> SourceFile<'t, 's> {
    pub fn items(&self) -> impl Iterator<Item = Item<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(Item::cast)
    }
}

impl<'s> Text<'_, 's> {
    pub fn text(&self) -> &'s str {
        self.0.text()
    }
}

impl<'t, 's> Value<'t, 's> {
    pub fn expr(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Expression, Expr::cast)
    }
}

impl<'s> Comment<'_, 's> {
    /// Everything between `{#` and `#}`, verbatim.
    pub fn content(&self) -> &'s str {
        self.0
            .child_by_field(Field::Content)
            .map(|content| content.text())
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementBody<'t, 's> {
    For(ForStatement<'t, 's>),
    If(IfStatement<'t, 's>),
    Elif(ElifClause<'t, 's>),
    Else(ElseClause<'t, 's>),
    Include(IncludeStatement<'t, 's>),
    Extends(ExtendsStatement<'t, 's>),
    Block(BlockStatement<'t, 's>),
    Set(SetStatement<'t, 's>),
    Macro(MacroStatement<'t, 's>),
    Call(CallStatement<'t, 's>),
    Filter(FilterStatement<'t, 's>),
    Raw(RawStatement<'t, 's>),
    Import(ImportStatement<'t, 's>),
    From(FromStatement<'t, 's>),
    End(EndStatement<'t, 's>),
}

impl<'t, 's> StatementBody<'t, 's> {
    pub fn cast(node: Node<'t, 's>) -> Option<Self> {
        let body = match node.kind() {
            SyntaxKind::ForStatement => StatementBody::For(ForStatement(node)),
            SyntaxKind::IfStatement => StatementBody::If(IfStatement(node)),
            SyntaxKind::ElifClause => StatementBody::Elif(ElifClause(node)),
            SyntaxKind::ElseClause => StatementBody::Else(ElseClause(node)),
            SyntaxKind::IncludeStatement => StatementBody::Include(IncludeStatement(node)),
            SyntaxKind::ExtendsStatement => StatementBody::Extends(ExtendsStatement(node)),
            SyntaxKind::BlockStatement => StatementBody::Block(BlockStatement(node)),
            SyntaxKind::SetStatement => StatementBody::Set(SetStatement(node)),
            SyntaxKind::MacroStatement => StatementBody::Macro(MacroStatement(node)),
            SyntaxKind::CallStatement => StatementBody::Call(CallStatement(node)),
            SyntaxKind::FilterStatement => StatementBody::Filter(FilterStatement(node)),
            SyntaxKind::RawStatement => StatementBody::Raw(RawStatement(node)),
            SyntaxKind::ImportStatement => StatementBody::Import(ImportStatement(node)),
            SyntaxKind::FromStatement => StatementBody::From(FromStatement(node)),
            SyntaxKind::EndStatement => StatementBody::End(EndStatement(node)),
            _ => return None,
        };
        Some(body)
    }
}

impl<'t, 's> Statement<'t, 's> {
    pub fn body(&self) -> Option<StatementBody<'t, 's>> {
        self.0
            .children()
            .find(|child| child.kind().is_statement_body())
            .and_then(StatementBody::cast)
    }

    /// `{%-`
    pub fn has_leading_trim(&self) -> bool {
        self.0.child_by_field(Field::LeadingTrim).is_some()
    }

    /// `-%}`
    pub fn has_trailing_trim(&self) -> bool {
        self.0.child_by_field(Field::TrailingTrim).is_some()
    }
}

impl<'t, 's> ForStatement<'t, 's> {
    pub fn target(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Target, Expr::cast)
    }

    pub fn iterable(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Iterable, Expr::cast)
    }

    /// Filter after the trailing `if`.
    pub fn condition(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Condition, Expr::cast)
    }
}

impl<'t, 's> IfStatement<'t, 's> {
    pub fn condition(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Condition, Expr::cast)
    }

    /// `elif` clauses written inside this same tag.
    pub fn elif_clauses(&self) -> impl Iterator<Item = ElifClause<'t, 's>> + use<'t, 's> {
        self.0
            .children_by_field(Field::Elif)
            .filter_map(ElifClause::cast)
    }

    pub fn else_clause(&self) -> Option<ElseClause<'t, 's>> {
        field(self.0, Field::Else, ElseClause::cast)
    }
}

impl<'t, 's> ElifClause<'t, 's> {
    pub fn condition(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Condition, Expr::cast)
    }
}

impl<'t, 's> IncludeStatement<'t, 's> {
    pub fn template(&self) -> Option<StringLiteral<'t, 's>> {
        field(self.0, Field::Template, StringLiteral::cast)
    }

    pub fn context(&self) -> Option<Dict<'t, 's>> {
        field(self.0, Field::Context, Dict::cast)
    }

    pub fn ignore_missing(&self) -> bool {
        has_keyword(self.0, "missing")
    }
}

impl<'t, 's> ExtendsStatement<'t, 's> {
    pub fn parent_template(&self) -> Option<StringLiteral<'t, 's>> {
        field(self.0, Field::ParentTemplate, StringLiteral::cast)
    }
}

impl<'t, 's> BlockStatement<'t, 's> {
    pub fn name(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::BlockName, Identifier::cast)
    }
}

impl<'t, 's> SetStatement<'t, 's> {
    pub fn variable(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Variable, Identifier::cast)
    }

    pub fn value(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Value, Expr::cast)
    }
}

impl<'t, 's> MacroStatement<'t, 's> {
    pub fn name(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::MacroName, Identifier::cast)
    }

    pub fn params(&self) -> Option<ArgumentList<'t, 's>> {
        field(self.0, Field::Params, ArgumentList::cast)
    }
}

impl<'t, 's> CallStatement<'t, 's> {
    /// Macro being called. Absent in `{% call(user) %}`.
    pub fn macro_expr(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Macro, Expr::cast)
    }

    pub fn params(&self) -> Option<ArgumentList<'t, 's>> {
        field(self.0, Field::Params, ArgumentList::cast)
    }
}

impl<'t, 's> FilterStatement<'t, 's> {
    pub fn name(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::FilterName, Identifier::cast)
    }
}

impl<'t, 's> ImportStatement<'t, 's> {
    pub fn module(&self) -> Option<StringLiteral<'t, 's>> {
        field(self.0, Field::Module, StringLiteral::cast)
    }

    pub fn alias(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Alias, Identifier::cast)
    }
}

impl<'t, 's> FromStatement<'t, 's> {
    pub fn module(&self) -> Option<StringLiteral<'t, 's>> {
        field(self.0, Field::Module, StringLiteral::cast)
    }

    pub fn names(&self) -> impl Iterator<Item = ImportedName<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(ImportedName::cast)
    }
}

impl<'t, 's> ImportedName<'t, 's> {
    pub fn name(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Name, Identifier::cast)
    }

    pub fn alias(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Alias, Identifier::cast)
    }
}

impl<'s> EndStatement<'_, 's> {
    /// The `end...` keyword as written. It isn't checked against any opening statement.
    pub fn keyword(&self) -> &'s str {
        self.0
            .child_of_kind(SyntaxKind::Keyword)
            .map(|keyword| keyword.text())
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expr<'t, 's> {
    Comparison(Comparison<'t, 's>),
    BinaryOperation(BinaryOperation<'t, 's>),
    UnaryOperation(UnaryOperation<'t, 's>),
    Call(Call<'t, 's>),
    PropertyAccess(PropertyAccess<'t, 's>),
    Subscript(Subscript<'t, 's>),
    List(List<'t, 's>),
    Dict(Dict<'t, 's>),
    String(StringLiteral<'t, 's>),
    Bool(Bool<'t, 's>),
    Integer(Integer<'t, 's>),
    Float(Float<'t, 's>),
    Identifier(Identifier<'t, 's>),
}

impl<'t, 's> Expr<'t, 's> {
    pub fn cast(node: Node<'t, 's>) -> Option<Self> {
        let expr = match node.kind() {
            SyntaxKind::Comparison => Expr::Comparison(Comparison(node)),
            SyntaxKind::BinaryOperation => Expr::BinaryOperation(BinaryOperation(node)),
            SyntaxKind::UnaryOperation => Expr::UnaryOperation(UnaryOperation(node)),
            SyntaxKind::Call => Expr::Call(Call(node)),
            SyntaxKind::PropertyAccess => Expr::PropertyAccess(PropertyAccess(node)),
            SyntaxKind::Subscript => Expr::Subscript(Subscript(node)),
            SyntaxKind::List => Expr::List(List(node)),
            SyntaxKind::Dict => Expr::Dict(Dict(node)),
            SyntaxKind::String => Expr::String(StringLiteral(node)),
            SyntaxKind::Bool => Expr::Bool(Bool(node)),
            SyntaxKind::Integer => Expr::Integer(Integer(node)),
            SyntaxKind::Float => Expr::Float(Float(node)),
            SyntaxKind::Identifier => Expr::Identifier(Identifier(node)),
            _ => return None,
        };
        Some(expr)
    }

    pub fn syntax(&self) -> Node<'t, 's> {
        match self {
            Expr::Comparison(expr) => expr.syntax(),
            Expr::BinaryOperation(expr) => expr.syntax(),
            Expr::UnaryOperation(expr) => expr.syntax(),
            Expr::Call(expr) => expr.syntax(),
            Expr::PropertyAccess(expr) => expr.syntax(),
            Expr::Subscript(expr) => expr.syntax(),
            Expr::List(expr) => expr.syntax(),
            Expr::Dict(expr) => expr.syntax(),
            Expr::String(expr) => expr.syntax(),
            Expr::Bool(expr) => expr.syntax(),
            Expr::Integer(expr) => expr.syntax(),
            Expr::Float(expr) => expr.syntax(),
            Expr::Identifier(expr) => expr.syntax(),
        }
    }
}

fn operator_text<'s>(node: Node<'_, 's>) -> Cow<'s, str> {
    let text = node
        .child_by_field(Field::Operator)
        .map(|operator| operator.text())
        .unwrap_or_default();
    // `not   in` is a single operator token with inner whitespace.
    if text.contains(|c: char| c.is_ascii_whitespace()) {
        Cow::Owned(text.split_ascii_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Cow::Borrowed(text)
    }
}

impl<'t, 's> Comparison<'t, 's> {
    pub fn left(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Left, Expr::cast)
    }

    /// Operator text, with `not in` normalized to a single space.
    pub fn operator(&self) -> Cow<'s, str> {
        operator_text(self.0)
    }

    pub fn right(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Right, Expr::cast)
    }
}

impl<'t, 's> BinaryOperation<'t, 's> {
    pub fn left(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Left, Expr::cast)
    }

    pub fn operator(&self) -> &'s str {
        self.0
            .child_by_field(Field::Operator)
            .map(|operator| operator.text())
            .unwrap_or_default()
    }

    pub fn right(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Right, Expr::cast)
    }
}

impl<'t, 's> UnaryOperation<'t, 's> {
    pub fn operator(&self) -> &'s str {
        self.0
            .child_by_field(Field::Operator)
            .map(|operator| operator.text())
            .unwrap_or_default()
    }

    pub fn operand(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Operand, Expr::cast)
    }
}

impl<'t, 's> Call<'t, 's> {
    pub fn function(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Function, Expr::cast)
    }

    pub fn arguments(&self) -> Option<ArgumentList<'t, 's>> {
        field(self.0, Field::Arguments, ArgumentList::cast)
    }
}

impl<'t, 's> PropertyAccess<'t, 's> {
    pub fn object(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Object, Expr::cast)
    }

    pub fn property(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Property, Identifier::cast)
    }
}

impl<'t, 's> Subscript<'t, 's> {
    pub fn object(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Object, Expr::cast)
    }

    pub fn index(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Index, Expr::cast)
    }
}

impl<'t, 's> List<'t, 's> {
    pub fn items(&self) -> impl Iterator<Item = Expr<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(Expr::cast)
    }
}

impl<'t, 's> Dict<'t, 's> {
    pub fn pairs(&self) -> impl Iterator<Item = Pair<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(Pair::cast)
    }
}

impl<'t, 's> Pair<'t, 's> {
    pub fn key(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Key, Expr::cast)
    }

    pub fn value(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Value, Expr::cast)
    }
}

impl<'s> StringLiteral<'_, 's> {
    /// Content between the quotes, with `\"` or `\'` unescaped.
    /// Other backslashes are kept as written.
    pub fn value(&self) -> Cow<'s, str> {
        let text = self.0.text();
        let Some(quote) = text.chars().next() else {
            return Cow::Borrowed(text);
        };
        let inner = text
            .get(1..text.len().saturating_sub(1))
            .unwrap_or_default();
        let escaped = format!("\\{quote}");
        if inner.contains(&escaped) {
            Cow::Owned(inner.replace(&escaped, &quote.to_string()))
        } else {
            Cow::Borrowed(inner)
        }
    }
}

impl Bool<'_, '_> {
    pub fn value(&self) -> bool {
        self.0.text() == "True"
    }
}

impl Integer<'_, '_> {
    /// `None` if the literal doesn't fit in `i64`.
    pub fn value(&self) -> Option<i64> {
        self.0.text().replace('_', "").parse().ok()
    }
}

impl Float<'_, '_> {
    pub fn value(&self) -> Option<f64> {
        self.0.text().replace('_', "").parse().ok()
    }
}

impl<'s> Identifier<'_, 's> {
    pub fn name(&self) -> &'s str {
        self.0.text()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Argument<'t, 's> {
    Positional(Expr<'t, 's>),
    Keyword(KeywordArgument<'t, 's>),
}

impl<'t, 's> ArgumentList<'t, 's> {
    pub fn arguments(&self) -> impl Iterator<Item = Argument<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(|child| {
            KeywordArgument::cast(child)
                .map(Argument::Keyword)
                .or_else(|| Expr::cast(child).map(Argument::Positional))
        })
    }
}

impl<'t, 's> KeywordArgument<'t, 's> {
    pub fn key(&self) -> Option<Identifier<'t, 's>> {
        field(self.0, Field::Key, Identifier::cast)
    }

    pub fn value(&self) -> Option<Expr<'t, 's>> {
        field(self.0, Field::Value, Expr::cast)
    }
}

impl<'t, 's> Element<'t, 's> {
    pub fn tag_name(&self) -> Option<&'s str> {
        self.0.child_by_field(Field::Name).map(|name| name.text())
    }

    /// Name in the closing tag, which may differ from [`Element::tag_name`].
    pub fn close_tag_name(&self) -> Option<&'s str> {
        self.0
            .child_by_field(Field::CloseName)
            .map(|name| name.text())
    }

    pub fn is_self_closing(&self) -> bool {
        self.0
            .children()
            .any(|child| child.kind() == SyntaxKind::Punctuation && child.text() == "/>")
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(Attribute::cast)
    }

    pub fn children(&self) -> impl Iterator<Item = Item<'t, 's>> + use<'t, 's> {
        self.0.children().filter_map(Item::cast)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeValue<'t, 's> {
    String(StringLiteral<'t, 's>),
    Value(Value<'t, 's>),
}

impl<'t, 's> Attribute<'t, 's> {
    pub fn name(&self) -> Option<&'s str> {
        self.0.child_by_field(Field::Name).map(|name| name.text())
    }

    /// `None` for a bare attribute like `disabled`.
    pub fn value(&self) -> Option<AttributeValue<'t, 's>> {
        let value = self.0.child_by_field(Field::Value)?;
        StringLiteral::cast(value)
            .map(AttributeValue::String)
            .or_else(|| Value::cast(value).map(AttributeValue::Value))
    }
}
