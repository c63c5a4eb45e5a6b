//! Concrete syntax tree.
//!
//! Nodes live in one arena owned by [`SyntaxTree`] and refer to their children by [`NodeId`].
//! Every token is a node, so the byte ranges of a node's children,
//! together with the whitespace between them, cover the node's own range.

use index_vec::IndexVec;
use itertools::Itertools;
use std::{fmt, ops::Range};
use tiny_pretty::{Doc, IndentKind, LineBreak, PrintOptions};

/// Byte range into the parsed source.
pub type Span = Range<usize>;

index_vec::define_index_type! {
    /// Handle of a node in its tree's arena.
    pub struct NodeId = u32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    SourceFile,
    Text,
    Value,
    Statement,
    Comment,
    CommentContent,
    Element,
    TagName,
    Attribute,
    AttributeName,

    ForStatement,
    IfStatement,
    ElifClause,
    ElseClause,
    IncludeStatement,
    ExtendsStatement,
    BlockStatement,
    SetStatement,
    MacroStatement,
    CallStatement,
    FilterStatement,
    RawStatement,
    ImportStatement,
    FromStatement,
    ImportedName,
    EndStatement,

    Comparison,
    BinaryOperation,
    UnaryOperation,
    Call,
    PropertyAccess,
    Subscript,
    List,
    Dict,
    Pair,
    String,
    Bool,
    Integer,
    Float,
    Identifier,
    ArgumentList,
    KeywordArgument,

    /// Bytes that couldn't be parsed.
    Error,

    /// `{{`, `}}`, `{%`, `%}`, `{#` or `#}`.
    Delimiter,
    /// `-` right inside a statement delimiter.
    TrimMarker,
    Keyword,
    Punctuation,
    Operator,
}

impl SyntaxKind {
    pub fn name(self) -> &'static str {
        match self {
            SyntaxKind::SourceFile => "source_file",
            SyntaxKind::Text => "text",
            SyntaxKind::Value => "value",
            SyntaxKind::Statement => "statement",
            SyntaxKind::Comment => "comment",
            SyntaxKind::CommentContent => "comment_content",
            SyntaxKind::Element => "element",
            SyntaxKind::TagName => "tag_name",
            SyntaxKind::Attribute => "attribute",
            SyntaxKind::AttributeName => "attribute_name",
            SyntaxKind::ForStatement => "for_statement",
            SyntaxKind::IfStatement => "if_statement",
            SyntaxKind::ElifClause => "elif_clause",
            SyntaxKind::ElseClause => "else_clause",
            SyntaxKind::IncludeStatement => "include_statement",
            SyntaxKind::ExtendsStatement => "extends_statement",
            SyntaxKind::BlockStatement => "block_statement",
            SyntaxKind::SetStatement => "set_statement",
            SyntaxKind::MacroStatement => "macro_statement",
            SyntaxKind::CallStatement => "call_statement",
            SyntaxKind::FilterStatement => "filter_statement",
            SyntaxKind::RawStatement => "raw_statement",
            SyntaxKind::ImportStatement => "import_statement",
            SyntaxKind::FromStatement => "from_statement",
            SyntaxKind::ImportedName => "imported_name",
            SyntaxKind::EndStatement => "end_statement",
            SyntaxKind::Comparison => "comparison",
            SyntaxKind::BinaryOperation => "binary_operation",
            SyntaxKind::UnaryOperation => "unary_operation",
            SyntaxKind::Call => "call",
            SyntaxKind::PropertyAccess => "property_access",
            SyntaxKind::Subscript => "subscript",
            SyntaxKind::List => "list",
            SyntaxKind::Dict => "dict",
            SyntaxKind::Pair => "pair",
            SyntaxKind::String => "string",
            SyntaxKind::Bool => "bool",
            SyntaxKind::Integer => "integer",
            SyntaxKind::Float => "float",
            SyntaxKind::Identifier => "identifier",
            SyntaxKind::ArgumentList => "argument_list",
            SyntaxKind::KeywordArgument => "keyword_argument",
            SyntaxKind::Error => "ERROR",
            SyntaxKind::Delimiter => "delimiter",
            SyntaxKind::TrimMarker => "trim_marker",
            SyntaxKind::Keyword => "keyword",
            SyntaxKind::Punctuation => "punctuation",
            SyntaxKind::Operator => "operator",
        }
    }

    /// Anonymous nodes are single tokens whose meaning is their text.
    pub fn is_named(self) -> bool {
        !matches!(
            self,
            SyntaxKind::Delimiter
                | SyntaxKind::TrimMarker
                | SyntaxKind::Keyword
                | SyntaxKind::Punctuation
                | SyntaxKind::Operator
        )
    }

    pub fn is_expression(self) -> bool {
        matches!(
            self,
            SyntaxKind::Comparison
                | SyntaxKind::BinaryOperation
                | SyntaxKind::UnaryOperation
                | SyntaxKind::Call
                | SyntaxKind::PropertyAccess
                | SyntaxKind::Subscript
                | SyntaxKind::List
                | SyntaxKind::Dict
                | SyntaxKind::String
                | SyntaxKind::Bool
                | SyntaxKind::Integer
                | SyntaxKind::Float
                | SyntaxKind::Identifier
        )
    }

    pub fn is_statement_body(self) -> bool {
        matches!(
            self,
            SyntaxKind::ForStatement
                | SyntaxKind::IfStatement
                | SyntaxKind::ElifClause
                | SyntaxKind::ElseClause
                | SyntaxKind::IncludeStatement
                | SyntaxKind::ExtendsStatement
                | SyntaxKind::BlockStatement
                | SyntaxKind::SetStatement
                | SyntaxKind::MacroStatement
                | SyntaxKind::CallStatement
                | SyntaxKind::FilterStatement
                | SyntaxKind::RawStatement
                | SyntaxKind::ImportStatement
                | SyntaxKind::FromStatement
                | SyntaxKind::EndStatement
        )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    OpenDelimiter,
    CloseDelimiter,
    LeadingTrim,
    TrailingTrim,
    Expression,
    Content,
    Name,
    CloseName,
    Value,
    Target,
    Iterable,
    Condition,
    Elif,
    Else,
    Template,
    Context,
    ParentTemplate,
    BlockName,
    Variable,
    MacroName,
    Params,
    Macro,
    FilterName,
    Module,
    Alias,
    Left,
    Right,
    Operator,
    Operand,
    Object,
    Property,
    Index,
    Function,
    Arguments,
    Key,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::OpenDelimiter => "open_delimiter",
            Field::CloseDelimiter => "close_delimiter",
            Field::LeadingTrim => "leading_trim",
            Field::TrailingTrim => "trailing_trim",
            Field::Expression => "expression",
            Field::Content => "content",
            Field::Name => "name",
            Field::CloseName => "close_name",
            Field::Value => "value",
            Field::Target => "target",
            Field::Iterable => "iterable",
            Field::Condition => "condition",
            Field::Elif => "elif",
            Field::Else => "else",
            Field::Template => "template",
            Field::Context => "context",
            Field::ParentTemplate => "parent_template",
            Field::BlockName => "block_name",
            Field::Variable => "variable",
            Field::MacroName => "macro_name",
            Field::Params => "params",
            Field::Macro => "macro",
            Field::FilterName => "filter_name",
            Field::Module => "module",
            Field::Alias => "alias",
            Field::Left => "left",
            Field::Right => "right",
            Field::Operator => "operator",
            Field::Operand => "operand",
            Field::Object => "object",
            Field::Property => "property",
            Field::Index => "index",
            Field::Function => "function",
            Field::Arguments => "arguments",
            Field::Key => "key",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: SyntaxKind,
    pub(crate) span: Span,
    /// Field under which the parent holds this node.
    pub(crate) field: Option<Field>,
    pub(crate) children: Vec<NodeId>,
}

/// Concrete syntax tree of one template.
///
/// Built once by the parser and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct SyntaxTree<'s> {
    source: &'s str,
    nodes: IndexVec<NodeId, NodeData>,
    root: NodeId,
}

impl<'s> SyntaxTree<'s> {
    pub(crate) fn new(source: &'s str, nodes: IndexVec<NodeId, NodeData>, root: NodeId) -> Self {
        Self {
            source,
            nodes,
            root,
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn root(&self) -> Node<'_, 's> {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> Node<'_, 's> {
        Node { tree: self, id }
    }

    /// Number of nodes, tokens included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of every node. The root has none.
    ///
    /// The tree keeps no back references, so this walks the whole arena.
    pub fn parent_index(&self) -> IndexVec<NodeId, Option<NodeId>> {
        let mut parents = index_vec::index_vec![None; self.nodes.len()];
        for (id, data) in self.nodes.iter_enumerated() {
            for child in &data.children {
                parents[*child] = Some(id);
            }
        }
        parents
    }

    /// All nodes in pre-order, starting with the root.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'_, 's>> {
        let mut stack = vec![self.root];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id].children.iter().rev().copied());
            Some(self.node(id))
        })
    }

    /// Single-line S-expression of the named nodes, in the style of tree-sitter.
    pub fn to_sexp(&self) -> String {
        self.root().to_sexp()
    }

    /// The S-expression laid out to fit `width` columns.
    pub fn pretty(&self, width: usize) -> String {
        tiny_pretty::print(
            &sexp_doc(self.root()),
            &PrintOptions {
                indent_kind: IndentKind::Space,
                line_break: LineBreak::Lf,
                width,
                tab_size: 2,
            },
        )
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Node<'t, 's> {
    tree: &'t SyntaxTree<'s>,
    id: NodeId,
}

impl<'t, 's> Node<'t, 's> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data().kind
    }

    pub fn is_named(&self) -> bool {
        self.kind().is_named()
    }

    pub fn span(&self) -> Span {
        self.data().span.clone()
    }

    pub fn start(&self) -> usize {
        self.data().span.start
    }

    pub fn end(&self) -> usize {
        self.data().span.end
    }

    /// Source text covered by this node.
    pub fn text(&self) -> &'s str {
        &self.tree.source[self.data().span.clone()]
    }

    /// Field under which the parent holds this node.
    pub fn field_name(&self) -> Option<Field> {
        self.data().field
    }

    pub fn children(
        &self,
    ) -> impl DoubleEndedIterator<Item = Node<'t, 's>> + ExactSizeIterator + use<'t, 's> {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |id| Node { tree, id: *id })
    }

    pub fn named_children(&self) -> impl DoubleEndedIterator<Item = Node<'t, 's>> + use<'t, 's> {
        self.children().filter(Node::is_named)
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    /// First child held under `field`.
    pub fn child_by_field(&self, field: Field) -> Option<Node<'t, 's>> {
        self.children_by_field(field).next()
    }

    /// All children held under `field`, in source order.
    pub fn children_by_field(
        &self,
        field: Field,
    ) -> impl Iterator<Item = Node<'t, 's>> + use<'t, 's> {
        self.children()
            .filter(move |child| child.field_name() == Some(field))
    }

    /// First child of the given kind.
    pub fn child_of_kind(&self, kind: SyntaxKind) -> Option<Node<'t, 's>> {
        self.children().find(|child| child.kind() == kind)
    }

    pub fn to_sexp(&self) -> String {
        let children = self
            .named_children()
            .map(|child| match child.field_name() {
                Some(field) => format!(" {field}: {}", child.to_sexp()),
                None => format!(" {}", child.to_sexp()),
            })
            .join("");
        format!("({}{children})", self.kind())
    }
}

impl PartialEq for Node<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_, '_> {}

impl fmt::Debug for Node<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.span())
    }
}

fn sexp_doc(node: Node) -> Doc<'static> {
    let children = node
        .named_children()
        .map(|child| {
            let doc = match child.field_name() {
                Some(field) => Doc::text(format!("{field}: ")).append(sexp_doc(child)),
                None => sexp_doc(child),
            };
            Doc::line_or_space().append(doc)
        })
        .collect::<Vec<_>>();
    Doc::text(format!("({}", node.kind()))
        .append(Doc::list(children).nest(2))
        .append(Doc::text(")"))
        .group()
}
