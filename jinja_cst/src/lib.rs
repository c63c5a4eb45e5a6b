#![doc = include_str!("../README.md")]

pub mod ast;
pub mod config;
mod error;
mod lexer;
mod parser;
mod tree;

use crate::{config::ParseOptions, parser::Parser};
pub use crate::{
    error::*,
    tree::{Field, Node, NodeId, Span, SyntaxKind, SyntaxTree},
};
use std::sync::atomic::AtomicBool;

/// Result of parsing a template.
///
/// The tree is always complete and covers the whole source, even when `errors` isn't empty:
/// malformed regions show up as `ERROR` nodes.
#[derive(Clone, Debug)]
pub struct Parse<'s> {
    pub tree: SyntaxTree<'s>,
    pub errors: Vec<SyntaxError>,
}

impl<'s> Parse<'s> {
    pub fn into_result(self) -> Result<SyntaxTree<'s>, Vec<SyntaxError>> {
        if self.errors.is_empty() {
            Ok(self.tree)
        } else {
            Err(self.errors)
        }
    }
}

/// Parse the given template with default options.
///
/// ```
/// let parse = jinja_cst::parse("<p>{{ user.name }}</p>");
/// assert!(parse.errors.is_empty());
/// assert_eq!(
///     parse.tree.to_sexp(),
///     "(source_file (element name: (tag_name) (value expression: (property_access object: (identifier) property: (identifier))) close_name: (tag_name)))",
/// );
/// ```
pub fn parse(source: &str) -> Parse<'_> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse the given template.
///
/// ```
/// use jinja_cst::{config::ParseOptions, parse_with_options};
///
/// let options = ParseOptions {
///     error_recovery: true,
///     ..Default::default()
/// };
/// let parse = parse_with_options("{{ 1 + }} ok {{ x }}", &options);
/// assert_eq!(parse.errors.len(), 1);
/// assert_eq!(
///     parse.tree.to_sexp(),
///     "(source_file (ERROR) (value expression: (identifier)))",
/// );
/// ```
pub fn parse_with_options<'s>(source: &'s str, options: &ParseOptions) -> Parse<'s> {
    match Parser::new(source, options).parse_source_file(None) {
        Ok((tree, errors)) => Parse { tree, errors },
        Err(Cancelled) => unreachable!("parsing without a cancellation flag"),
    }
}

/// Parse the given template, giving up once `cancel` is set.
///
/// The flag is checked between top-level items, so a long template can be abandoned
/// from another thread without waiting for it to finish.
pub fn parse_cancellable<'s>(
    source: &'s str,
    options: &ParseOptions,
    cancel: &AtomicBool,
) -> Result<Parse<'s>, Cancelled> {
    let (tree, errors) = Parser::new(source, options).parse_source_file(Some(cancel))?;
    Ok(Parse { tree, errors })
}
