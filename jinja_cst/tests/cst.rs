use anyhow::{Context, Result, ensure};
use insta::glob;
use itertools::Itertools;
use jinja_cst::{
    Cancelled, Field, Node, Parse, SyntaxKind, SyntaxTree, config::ParseOptions, parse,
    parse_cancellable, parse_with_options,
};
use std::{fs, path::Path, sync::atomic::AtomicBool};

#[test]
fn ok_fixtures() {
    glob!("fixtures/ok/*.jinja", |path| {
        let input = fs::read_to_string(path).unwrap();
        let parse = parse(&input);
        assert!(
            parse.errors.is_empty(),
            "'{}' has errors: {:?}",
            path.display(),
            parse.errors
        );
        check_tiling(path, &input, &parse).unwrap();
    });
}

#[test]
fn recover_fixtures() {
    glob!("fixtures/recover/*.jinja", |path| {
        let input = fs::read_to_string(path).unwrap();
        let options = ParseOptions {
            error_recovery: true,
            ..Default::default()
        };
        let parse = parse_with_options(&input, &options);
        assert!(
            !parse.errors.is_empty(),
            "'{}' was expected to have errors",
            path.display()
        );
        assert!(
            parse
                .errors
                .iter()
                .tuple_windows()
                .all(|(a, b)| a.pos <= b.pos),
            "errors of '{}' aren't in source order",
            path.display()
        );
        check_tiling(path, &input, &parse).unwrap();
    });
}

/// Top-level items are contiguous and cover the whole source,
/// and every child lies inside its parent after its previous sibling.
fn check_tiling(path: &Path, input: &str, parse: &Parse) -> Result<()> {
    let root = parse.tree.root();
    let output = root.children().map(|item| item.text()).collect::<String>();
    similar_asserts::assert_eq!(
        output.as_str(),
        input,
        "'{}' doesn't round-trip",
        path.display()
    );
    for (a, b) in root.children().tuple_windows() {
        ensure!(a.end() == b.start(), "gap between {a:?} and {b:?}");
    }
    check_nesting(root).with_context(|| format!("bad spans in '{}'", path.display()))
}

fn check_nesting(node: Node) -> Result<()> {
    let mut last_end = node.start();
    for child in node.children() {
        ensure!(
            child.start() >= last_end && child.end() <= node.end(),
            "{child:?} is out of place in {node:?}"
        );
        last_end = child.end();
        check_nesting(child)?;
    }
    match node.kind() {
        SyntaxKind::Statement => ensure!(
            node.children()
                .filter(|child| child.kind().is_statement_body())
                .count()
                == 1,
            "{node:?} should hold exactly one statement body"
        ),
        SyntaxKind::Value => ensure!(
            node.child_by_field(Field::Expression)
                .is_some_and(|expr| expr.kind().is_expression()),
            "{node:?} should hold an expression"
        ),
        _ => {}
    }
    Ok(())
}

#[test]
fn empty_source() {
    let parse = parse("");
    assert!(parse.errors.is_empty());
    assert_eq!(parse.tree.to_sexp(), "(source_file)");
    assert_eq!(parse.tree.root().span(), 0..0);
}

#[test]
fn fatal_error_covers_rest_of_input() {
    let source = "ok {{ 1 + }} more {{ x }}";
    let parse = parse(source);
    assert_eq!(parse.errors.len(), 1);
    assert_eq!(parse.tree.to_sexp(), "(source_file (text) (ERROR))");
    let error = parse.tree.root().children().last().unwrap();
    assert_eq!(error.span(), 3..source.len());
    assert!(parse.into_result().is_err());
}

#[test]
fn recovery_resumes_at_next_opener() {
    let options = ParseOptions {
        error_recovery: true,
        ..Default::default()
    };
    let source = "{% bogus %} a {{ b }}{# c #}";
    let parse = parse_with_options(source, &options);
    assert_eq!(parse.errors.len(), 1);
    assert_eq!(
        parse.tree.to_sexp(),
        "(source_file (ERROR) (value expression: (identifier)) (comment content: (comment_content)))"
    );
    let error = parse.tree.root().children().next().unwrap();
    assert_eq!(error.text(), "{% bogus %} a ");
}

#[test]
fn pretty_matches_sexp() {
    let parse = parse(
        "<ul>{% for user in users if user.active %}<li>{{ user.name }}</li>{% endfor %}</ul>",
    );
    assert_eq!(parse.tree.pretty(10_000), parse.tree.to_sexp());

    let narrow = parse.tree.pretty(20);
    assert!(narrow.lines().count() > 1);
    assert_eq!(
        narrow.split_whitespace().join(" "),
        parse.tree.to_sexp(),
        "{narrow}"
    );
}

#[test]
fn parent_index() {
    let parse = parse("<p>{{ a.b }}</p>");
    let tree = &parse.tree;
    let parents = tree.parent_index();
    assert_eq!(parents[tree.root().id()], None);
    for node in tree.descendants().skip(1) {
        let parent = parents[node.id()].map(|id| tree.node(id)).unwrap();
        assert!(parent.children().any(|child| child == node));
    }
    assert_eq!(tree.descendants().count(), tree.len());
}

#[test]
fn named_fields() {
    let parse = parse("{% if a elif b elif c else %}");
    let root = parse.tree.root();
    let statement = root.children().next().unwrap();
    let body = statement.named_children().next().unwrap();
    assert_eq!(body.kind().name(), "if_statement");
    assert_eq!(body.children_by_field(Field::Elif).count(), 2);
    assert!(body.child_by_field(Field::Else).is_some());
    assert_eq!(
        statement
            .child_by_field(Field::OpenDelimiter)
            .map(|node| node.text()),
        Some("{%")
    );
}

#[test]
fn cancellation() {
    let cancel = AtomicBool::new(true);
    let result = parse_cancellable("a {{ b }}", &Default::default(), &cancel);
    assert_eq!(result.err(), Some(Cancelled));

    let cancel = AtomicBool::new(false);
    let parse = parse_cancellable("a {{ b }}", &Default::default(), &cancel).unwrap();
    assert!(parse.errors.is_empty());
}

#[test]
fn trees_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SyntaxTree<'static>>();
    assert_send_sync::<Parse<'static>>();
}

#[cfg(feature = "config_serde")]
#[test]
fn options_from_toml() {
    let options = toml::from_str::<ParseOptions>("errorRecovery = true\nmaxDepth = 8").unwrap();
    assert!(options.error_recovery);
    assert_eq!(options.max_depth.get(), 8);

    let options = toml::from_str::<ParseOptions>("").unwrap();
    assert!(!options.error_recovery);
    assert_eq!(options.max_depth.get(), 256);
}
