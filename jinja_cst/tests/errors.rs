use jinja_cst::{SyntaxError, SyntaxErrorKind, config::ParseOptions, parse, parse_with_options};

fn single_error(source: &str) -> SyntaxError {
    let parse = parse(source);
    assert_eq!(parse.errors.len(), 1, "{source}: {:?}", parse.errors);
    assert_eq!(parse.tree.root().text(), source);
    parse.errors.into_iter().next().unwrap()
}

#[test]
fn unterminated_delimiters() {
    for (source, pos) in [
        ("{{ 1 + 2", 0),
        ("{{ x", 0),
        ("{{", 0),
        ("a {% if x", 2),
        ("{%", 0),
        ("{# abc", 0),
        ("{#", 0),
        ("<div>abc", 0),
        ("<p><b>x</b>", 0),
        (r#"<div class="a""#, 0),
        ("<div>{{ x", 5),
        ("{% raw %}abc", 0),
        ("{% raw %}", 0),
        ("{{ f(1, ", 0),
        ("{{ [1, {'a': 2", 0),
    ] {
        let error = single_error(source);
        assert_eq!(
            error.kind,
            SyntaxErrorKind::UnterminatedDelimiter,
            "{source}: {error}"
        );
        assert_eq!(error.pos, pos, "{source}");
    }
}

#[test]
fn unterminated_string() {
    let error = single_error("{{ 'abc }}");
    assert_eq!(error.kind, SyntaxErrorKind::UnterminatedStringLiteral);
    assert_eq!(error.pos, 3);

    let error = single_error(r#"<a href="x>"#);
    assert_eq!(error.kind, SyntaxErrorKind::UnterminatedStringLiteral);
    assert_eq!(error.pos, 8);
}

#[test]
fn unexpected_tokens() {
    for (source, pos) in [
        ("a </b>", 2),
        ("a < b", 4),
        ("{{ }}", 3),
        ("{{ x y }}", 5),
        ("{{ (a) }}", 3),
        ("{{ a | b }}", 5),
        ("{{ [,,] }}", 5),
        ("{{ [1,,] }}", 6),
        ("<a b=c></a>", 5),
        ("<a {% if x %}></a>", 3),
        ("{% set x %}", 9),
        ("{% for x, y in z %}", 8),
        ("{% include name %}", 11),
        ("{% import 'a' %}", 14),
    ] {
        let error = single_error(source);
        assert!(
            matches!(error.kind, SyntaxErrorKind::UnexpectedToken(..)),
            "{source}: {error}"
        );
        assert_eq!(error.pos, pos, "{source}");
    }
}

#[test]
fn message() {
    let error = single_error("{{ 1 + 2");
    assert_eq!(
        error.to_string(),
        "syntax error 'unterminated delimiter' at position 0"
    );
    let error = single_error("{{ x y }}");
    assert_eq!(error.message(), "unexpected token, expect `}}`");
}

#[test]
fn recovered_errors_are_in_source_order() {
    let options = ParseOptions {
        error_recovery: true,
        ..Default::default()
    };
    let source = "{{ 1 + }}<p>{% bogus %}</p>{{ 'open }}";
    let parse = parse_with_options(source, &options);
    let kinds = parse
        .errors
        .iter()
        .map(|error| (error.kind.clone(), error.pos))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            (SyntaxErrorKind::UnexpectedToken("expression"), 7),
            (SyntaxErrorKind::UnknownStatementKeyword, 15),
            (SyntaxErrorKind::UnterminatedStringLiteral, 30),
        ]
    );
    assert_eq!(parse.tree.root().text(), source);
    assert_eq!(
        parse.tree.to_sexp(),
        "(source_file (ERROR) (element name: (tag_name) (ERROR) close_name: (tag_name)) (ERROR))"
    );
}

#[test]
fn element_body_recovers_in_place() {
    let options = ParseOptions {
        error_recovery: true,
        ..Default::default()
    };
    let parse = parse_with_options("<p>{% bogus %}</p>", &options);
    assert_eq!(
        parse.errors,
        [SyntaxError {
            kind: SyntaxErrorKind::UnknownStatementKeyword,
            pos: 6,
        }]
    );
    assert_eq!(
        parse.tree.to_sexp(),
        "(source_file (element name: (tag_name) (ERROR) close_name: (tag_name)))"
    );

    let source = "<div>{{ x";
    let parse = parse_with_options(source, &options);
    let errors = parse
        .errors
        .iter()
        .map(|error| (error.kind.clone(), error.pos))
        .collect::<Vec<_>>();
    assert_eq!(
        errors,
        [
            (SyntaxErrorKind::UnterminatedDelimiter, 0),
            (SyntaxErrorKind::UnterminatedDelimiter, 5),
        ]
    );
    assert_eq!(parse.tree.to_sexp(), "(source_file (ERROR))");
    assert_eq!(parse.tree.root().text(), source);
}
