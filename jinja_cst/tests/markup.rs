use insta::assert_snapshot;
use jinja_cst::{
    ast::{AttributeValue, Element, Item, SourceFile},
    parse,
};

fn sexp(source: &str) -> String {
    let parse = parse(source);
    assert!(parse.errors.is_empty(), "{source}: {:?}", parse.errors);
    parse.tree.to_sexp()
}

#[test]
fn text() {
    assert_snapshot!(sexp("hello"), @"(source_file (text))");
    assert_snapshot!(sexp("a { b }"), @"(source_file (text))");
    assert_snapshot!(sexp("tail {"), @"(source_file (text))");
    assert_snapshot!(sexp("a {{ b }} c"), @"(source_file (text) (value expression: (identifier)) (text))");
}

#[test]
fn comments() {
    assert_snapshot!(sexp("{# a # b #}"), @"(source_file (comment content: (comment_content)))");
    assert_snapshot!(sexp("{##}"), @"(source_file (comment))");
    assert_snapshot!(sexp("{# {{ x }} {% if %} #}"), @"(source_file (comment content: (comment_content)))");

    let tree = parse("{# a # b #}").into_result().unwrap();
    let Some(Item::Comment(comment)) = SourceFile::cast(tree.root()).unwrap().items().next() else {
        panic!("not a comment");
    };
    assert_eq!(comment.content(), " a # b ");
}

#[test]
fn close_tag_name_isnt_checked() {
    let tree = parse("<a>text</b>").into_result().unwrap();
    assert_snapshot!(tree.to_sexp(), @"(source_file (element name: (tag_name) (text) close_name: (tag_name)))");

    let element = first_element(&tree);
    assert_eq!(element.tag_name(), Some("a"));
    assert_eq!(element.close_tag_name(), Some("b"));
    assert!(!element.is_self_closing());
}

#[test]
fn self_closing() {
    assert_snapshot!(sexp("<br/>"), @"(source_file (element name: (tag_name)))");
    assert_snapshot!(sexp("<br />"), @"(source_file (element name: (tag_name)))");

    let tree = parse("<img src='a.png' />").into_result().unwrap();
    let element = first_element(&tree);
    assert!(element.is_self_closing());
    assert_eq!(element.close_tag_name(), None);
}

#[test]
fn attributes() {
    let source = r#"<input disabled value="x" data-id={{ id }} />"#;
    let tree = parse(source).into_result().unwrap();
    assert_snapshot!(tree.to_sexp(), @"(source_file (element name: (tag_name) (attribute name: (attribute_name)) (attribute name: (attribute_name) value: (string)) (attribute name: (attribute_name) value: (value expression: (identifier)))))");

    let attributes = first_element(&tree).attributes().collect::<Vec<_>>();
    assert_eq!(
        attributes
            .iter()
            .map(|attribute| attribute.name().unwrap())
            .collect::<Vec<_>>(),
        ["disabled", "value", "data-id"]
    );
    assert!(attributes[0].value().is_none());
    assert!(matches!(attributes[1].value(), Some(AttributeValue::String(..))));
    assert!(matches!(attributes[2].value(), Some(AttributeValue::Value(..))));
}

#[test]
fn quoted_value_keeps_braces_as_string() {
    assert_snapshot!(sexp(r#"<img src="{{ logo }}"/>"#), @"(source_file (element name: (tag_name) (attribute name: (attribute_name) value: (string))))");
}

#[test]
fn nested_body() {
    let source = "<ul>{% for i in xs %}<li class='x'>{{ i }}</li>{# c #}{% endfor %}</ul>";
    let tree = parse(source).into_result().unwrap();
    assert_snapshot!(tree.to_sexp(), @"(source_file (element name: (tag_name) (statement (for_statement target: (identifier) iterable: (identifier))) (element name: (tag_name) (attribute name: (attribute_name) value: (string)) (value expression: (identifier)) close_name: (tag_name)) (comment content: (comment_content)) (statement (end_statement)) close_name: (tag_name)))");

    let kinds = first_element(&tree)
        .children()
        .map(|item| match item {
            Item::Text(..) => "text",
            Item::Value(..) => "value",
            Item::Statement(..) => "statement",
            Item::Comment(..) => "comment",
            Item::Element(..) => "element",
            Item::Error(..) => "error",
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, ["statement", "element", "comment", "statement"]);
}

#[test]
fn raw_inside_element() {
    assert_snapshot!(sexp("<pre>{% raw %}</pre>{% endraw %}</pre>"), @"(source_file (element name: (tag_name) (statement (raw_statement)) (text) (statement (end_statement)) close_name: (tag_name)))");
}

fn first_element<'t, 's>(tree: &'t jinja_cst::SyntaxTree<'s>) -> Element<'t, 's> {
    SourceFile::cast(tree.root())
        .unwrap()
        .items()
        .find_map(|item| match item {
            Item::Element(element) => Some(element),
            _ => None,
        })
        .unwrap()
}
