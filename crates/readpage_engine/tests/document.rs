use pretty_assertions::assert_eq;
use readpage_engine::{Document, NodeKind, PageNode};

fn find(document: &Document, tag: &str) -> std::sync::Arc<PageNode> {
    document
        .nodes()
        .find(|node| node.is_element(tag))
        .unwrap_or_else(|| panic!("no <{tag}> in document"))
}

#[test]
fn class_attribute_is_split_into_tokens() {
    let document = Document::parse(r#"<p class="  h-entry   p-name
        u-bookmark-of ">x</p>"#);
    let p = find(&document, "p");

    assert!(p.has_class("h-entry"));
    assert!(p.has_class("p-name"));
    assert!(p.has_class("u-bookmark-of"));
    assert!(!p.has_class("p-nam"));
    assert!(!p.has_class("h-entry p-name"));
}

#[test]
fn attributes_and_text_child_are_captured() {
    let document =
        Document::parse(r#"<head><link rel="alternate" type="text/mycomarkup" href="/a"></head><body><a href="/x">label</a><b><i>nested</i></b></body>"#);

    let link = find(&document, "link");
    assert_eq!(link.attr("rel"), Some("alternate"));
    assert_eq!(link.attr("type"), Some("text/mycomarkup"));
    assert_eq!(link.attr("href"), Some("/a"));
    assert_eq!(link.attr("title"), None);
    assert_eq!(link.first_child_text(), None);

    assert_eq!(find(&document, "a").first_child_text(), Some("label"));
    // First child is an element, not text.
    assert_eq!(find(&document, "b").first_child_text(), None);
}

#[test]
fn nodes_come_in_pre_order() {
    let document = Document::parse("<html><head></head><body><ul><li>1</li><li>2</li></ul></body></html>");
    let kinds: Vec<(NodeKind, Option<String>)> = document
        .nodes()
        .map(|node| {
            (
                node.kind(),
                node.tag()
                    .map(str::to_string)
                    .or_else(|| node.text_content().map(str::to_string)),
            )
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            (NodeKind::Other, None),
            (NodeKind::Element, Some("html".into())),
            (NodeKind::Element, Some("head".into())),
            (NodeKind::Element, Some("body".into())),
            (NodeKind::Element, Some("ul".into())),
            (NodeKind::Element, Some("li".into())),
            (NodeKind::Text, Some("1".into())),
            (NodeKind::Element, Some("li".into())),
            (NodeKind::Text, Some("2".into())),
        ]
    );
}

#[test]
fn malformed_markup_still_produces_nodes() {
    let document = Document::parse("<title>Unclosed<p class='p-category'>tag<div><span>");
    assert!(!document.is_empty());
    assert_eq!(find(&document, "title").first_child_text(), Some("Unclosed<p class='p-category'>tag<div><span>"));
}

#[test]
fn builders_describe_nodes_from_other_sources() {
    let node = PageNode::element("A")
        .with_class("p-category tag")
        .with_attr("href", "/t")
        .with_text_child("rust");

    assert!(node.is_element("a"));
    assert!(node.has_class("tag"));
    assert_eq!(node.attr("href"), Some("/t"));
    assert_eq!(node.first_child_text(), Some("rust"));
    assert_eq!(PageNode::text("x").kind(), NodeKind::Text);
    assert!(!PageNode::text("x").has_class("x"));
}
