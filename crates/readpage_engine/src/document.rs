use std::sync::Arc;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// Owned, read-only snapshot of one node of a parsed page.
///
/// Snapshots are detached from the parser's tree so they can be shared across
/// listener tasks behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNode {
    kind: NodeKind,
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    first_child_text: Option<String>,
}

impl PageNode {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: Some(tag.into().to_ascii_lowercase()),
            ..Self::other()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            text: Some(text.into()),
            ..Self::other()
        }
    }

    pub fn other() -> Self {
        Self {
            kind: NodeKind::Other,
            tag: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            text: None,
            first_child_text: None,
        }
    }

    /// Adds every whitespace-separated token of `class` as a class.
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.extend(class.split_whitespace().map(str::to_string));
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_text_child(mut self, text: impl Into<String>) -> Self {
        self.first_child_text = Some(text.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// True for an element node named `tag`.
    pub fn is_element(&self, tag: &str) -> bool {
        self.kind == NodeKind::Element && self.tag.as_deref() == Some(tag)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Text content of a text node.
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Text of the immediate first child, when that child is a text node.
    pub fn first_child_text(&self) -> Option<&str> {
        self.first_child_text.as_deref()
    }

    fn snapshot(node: NodeRef<'_, Node>) -> Self {
        match node.value() {
            Node::Element(element) => {
                let first_child_text = node.first_child().and_then(|child| match child.value() {
                    Node::Text(text) => Some((**text).to_string()),
                    _ => None,
                });
                Self {
                    kind: NodeKind::Element,
                    tag: Some(element.name().to_ascii_lowercase()),
                    classes: element.classes().map(str::to_string).collect(),
                    attrs: element
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                    text: None,
                    first_child_text,
                }
            }
            Node::Text(text) => Self::text(&**text),
            _ => Self::other(),
        }
    }
}

/// A parsed page flattened into document (pre-)order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Arc<PageNode>>,
}

impl Document {
    /// Parse `html` leniently; malformed markup never fails here.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let nodes = parsed
            .tree
            .root()
            .descendants()
            .map(|node| Arc::new(PageNode::snapshot(node)))
            .collect();
        Self { nodes }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = PageNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = Arc<PageNode>> + Send + '_ {
        self.nodes.iter().cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
