//! Per-field extractors driven by the broadcaster.
//!
//! Each listener is a small state machine over the node stream. It reports
//! that it has seen enough by returning [`Flow::Done`]; listeners that never
//! return it run until the stream ends or extraction is cancelled.

use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};
use url::Url;

use crate::decode::decode_body;
use crate::document::{NodeKind, PageNode};
use crate::fetch::Fetcher;
use crate::types::{Fragment, FragmentSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// What every listener may use besides the nodes themselves.
#[derive(Clone)]
pub struct ListenerContext {
    pub base_url: Arc<Url>,
    pub fetcher: Arc<dyn Fetcher>,
    pub sink: FragmentSink,
}

#[async_trait::async_trait]
pub trait Listener: Send {
    fn name(&self) -> &'static str;

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow;
}

/// The six extractors, in delivery order.
pub fn default_listeners() -> Vec<Box<dyn Listener>> {
    vec![
        Box::new(TitleListener),
        Box::new(BookmarkOfListener),
        Box::new(PostNameListener::default()),
        Box::new(TagsListener),
        Box::new(MycomarkupListener),
        Box::new(HFeedListener),
    ]
}

/// Only the first `<title>` counts, even when it is empty.
#[derive(Debug, Default)]
pub struct TitleListener;

#[async_trait::async_trait]
impl Listener for TitleListener {
    fn name(&self) -> &'static str {
        "title"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        if !node.is_element("title") {
            return Flow::Continue;
        }
        if let Some(text) = node.first_child_text() {
            cx.sink.emit(Fragment::Title(text.to_string()));
        }
        Flow::Done
    }
}

/// Reads the `href` of the first `u-bookmark-of` element, absolute URLs only.
#[derive(Debug, Default)]
pub struct BookmarkOfListener;

#[async_trait::async_trait]
impl Listener for BookmarkOfListener {
    fn name(&self) -> &'static str {
        "bookmark-of"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        if node.kind() != NodeKind::Element || !node.has_class("u-bookmark-of") {
            return Flow::Continue;
        }
        let Some(href) = node.attr("href") else {
            engine_debug!("u-bookmark-of without href, giving up");
            return Flow::Done;
        };
        // Relative hrefs are not resolved against the base here.
        match Url::parse(href) {
            Ok(url) => cx.sink.emit(Fragment::BookmarkOf(url)),
            Err(err) => engine_debug!("u-bookmark-of href {href:?} is not an absolute URL: {err}"),
        }
        Flow::Done
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum PostNameState {
    #[default]
    Seeking,
    Capturing,
}

/// After the first `p-name` marker every text node overwrites the name.
#[derive(Debug, Default)]
pub struct PostNameListener {
    state: PostNameState,
}

#[async_trait::async_trait]
impl Listener for PostNameListener {
    fn name(&self) -> &'static str {
        "post-name"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        match self.state {
            PostNameState::Seeking if node.has_class("p-name") => {
                self.state = PostNameState::Capturing;
            }
            PostNameState::Capturing => {
                if let Some(text) = node.text_content() {
                    cx.sink.emit(Fragment::PostName(text.to_string()));
                }
            }
            PostNameState::Seeking => {}
        }
        Flow::Continue
    }
}

/// Collects the text of every `p-category` element, duplicates included.
#[derive(Debug, Default)]
pub struct TagsListener;

#[async_trait::async_trait]
impl Listener for TagsListener {
    fn name(&self) -> &'static str {
        "tags"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        if node.kind() == NodeKind::Element && node.has_class("p-category") {
            if let Some(tag) = node.first_child_text() {
                cx.sink.emit(Fragment::Tag(tag.to_string()));
            }
        }
        Flow::Continue
    }
}

/// Fetches the document behind `<link rel="alternate" type="text/mycomarkup" href="...">`.
#[derive(Debug, Default)]
pub struct MycomarkupListener;

impl MycomarkupListener {
    fn candidate_href(node: &PageNode) -> Option<&str> {
        if !node.is_element("link") {
            return None;
        }
        let rel = node.attr("rel")?;
        let kind = node.attr("type")?;
        let href = node.attr("href")?;
        (rel == "alternate" && kind == "text/mycomarkup").then_some(href)
    }
}

#[async_trait::async_trait]
impl Listener for MycomarkupListener {
    fn name(&self) -> &'static str {
        "mycomarkup"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        let Some(href) = Self::candidate_href(node) else {
            return Flow::Continue;
        };
        let addr = match cx.base_url.join(href) {
            Ok(addr) => addr,
            Err(err) => {
                engine_warn!("URL {href:?} is a bad URL: {err}");
                return Flow::Continue;
            }
        };

        // One fetch attempt only; a failure here ends the search.
        let output = match cx.fetcher.fetch(&addr).await {
            Ok(output) => output,
            Err(err) => {
                engine_warn!("Failed to fetch Mycomarkup document from {addr}: {err}");
                return Flow::Done;
            }
        };
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref());
        if decoded.lossy {
            engine_warn!(
                "Mycomarkup document {addr} is not valid {}, kept with replacement characters",
                decoded.encoding_label
            );
        }
        engine_debug!("Mycomarkup document {addr} read, {} bytes", output.bytes.len());
        cx.sink.emit(Fragment::Mycomarkup(decoded.text));
        Flow::Done
    }
}

/// Decides feed vs. entry by whichever marker shows up first.
#[derive(Debug, Default)]
pub struct HFeedListener;

#[async_trait::async_trait]
impl Listener for HFeedListener {
    fn name(&self) -> &'static str {
        "h-feed"
    }

    async fn on_node(&mut self, node: &PageNode, cx: &ListenerContext) -> Flow {
        if node.has_class("h-feed") {
            cx.sink.emit(Fragment::HFeed);
            return Flow::Done;
        }
        // An entry before any feed marker: treat the page as a single post.
        if node.has_class("h-entry") {
            return Flow::Done;
        }
        Flow::Continue
    }
}
