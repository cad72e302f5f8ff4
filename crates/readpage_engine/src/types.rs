use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

/// Social-web metadata read from one remote page.
///
/// Every field is written by exactly one listener. Any subset may be missing:
/// a partially filled result is a normal outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub title: Option<String>,
    pub bookmark_of: Option<Url>,
    pub post_name: Option<String>,
    pub tags: Vec<String>,
    pub mycomarkup: Option<String>,
    pub is_h_feed: bool,
}

impl ExtractionResult {
    pub fn apply(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Title(title) => self.title = Some(title),
            Fragment::BookmarkOf(url) => self.bookmark_of = Some(url),
            Fragment::PostName(name) => self.post_name = Some(name),
            Fragment::Tag(tag) => self.tags.push(tag),
            Fragment::Mycomarkup(text) => self.mycomarkup = Some(text),
            Fragment::HFeed => self.is_h_feed = true,
        }
    }

    /// True when the page declares itself a bookmark of `target`.
    pub fn is_bookmark_of(&self, target: &Url) -> bool {
        self.bookmark_of.as_ref() == Some(target)
    }
}

/// One committed write to an [`ExtractionResult`] field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Title(String),
    BookmarkOf(Url),
    PostName(String),
    Tag(String),
    Mycomarkup(String),
    HFeed,
}

/// Write half handed to listeners; the broadcaster keeps the read half.
#[derive(Debug, Clone)]
pub struct FragmentSink {
    tx: mpsc::UnboundedSender<Fragment>,
}

impl FragmentSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Fragment>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, fragment: Fragment) {
        let _ = self.tx.send(fragment);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub requested_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

/// Why a page or a secondary document could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} ({message})")]
pub struct FetchError {
    pub kind: FailureKind,
    /// Detail from the HTTP stack, for logs only.
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self { kind, message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Not something the fetcher can ask for, such as a `mailto:` link.
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    /// `actual` is the declared length, or how far the stream got before it was cut.
    TooLarge { max_bytes: u64, actual: u64 },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl => f.write_str("not an http(s) URL"),
            Self::HttpStatus(code) => write!(f, "peer answered {code}"),
            Self::Timeout => f.write_str("peer did not answer in time"),
            Self::RedirectLimitExceeded => f.write_str("too many redirects"),
            Self::TooLarge { max_bytes, actual } => {
                write!(f, "body of {actual} bytes is over the {max_bytes} byte limit")
            }
            Self::UnsupportedContentType { content_type } => {
                write!(f, "content type {content_type} is not accepted")
            }
            Self::Network => f.write_str("network failure"),
        }
    }
}
