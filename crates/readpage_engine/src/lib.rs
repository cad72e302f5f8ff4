//! Readpage engine: concurrent extraction of social-web metadata from remote pages.
mod broadcast;
mod decode;
mod document;
mod fetch;
mod listeners;
mod page;
mod types;

pub use broadcast::{extract, Broadcaster, Completion, ExtractSettings, ExtractionReport};
pub use decode::{decode_body, DecodedBody};
pub use document::{Document, NodeKind, PageNode};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use listeners::{
    default_listeners, BookmarkOfListener, Flow, HFeedListener, Listener, ListenerContext,
    MycomarkupListener, PostNameListener, TagsListener, TitleListener,
};
pub use page::{read_page, ReadPageError};
pub use types::{
    ExtractionResult, FailureKind, FetchError, FetchMetadata, FetchOutput, Fragment, FragmentSink,
};
