use std::sync::Arc;

use engine_logging::{engine_info, engine_warn};
use url::Url;

use crate::broadcast::{extract, ExtractSettings};
use crate::decode::decode_body;
use crate::document::Document;
use crate::fetch::Fetcher;
use crate::types::{ExtractionResult, FetchError};

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Failures of the page itself. Problems inside the page never show up here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReadPageError {
    #[error("failed to fetch page: {0}")]
    Fetch(#[from] FetchError),
    #[error("page is not HTML but {content_type}")]
    NotHtml { content_type: String },
}

/// Fetch a remote page and extract its social-web metadata.
///
/// Relative links inside the page resolve against the URL reached after
/// redirects.
pub async fn read_page(
    fetcher: Arc<dyn Fetcher>,
    url: &Url,
    settings: ExtractSettings,
) -> Result<ExtractionResult, ReadPageError> {
    let output = fetcher.fetch(url).await?;

    let content_type = output.metadata.content_type.as_deref();
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or(ct).trim();
        if !HTML_CONTENT_TYPES
            .iter()
            .any(|html| html.eq_ignore_ascii_case(essence))
        {
            return Err(ReadPageError::NotHtml {
                content_type: ct.to_string(),
            });
        }
    }

    let decoded = decode_body(&output.bytes, content_type);
    if decoded.lossy {
        engine_warn!("{url} is not valid {}, reading it anyway", decoded.encoding_label);
    }
    let document = Document::parse(&decoded.text);
    let base_url = Url::parse(&output.metadata.final_url).unwrap_or_else(|_| url.clone());

    let result = extract(&document, base_url, fetcher, settings).await;
    engine_info!(
        "read {url}: {} node(s), title={:?}, {} tag(s)",
        document.len(),
        result.title,
        result.tags.len()
    );
    Ok(result)
}
