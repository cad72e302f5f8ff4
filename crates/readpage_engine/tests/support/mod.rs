#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use readpage_engine::{
    extract, Document, ExtractSettings, ExtractionResult, FailureKind, FetchError, FetchMetadata,
    FetchOutput, Fetcher,
};
use url::Url;

#[derive(Debug, Clone)]
pub enum StubResponse {
    Body(String),
    /// Raw body, served as UTF-8 whether or not it is.
    Bytes(Vec<u8>),
    Fail,
    Hang,
}

/// In-memory `Fetcher` that records every URL it is asked for.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, StubResponse>>,
    requested: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: StubResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Fetches started but not yet finished or dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchOutput, FetchError> {
        let _guard = InFlight::enter(&self.in_flight);
        self.requested.lock().unwrap().push(url.to_string());
        let response = self.responses.lock().unwrap().get(url.as_str()).cloned();
        match response {
            Some(StubResponse::Body(body)) => Ok(served(url, body.into_bytes())),
            Some(StubResponse::Bytes(bytes)) => Ok(served(url, bytes)),
            Some(StubResponse::Hang) => std::future::pending().await,
            Some(StubResponse::Fail) | None => {
                Err(FetchError::new(FailureKind::Network, "connection refused"))
            }
        }
    }
}

fn served(url: &Url, bytes: Vec<u8>) -> FetchOutput {
    FetchOutput {
        metadata: FetchMetadata {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            content_type: Some("text/mycomarkup; charset=utf-8".to_string()),
            byte_len: bytes.len() as u64,
        },
        bytes,
    }
}

pub fn base() -> Url {
    Url::parse("https://ex.com/post").unwrap()
}

pub async fn extract_html(html: &str, fetcher: Arc<StubFetcher>) -> ExtractionResult {
    engine_logging::initialize_for_tests();
    let document = Document::parse(html);
    extract(&document, base(), fetcher, ExtractSettings::default()).await
}
