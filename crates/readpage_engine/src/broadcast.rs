use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use futures_util::future::select_all;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::document::{Document, PageNode};
use crate::fetch::Fetcher;
use crate::listeners::{default_listeners, Flow, Listener, ListenerContext};
use crate::types::{ExtractionResult, FragmentSink};

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Overall budget for traversal plus listener work, secondary fetches included.
    pub deadline: Duration,
    /// Time listeners get to exit after cancellation before being aborted.
    pub grace_period: Duration,
    /// Per-listener channel size. Nodes beyond it queue in the broadcaster, and the
    /// walk only pauses while every listener is behind.
    pub feed_capacity: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            grace_period: Duration::from_secs(1),
            feed_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every listener finished before the document ran out.
    AllListenersDone,
    /// The document ran out and the remaining listeners drained their feeds.
    TraversalExhausted,
    /// The caller's cancellation token fired.
    Cancelled,
    DeadlineElapsed,
}

/// How an extraction run ended. Purely diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub completion: Completion,
    pub nodes_delivered: usize,
    pub listeners_joined: usize,
    pub listeners_aborted: usize,
}

/// Delivers one document traversal to a set of listeners.
///
/// A broadcaster is single use: [`Broadcaster::run`] consumes it together with
/// its listeners, because listeners carry per-document state.
pub struct Broadcaster {
    settings: ExtractSettings,
    base_url: Arc<Url>,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
    listeners: Vec<Box<dyn Listener>>,
}

/// Outbound side of one listener's feed.
///
/// Nodes the channel cannot take yet wait in `backlog`, so a listener that is
/// busy (a slow secondary fetch, say) only ever holds up itself.
struct Feed {
    name: &'static str,
    tx: mpsc::Sender<Arc<PageNode>>,
    done: Arc<AtomicBool>,
    backlog: VecDeque<Arc<PageNode>>,
}

impl Feed {
    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn is_backlogged(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// Hand over queued nodes without waiting. False once the listener has gone away.
    fn flush(&mut self) -> bool {
        while let Some(node) = self.backlog.pop_front() {
            match self.tx.try_send(node) {
                Ok(()) => {}
                Err(TrySendError::Full(node)) => {
                    self.backlog.push_front(node);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    self.backlog.clear();
                    return false;
                }
            }
        }
        !self.tx.is_closed()
    }
}

/// Resolves once any backlogged feed has room again or has closed.
async fn any_capacity(feeds: &[Feed]) {
    let waits: Vec<_> = feeds
        .iter()
        .filter(|feed| feed.is_backlogged())
        .map(|feed| Box::pin(feed.tx.reserve()))
        .collect();
    if waits.is_empty() {
        return;
    }
    // The permit is released right away; `flush` takes the slot with `try_send`.
    let _ = select_all(waits).await;
}

/// Sets the completion flag however the listener task ends, aborts included.
struct DoneGuard(Arc<AtomicBool>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Why a listener task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The listener returned `Flow::Done`.
    Finished,
    /// Its feed closed after the last node.
    Drained,
    Cancelled,
}

impl Broadcaster {
    pub fn new(base_url: Url, fetcher: Arc<dyn Fetcher>, settings: ExtractSettings) -> Self {
        Self {
            settings,
            base_url: Arc::new(base_url),
            fetcher,
            cancel: CancellationToken::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_default_listeners(mut self) -> Self {
        self.listeners.extend(default_listeners());
        self
    }

    /// Tie the run to `parent`: cancelling it stops the extraction.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Feed `nodes` to every listener and merge what they found into `result`.
    ///
    /// Never fails; whatever the listeners committed before the run ended is kept.
    pub async fn run<I>(self, nodes: I, result: &mut ExtractionResult) -> ExtractionReport
    where
        I: IntoIterator<Item = Arc<PageNode>>,
    {
        let Broadcaster {
            settings,
            base_url,
            fetcher,
            cancel,
            listeners,
        } = self;

        let (sink, mut fragments) = FragmentSink::channel();
        let context = ListenerContext {
            base_url,
            fetcher,
            sink,
        };

        let mut tasks = JoinSet::new();
        let mut feeds = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let (tx, rx) = mpsc::channel(settings.feed_capacity.max(1));
            let done = Arc::new(AtomicBool::new(false));
            let name = listener.name();
            tasks.spawn(drive(
                listener,
                rx,
                context.clone(),
                cancel.clone(),
                DoneGuard(done.clone()),
            ));
            feeds.push(Feed {
                name,
                tx,
                done,
                backlog: VecDeque::new(),
            });
        }
        // Only the listener tasks may hold the sink from here on.
        drop(context);

        let deadline = tokio::time::sleep(settings.deadline);
        tokio::pin!(deadline);

        let mut stopped: Option<Completion> = None;
        let mut nodes_delivered = 0;

        'traversal: for node in nodes {
            feeds.retain_mut(|feed| {
                let attached = !feed.is_done() && feed.flush();
                if !attached {
                    engine_trace!("listener {} detached", feed.name);
                }
                attached
            });
            if feeds.is_empty() {
                break;
            }
            for feed in feeds.iter_mut() {
                feed.backlog.push_back(Arc::clone(&node));
                feed.flush();
            }
            nodes_delivered += 1;

            // Walk at the pace of the fastest listener.
            while !feeds.is_empty() && feeds.iter().all(Feed::is_backlogged) {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        stopped = Some(Completion::Cancelled);
                        break 'traversal;
                    }
                    () = &mut deadline => {
                        stopped = Some(Completion::DeadlineElapsed);
                        break 'traversal;
                    }
                    () = any_capacity(&feeds) => {}
                }
                feeds.retain_mut(Feed::flush);
            }
        }

        // Hand over what is still queued. A feed is closed as soon as it is empty,
        // which lets its listener drain and exit while slower ones catch up.
        if stopped.is_none() {
            loop {
                feeds.retain_mut(|feed| feed.flush() && feed.is_backlogged());
                if feeds.is_empty() {
                    break;
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        stopped = Some(Completion::Cancelled);
                        break;
                    }
                    () = &mut deadline => {
                        stopped = Some(Completion::DeadlineElapsed);
                        break;
                    }
                    () = any_capacity(&feeds) => {}
                }
            }
        }
        drop(feeds);

        let mut listeners_joined = 0;
        let mut drained = false;
        if stopped.is_none() {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        stopped = Some(Completion::Cancelled);
                        break;
                    }
                    () = &mut deadline => {
                        stopped = Some(Completion::DeadlineElapsed);
                        break;
                    }
                    joined = tasks.join_next() => match joined {
                        Some(outcome) => {
                            drained |= record_join(outcome) == Some(Exit::Drained);
                            listeners_joined += 1;
                        }
                        None => break,
                    },
                }
            }
        }

        cancel.cancel();
        let grace = tokio::time::timeout(settings.grace_period, async {
            while let Some(outcome) = tasks.join_next().await {
                let _ = record_join(outcome);
                listeners_joined += 1;
            }
        })
        .await;
        let listeners_aborted = tasks.len();
        if grace.is_err() {
            engine_warn!("{listeners_aborted} listener(s) ignored cancellation, aborting");
            tasks.shutdown().await;
        }

        while let Ok(fragment) = fragments.try_recv() {
            result.apply(fragment);
        }

        // Without a stop signal every task has joined, so `drained` is final.
        let completion = stopped.unwrap_or(if drained {
            Completion::TraversalExhausted
        } else {
            Completion::AllListenersDone
        });
        engine_info!(
            "extraction finished: {completion:?} after {nodes_delivered} node(s), {listeners_joined} listener(s) joined"
        );

        ExtractionReport {
            completion,
            nodes_delivered,
            listeners_joined,
            listeners_aborted,
        }
    }
}

/// Listener task: pull nodes until the listener is done, the feed closes, or cancellation.
async fn drive(
    mut listener: Box<dyn Listener>,
    mut feed: mpsc::Receiver<Arc<PageNode>>,
    cx: ListenerContext,
    cancel: CancellationToken,
    _done: DoneGuard,
) -> (&'static str, Exit) {
    let name = listener.name();
    loop {
        let node = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                engine_trace!("listener {name} cancelled while waiting");
                return (name, Exit::Cancelled);
            }
            next = feed.recv() => match next {
                Some(node) => node,
                None => return (name, Exit::Drained),
            },
        };
        let flow = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                engine_debug!("listener {name} cancelled mid-node");
                return (name, Exit::Cancelled);
            }
            flow = listener.on_node(&node, &cx) => flow,
        };
        if flow == Flow::Done {
            engine_trace!("listener {name} done");
            return (name, Exit::Finished);
        }
    }
}

/// A panicked listener counts as having stopped on its own.
fn record_join(outcome: Result<(&'static str, Exit), JoinError>) -> Option<Exit> {
    match outcome {
        Ok((name, exit)) => {
            engine_trace!("listener {name} joined: {exit:?}");
            Some(exit)
        }
        Err(err) if err.is_panic() => {
            engine_warn!("listener task panicked: {err}");
            Some(Exit::Finished)
        }
        Err(err) => {
            engine_debug!("listener task ended: {err}");
            None
        }
    }
}

/// Run the default listeners over `document`.
pub async fn extract(
    document: &Document,
    base_url: Url,
    fetcher: Arc<dyn Fetcher>,
    settings: ExtractSettings,
) -> ExtractionResult {
    let mut result = ExtractionResult::default();
    Broadcaster::new(base_url, fetcher, settings)
        .with_default_listeners()
        .run(document.nodes(), &mut result)
        .await;
    result
}
