//! Long-lived streaming sessions.
//!
//! A [`StreamSession`] owns one persistent connection and one
//! [`ValueExtractor`]. A spawned driver task reads fragments from the
//! [`ByteFeed`], feeds them to the extractor and hands every completed value
//! to the consumer through a single-slot channel, so a consumer that stops
//! polling also stops fragment reads.
//!
//! Teardown is a flag plus a wakeup. The driver selects on it ahead of
//! everything else, and the consumer side checks it before every poll, so no
//! value is yielded once [`close`](StreamSession::close) has returned.

use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt, future::BoxFuture};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, debug_span, trace, warn};
use url::Url;

use crate::{
    config::ClientOptions,
    parser::{ExtractorOptions, ParserError, ValueExtractor},
    transport::{ByteFeed, StreamRequest, Transport, TransportError},
};

#[derive(Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed stream: {0}")]
    Parse(#[from] ParserError),
}

/// Which family of streaming endpoints to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCategory {
    /// A public stream method such as `statuses/filter` or `statuses/sample`.
    Public(String),
    /// The authenticated user's stream.
    User,
    /// A site stream, multiplexing several users.
    Site,
}

impl StreamCategory {
    /// `"user"` and `"site"` select their own endpoint families; every other
    /// method is a public stream.
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        match method {
            "user" => StreamCategory::User,
            "site" => StreamCategory::Site,
            other => StreamCategory::Public(other.to_owned()),
        }
    }

    fn method(&self) -> &str {
        match self {
            StreamCategory::Public(method) => method,
            StreamCategory::User => "user",
            StreamCategory::Site => "site",
        }
    }

    fn base<'a>(&self, options: &'a ClientOptions) -> &'a str {
        match self {
            StreamCategory::Public(_) => &options.stream_base,
            StreamCategory::User => &options.user_stream_base,
            StreamCategory::Site => &options.site_stream_base,
        }
    }

    /// `{base}/{method}.json` for this category.
    ///
    /// # Errors
    ///
    /// Fails if the configured base does not form a valid URL.
    pub fn endpoint(&self, options: &ClientOptions) -> Result<Url, url::ParseError> {
        let base = self.base(options).trim_end_matches('/');
        let method = self.method().trim_start_matches('/');
        Url::parse(&format!("{base}/{method}.json"))
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State shared by the session, its handles and the driver task.
#[derive(Debug)]
struct Shared {
    state: watch::Sender<SessionState>,
    /// Set once by the first `close`.
    torn_down: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::Idle),
            torn_down: watch::Sender::new(false),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn is_torn_down(&self) -> bool {
        *self.torn_down.borrow()
    }

    /// Withholds a received item if a close landed while it was being received.
    fn admit<I>(&self, polled: Poll<Option<I>>) -> Poll<Option<I>> {
        match polled {
            Poll::Ready(Some(_)) if self.is_torn_down() => Poll::Ready(None),
            polled => polled,
        }
    }

    /// Moves to `to` if the current state is one of `from`.
    fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
        let mut previous = None;
        let moved = self.state.send_if_modified(|state| {
            if from.contains(state) {
                previous = Some(*state);
                *state = to;
                true
            } else {
                false
            }
        });
        if let Some(previous) = previous {
            debug!(from = %previous, to = %to, "session state");
        }
        moved
    }

    fn close(&self) {
        use SessionState::*;

        if self.transition(&[Idle, Connecting, Open], Closing) {
            debug!("teardown requested");
        }
        self.torn_down.send_replace(true);
    }
}

/// A cloneable handle for observing and tearing down a session from any task
/// or thread.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Requests teardown. Idempotent; a no-op once the session has ended.
    pub fn close(&self) {
        self.shared.close();
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Waits until the session reaches `Closed` or `Failed`.
    pub async fn closed(&self) -> SessionState {
        let mut state = self.shared.state.subscribe();
        match state.wait_for(|s| s.is_terminal()).await {
            Ok(s) => *s,
            Err(_) => self.state(),
        }
    }
}

/// An ordered stream of values decoded from one streaming connection.
///
/// Yields `Ok(value)` for each top-level JSON value, in arrival order. Ends
/// with `None` on clean end-of-stream or teardown, or with one `Err` followed
/// by `None` on failure. Dropping the session tears it down.
pub struct StreamSession<T = Value> {
    values: mpsc::Receiver<Result<T, StreamError>>,
    shared: Arc<Shared>,
}

impl<T> fmt::Debug for StreamSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl<T> StreamSession<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Starts connecting and returns at once; the connection is driven by a
    /// spawned task.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open<Tr: Transport + ?Sized>(transport: &Tr, request: StreamRequest, options: ExtractorOptions) -> Self {
        let shared = Arc::new(Shared::new());
        let (tx, rx) = mpsc::channel(1);

        shared.transition(&[SessionState::Idle], SessionState::Connecting);
        let span = debug_span!("stream_session", url = %request.url);
        let connect = transport.connect(request);
        let driver = Driver {
            shared: Arc::clone(&shared),
            values: tx,
            torn_down: shared.torn_down.subscribe(),
            options,
        };
        tokio::spawn(driver.run(connect).instrument(span));

        Self { values: rx, shared }
    }
}

impl<T> StreamSession<T> {
    /// Requests teardown. Idempotent; a no-op once the session has ended.
    pub fn close(&self) {
        self.shared.close();
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Stream for StreamSession<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.shared.is_torn_down() {
            return Poll::Ready(None);
        }
        let polled = this.values.poll_recv(cx);
        this.shared.admit(polled)
    }
}

impl<T> Drop for StreamSession<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Why the driver stopped reading.
enum Exit {
    Ended,
    TornDown,
    Failed(StreamError),
}

struct Driver<T> {
    shared: Arc<Shared>,
    values: mpsc::Sender<Result<T, StreamError>>,
    torn_down: watch::Receiver<bool>,
    options: ExtractorOptions,
}

impl<T> Driver<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(mut self, connect: BoxFuture<'static, Result<ByteFeed, TransportError>>) {
        use SessionState::*;

        let exit = self.pump(connect).await;
        match exit {
            Exit::Ended => {
                if !self.shared.transition(&[Open], Closed) {
                    self.shared.transition(&[Closing], Closed);
                }
            }
            Exit::TornDown => {
                self.shared.transition(&[Closing], Closed);
            }
            Exit::Failed(err) => {
                if self.shared.transition(&[Connecting, Open], Failed) {
                    warn!(error = %err, "stream session failed");
                    // Best effort: the consumer may already be gone.
                    let _ = self.send(Err(err)).await;
                } else {
                    self.shared.transition(&[Closing], Closed);
                }
            }
        }
    }

    async fn pump(&mut self, connect: BoxFuture<'static, Result<ByteFeed, TransportError>>) -> Exit {
        let mut feed = tokio::select! {
            biased;
            () = teardown(&mut self.torn_down) => return Exit::TornDown,
            connected = connect => match connected {
                Ok(feed) => feed,
                Err(err) => return Exit::Failed(err.into()),
            },
        };
        if !self
            .shared
            .transition(&[SessionState::Connecting], SessionState::Open)
        {
            return Exit::TornDown;
        }

        let mut extractor = ValueExtractor::<T>::new(self.options);
        let mut completed = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                () = teardown(&mut self.torn_down) => return Exit::TornDown,
                next = feed.next() => next,
            };

            let result = match next {
                Some(Ok(fragment)) => {
                    trace!(len = fragment.len(), "fragment");
                    extractor.feed_into(&fragment, &mut completed)
                }
                Some(Err(err)) => return Exit::Failed(err.into()),
                None => break,
            };

            for value in completed.drain(..) {
                if self.send(Ok(value)).await.is_err() {
                    return Exit::TornDown;
                }
            }
            if let Err(err) = result {
                return Exit::Failed(err.into());
            }
        }

        debug!("end of stream");
        drop(feed);
        match extractor.finish() {
            Ok(rest) => {
                for value in rest {
                    if self.send(Ok(value)).await.is_err() {
                        return Exit::TornDown;
                    }
                }
                Exit::Ended
            }
            Err(err) => Exit::Failed(err.into()),
        }
    }

    /// Hands one item to the consumer. Fails if teardown was requested first
    /// or the consumer is gone.
    async fn send(&mut self, item: Result<T, StreamError>) -> Result<(), ()> {
        tokio::select! {
            biased;
            () = teardown(&mut self.torn_down) => Err(()),
            sent = self.values.send(item) => {
                if sent.is_ok() {
                    trace!("value emitted");
                }
                sent.map_err(|_| ())
            }
        }
    }
}

/// Resolves once teardown has been requested.
async fn teardown(torn_down: &mut watch::Receiver<bool>) {
    let sender_gone = torn_down.wait_for(|flag| *flag).await.is_err();
    if sender_gone {
        // The sender lives in `Shared`, which outlives the driver.
        std::future::pending::<()>().await;
    }
}
