//! In-memory transport for driving sessions from tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use birdstream::{ByteFeed, StreamRequest, Transport, TransportError};
use bytes::Bytes;
use futures::{
    FutureExt, StreamExt,
    channel::{mpsc, oneshot},
    future::BoxFuture,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pushes fragments into a session's feed.
pub struct FeedSender(mpsc::UnboundedSender<Result<Bytes, TransportError>>);

impl FeedSender {
    pub fn send(&self, fragment: &[u8]) {
        // The session may already have dropped the feed.
        let _ = self.0.unbounded_send(Ok(Bytes::copy_from_slice(fragment)));
    }

    pub fn fail(&self, err: TransportError) {
        let _ = self.0.unbounded_send(Err(err));
    }

    /// Ends the response body.
    pub fn end(self) {}

    /// Whether the session has abandoned the feed.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

enum Connect {
    Feed(ByteFeed),
    Gated(oneshot::Receiver<()>, ByteFeed),
    Refuse(TransportError),
}

/// A [`Transport`] that hands out one prepared feed and records the request.
pub struct ChannelTransport {
    connect: Mutex<Option<Connect>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl ChannelTransport {
    fn with(connect: Connect) -> Self {
        Self {
            connect: Mutex::new(Some(connect)),
            requests: Arc::default(),
        }
    }

    /// Connects at once.
    pub fn open() -> (Self, FeedSender) {
        let (tx, rx) = mpsc::unbounded();
        (Self::with(Connect::Feed(rx.boxed())), FeedSender(tx))
    }

    /// Connects once the returned gate fires (or is dropped).
    pub fn gated() -> (Self, FeedSender, oneshot::Sender<()>) {
        let (tx, rx) = mpsc::unbounded();
        let (gate_tx, gate_rx) = oneshot::channel();
        (
            Self::with(Connect::Gated(gate_rx, rx.boxed())),
            FeedSender(tx),
            gate_tx,
        )
    }

    /// Fails to connect with `err`.
    pub fn refusing(err: TransportError) -> Self {
        Self::with(Connect::Refuse(err))
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<StreamRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl Transport for ChannelTransport {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<ByteFeed, TransportError>> {
        self.requests.lock().unwrap().push(request);
        let connect = self.connect.lock().unwrap().take();
        async move {
            match connect {
                Some(Connect::Feed(feed)) => Ok(feed),
                Some(Connect::Gated(gate, feed)) => {
                    let _ = gate.await;
                    Ok(feed)
                }
                Some(Connect::Refuse(err)) => Err(err),
                None => Err(std::io::Error::other("transport already used").into()),
            }
        }
        .boxed()
    }
}
