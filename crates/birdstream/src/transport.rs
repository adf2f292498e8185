//! The byte-level transport behind a stream session.
//!
//! A session needs exactly three things from its transport: fragments in
//! order, a signal when they end, and a way to abandon the connection. A
//! [`ByteFeed`] covers all three: items are fragments, `None` is
//! end-of-stream, an `Err` item is a transport failure, and dropping the feed
//! abandons the connection.

use std::sync::Arc;

use bytes::Bytes;
use futures::{
    FutureExt, StreamExt, TryStreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use reqwest::{Method, header::AUTHORIZATION};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{auth::OAuthSigner, error::HttpStatusError, rest::Params};

/// Fragments of one response body, in arrival order.
pub type ByteFeed = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Status(#[from] HttpStatusError),
    #[error("connection error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A streaming GET: the endpoint and its query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub url: Url,
    pub params: Params,
}

impl StreamRequest {
    /// The endpoint with `params` appended to its query string.
    #[must_use]
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        url
    }
}

/// Opens persistent connections for stream sessions.
///
/// The returned future resolves once response headers have arrived. It must
/// not wait for body data.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<ByteFeed, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<ByteFeed, TransportError>> {
        (**self).connect(request)
    }
}

/// Signed HTTP GET over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    signer: Arc<OAuthSigner>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(http: reqwest::Client, signer: Arc<OAuthSigner>) -> Self {
        Self { http, signer }
    }
}

impl Transport for HttpTransport {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<ByteFeed, TransportError>> {
        let http = self.http.clone();
        let signer = Arc::clone(&self.signer);
        async move {
            let authorization = signer.authorization_header(&Method::GET, &request.url, &request.params);
            let url = request.full_url();
            debug!(%url, "opening stream connection");

            let response = http
                .get(url)
                .header(AUTHORIZATION, authorization)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_else(|err| {
                    warn!(%status, error = %err, "failed to read error body");
                    String::new()
                });
                warn!(%status, "stream connection refused");
                return Err(HttpStatusError::new(status, body).into());
            }

            debug!(%status, "stream headers received");
            Ok(response.bytes_stream().map_err(TransportError::from).boxed())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn full_url_appends_params() {
        let request = StreamRequest {
            url: Url::parse("http://stream.twitter.com/1/statuses/filter.json").unwrap(),
            params: params! { "track" => "rust lang", "count" => 10 },
        };
        assert_eq!(
            request.full_url().as_str(),
            "http://stream.twitter.com/1/statuses/filter.json?count=10&track=rust+lang"
        );
    }

    #[test]
    fn full_url_without_params_is_unchanged() {
        let url = Url::parse("https://userstream.twitter.com/2/user.json").unwrap();
        let request = StreamRequest {
            url: url.clone(),
            params: Params::new(),
        };
        assert_eq!(request.full_url(), url);
    }
}
