use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    auth::OAuthSigner,
    config::ClientOptions,
    error::Error,
    rest::{Params, RestClient},
    session::{StreamCategory, StreamSession},
    transport::{HttpTransport, StreamRequest, Transport},
};

/// Signed access to the REST and streaming APIs.
///
/// ```rust,no_run
/// use birdstream::{ClientOptions, StreamCategory, Twitter, params};
/// use futures::StreamExt;
///
/// # async fn run() -> Result<(), birdstream::Error> {
/// let twitter = Twitter::new(ClientOptions::from_env())?;
/// let mut tweets = twitter.stream(
///     StreamCategory::from_method("statuses/filter"),
///     params! { "track" => "rust" },
/// )?;
/// while let Some(tweet) = tweets.next().await {
///     println!("{}", tweet?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Twitter {
    options: Arc<ClientOptions>,
    rest: RestClient,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Twitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Twitter")
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

impl Twitter {
    /// Builds the HTTP client, the signer and the streaming transport from
    /// `options`.
    ///
    /// # Errors
    ///
    /// Fails if a default header is not a valid HTTP header or the HTTP client
    /// cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        let http = http_client(&options)?;
        let signer = Arc::new(OAuthSigner::new(options.credentials.clone()));
        let transport = HttpTransport::new(http.clone(), Arc::clone(&signer));
        Ok(Self::assemble(options, http, signer, Arc::new(transport)))
    }

    /// Like [`new`](Self::new), but streams through `transport` instead of
    /// HTTP.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub fn with_transport<Tr: Transport>(options: ClientOptions, transport: Tr) -> Result<Self, Error> {
        let http = http_client(&options)?;
        let signer = Arc::new(OAuthSigner::new(options.credentials.clone()));
        Ok(Self::assemble(options, http, signer, Arc::new(transport)))
    }

    fn assemble(
        options: ClientOptions,
        http: reqwest::Client,
        signer: Arc<OAuthSigner>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let rest = RestClient::new(http, signer, &options);
        Self {
            options: Arc::new(options),
            rest,
            transport,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// See [`RestClient::get`].
    ///
    /// # Errors
    ///
    /// Any [`RestError`](crate::RestError), wrapped.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<T, Error> {
        Ok(self.rest.get(path, params).await?)
    }

    /// See [`RestClient::post`].
    ///
    /// # Errors
    ///
    /// Any [`RestError`](crate::RestError), wrapped.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<T, Error> {
        Ok(self.rest.post(path, params).await?)
    }

    /// See [`RestClient::search`].
    ///
    /// # Errors
    ///
    /// Any [`RestError`](crate::RestError), wrapped.
    pub async fn search<T: DeserializeOwned>(&self, query: &str, params: Params) -> Result<T, Error> {
        Ok(self.rest.search(query, params).await?)
    }

    /// See [`RestClient::call`].
    ///
    /// # Errors
    ///
    /// Any [`RestError`](crate::RestError), wrapped.
    pub async fn call(&self, endpoint: &str, args: Params, params: Params) -> Result<Value, Error> {
        Ok(self.rest.call(endpoint, args, params).await?)
    }

    /// Opens a stream session yielding untyped values.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint URL for `category` is invalid.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, category: StreamCategory, params: Params) -> Result<StreamSession, Error> {
        self.stream_as(category, params)
    }

    /// Opens a stream session decoding each value as `T`.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint URL for `category` is invalid.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream_as<T>(&self, category: StreamCategory, params: Params) -> Result<StreamSession<T>, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = category.endpoint(&self.options)?;
        debug!(?category, %url, "opening stream");
        let request = StreamRequest { url, params };
        Ok(StreamSession::open(
            &self.transport,
            request,
            self.options.extractor,
        ))
    }
}

fn http_client(options: &ClientOptions) -> Result<reqwest::Client, Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_default_header() {
        let options = ClientOptions::default().with_header("Bad Header", "x");
        let err = Twitter::new(options).unwrap_err();
        assert_eq!(err.to_string(), "invalid default header `Bad Header`");
    }

    #[test]
    fn builds_with_defaults() {
        let twitter = Twitter::new(ClientOptions::default()).unwrap();
        assert_eq!(twitter.options().rest_base, "https://api.twitter.com/1");
    }
}
