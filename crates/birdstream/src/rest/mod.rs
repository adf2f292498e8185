//! One-shot signed REST calls.
//!
//! Every call is a single request whose whole body is one JSON document.
//! Paths starting with `/` are relative to `rest_base`; anything else is
//! taken as an absolute URL.

pub mod catalog;

use std::{collections::BTreeMap, sync::Arc};

use reqwest::{Method, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{auth::OAuthSigner, config::ClientOptions, error::HttpStatusError};

/// Request parameters, kept sorted so URLs and signatures are stable.
pub type Params = BTreeMap<String, String>;

/// Builds a [`Params`] map from `key => value` pairs. Both sides go through
/// [`ToString`].
///
/// ```rust
/// let params = birdstream::params! { "track" => "rust", "count" => 10 };
/// assert_eq!(params["count"], "10");
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::rest::Params::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::rest::Params::new();
        $(
            params.insert(
                ::std::string::ToString::to_string(&$key),
                ::std::string::ToString::to_string(&$value),
            );
        )+
        params
    }};
}

/// Overlays `overrides` on `defaults`; keys present in both take the
/// override.
#[must_use]
pub fn merge(mut defaults: Params, overrides: Params) -> Params {
    defaults.extend(overrides);
    defaults
}

#[derive(Error, Debug)]
pub enum RestError {
    #[error(transparent)]
    Status(#[from] HttpStatusError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),
    #[error("endpoint `{endpoint}` needs argument `{name}`")]
    MissingArgument { endpoint: &'static str, name: String },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl RestError {
    /// The HTTP status, when the server answered with an error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Status(e) => Some(e.status),
            RestError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    signer: Arc<OAuthSigner>,
    rest_base: String,
    search_base: String,
}

impl RestClient {
    #[must_use]
    pub fn new(http: reqwest::Client, signer: Arc<OAuthSigner>, options: &ClientOptions) -> Self {
        Self {
            http,
            signer,
            rest_base: options.rest_base.trim_end_matches('/').to_owned(),
            search_base: options.search_base.trim_end_matches('/').to_owned(),
        }
    }

    /// Resolves `path` against `rest_base` when it starts with `/`.
    ///
    /// # Errors
    ///
    /// Fails if the result is not a valid URL.
    pub fn resolve(&self, path: &str) -> Result<Url, RestError> {
        let url = if path.starts_with('/') {
            Url::parse(&format!("{}{path}", self.rest_base))?
        } else {
            Url::parse(path)?
        };
        Ok(url)
    }

    /// Signed GET with `params` in the query string.
    ///
    /// # Errors
    ///
    /// [`RestError::Status`] for a non-success response, [`RestError::Decode`]
    /// if the body is not a `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<T, RestError> {
        let url = self.resolve(path)?;
        self.send(Method::GET, url, params).await
    }

    /// Signed POST with `params` as a form-encoded body.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn post<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<T, RestError> {
        let url = self.resolve(path)?;
        self.send(Method::POST, url, params).await
    }

    /// Search endpoint under `search_base`, with `q` merged over `params`.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn search<T: DeserializeOwned>(&self, query: &str, params: Params) -> Result<T, RestError> {
        let url = Url::parse(&format!("{}/search.json", self.search_base))?;
        let params = merge(params, crate::params! { "q" => query });
        self.send(Method::GET, url, &params).await
    }

    /// Invokes a catalog endpoint by name or alias.
    ///
    /// `args` fill the path placeholders and the endpoint's required fields;
    /// `params` are optional extras that override the endpoint defaults.
    ///
    /// # Errors
    ///
    /// [`RestError::UnknownEndpoint`] or [`RestError::MissingArgument`] before
    /// any request is made; otherwise as for [`get`](Self::get).
    pub async fn call(&self, endpoint: &str, mut args: Params, params: Params) -> Result<Value, RestError> {
        let entry = catalog::lookup(endpoint)
            .ok_or_else(|| RestError::UnknownEndpoint(endpoint.to_owned()))?;
        let path = entry.render_path(&mut args)?;
        let params = entry.request_params(args, params)?;
        debug!(endpoint = entry.name, %path, "calling catalog endpoint");

        let url = self.resolve(&path)?;
        self.send(entry.method.clone(), url, &params).await
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, url: Url, params: &Params) -> Result<T, RestError> {
        let authorization = self.signer.authorization_header(&method, &url, params);

        let request = if method == Method::GET {
            let mut url = url;
            if !params.is_empty() {
                url.query_pairs_mut().extend_pairs(params);
            }
            debug!(%method, %url, "rest request");
            self.http.get(url)
        } else {
            debug!(%method, %url, params = params.len(), "rest request");
            self.http.request(method, url).form(params)
        };

        let response = request.header(AUTHORIZATION, authorization).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = HttpStatusError::new(status, String::from_utf8_lossy(&body).into_owned());
            warn!(status = err.status, "rest request failed");
            return Err(err.into());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
