//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Every REST call and every stream connection carries an `Authorization:
//! OAuth ...` header computed over the method, the base URL and all request
//! parameters, as described in RFC 5849 §3.4.

use std::{
    borrow::Cow,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Method;
use ring::hmac;
use serde::Deserialize;
use url::Url;

const NONCE_LEN: usize = 32;

/// Consumer and access-token pairs issued by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token_key: String,
    pub access_token_secret: String,
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
fn encode(s: &str) -> Cow<'_, str> {
    urlencoding::encode(s)
}

#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: Credentials,
}

impl OAuthSigner {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Builds the `Authorization` header for one request with a fresh nonce
    /// and the current time.
    #[must_use]
    pub fn authorization_header<'a, I>(&self, method: &Method, url: &Url, params: I) -> String
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let nonce: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(NONCE_LEN)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.sign_with(method.as_str(), url, params, &nonce, timestamp)
    }

    /// Deterministic variant of [`authorization_header`](Self::authorization_header).
    #[must_use]
    pub fn sign_with<'a, I>(
        &self,
        method: &str,
        url: &Url,
        params: I,
        nonce: &str,
        timestamp: u64,
    ) -> String
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let timestamp = timestamp.to_string();
        let oauth_params = [
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.credentials.access_token_key.as_str()),
            ("oauth_version", "1.0"),
        ];

        let base = signature_base_string(method, url, params, &oauth_params);
        let signature = self.signature(&base);

        let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
        header_params.push(("oauth_signature", signature.as_str()));
        header_params.sort_unstable();

        let fields: Vec<String> = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    fn signature(&self, base: &str) -> String {
        let signing_key = format!(
            "{}&{}",
            encode(&self.credentials.consumer_secret),
            encode(&self.credentials.access_token_secret)
        );
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
        STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref())
    }
}

/// `METHOD&base-url&sorted-params`, each part percent-encoded.
///
/// Query parameters already present on `url` are signed along with the
/// explicit request parameters.
pub(crate) fn signature_base_string<'a, I>(
    method: &str,
    url: &Url,
    params: I,
    oauth_params: &[(&str, &str)],
) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k).into_owned(), encode(&v).into_owned()))
        .collect();
    pairs.extend(
        params
            .into_iter()
            .map(|(k, v)| (encode(k).into_owned(), encode(v).into_owned())),
    );
    pairs.extend(
        oauth_params
            .iter()
            .map(|(k, v)| (encode(k).into_owned(), encode(v).into_owned())),
    );
    pairs.sort_unstable();

    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url.as_str()),
        encode(&param_string)
    )
}
