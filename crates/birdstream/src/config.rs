use std::{collections::BTreeMap, env};

use serde::Deserialize;

use crate::{auth::Credentials, parser::ExtractorOptions};

/// Client configuration.
///
/// Every field has a default, so a partial document (or
/// [`ClientOptions::default`] with a few fields set) is enough:
///
/// ```rust
/// use birdstream::ClientOptions;
///
/// let options: ClientOptions = serde_json::from_str(
///     r#"{ "stream_base": "http://localhost:8080/1" }"#,
/// ).unwrap();
/// assert_eq!(options.stream_base, "http://localhost:8080/1");
/// assert_eq!(options.rest_base, "https://api.twitter.com/1");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    #[serde(flatten)]
    pub credentials: Credentials,

    /// Sent with every request.
    pub headers: BTreeMap<String, String>,

    pub request_token_url: String,
    pub access_token_url: String,
    pub authenticate_url: String,
    pub authorize_url: String,

    pub rest_base: String,
    pub search_base: String,
    pub stream_base: String,
    pub user_stream_base: String,
    pub site_stream_base: String,

    /// Limits applied to every stream session.
    pub extractor: ExtractorOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let headers = [
            ("Accept", "*/*".to_owned()),
            ("Connection", "close".to_owned()),
            ("User-Agent", format!("birdstream/{}", env!("CARGO_PKG_VERSION"))),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        Self {
            credentials: Credentials::default(),
            headers,
            request_token_url: "https://api.twitter.com/oauth/request_token".into(),
            access_token_url: "https://api.twitter.com/oauth/access_token".into(),
            authenticate_url: "https://api.twitter.com/oauth/authenticate".into(),
            authorize_url: "https://api.twitter.com/oauth/authorize".into(),
            rest_base: "https://api.twitter.com/1".into(),
            search_base: "http://search.twitter.com".into(),
            stream_base: "http://stream.twitter.com/1".into(),
            user_stream_base: "https://userstream.twitter.com/2".into(),
            site_stream_base: "https://betastream.twitter.com/2b".into(),
            extractor: ExtractorOptions::default(),
        }
    }
}

impl ClientOptions {
    /// Defaults, with credentials taken from `TWITTER_CONSUMER_KEY`,
    /// `TWITTER_CONSUMER_SECRET`, `TWITTER_ACCESS_TOKEN_KEY` and
    /// `TWITTER_ACCESS_TOKEN_SECRET`. Unset variables stay empty.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_credentials(|name| env::var(name).ok())
    }

    fn with_env_credentials(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let slots = [
            ("TWITTER_CONSUMER_KEY", &mut self.credentials.consumer_key),
            ("TWITTER_CONSUMER_SECRET", &mut self.credentials.consumer_secret),
            ("TWITTER_ACCESS_TOKEN_KEY", &mut self.credentials.access_token_key),
            ("TWITTER_ACCESS_TOKEN_SECRET", &mut self.credentials.access_token_secret),
        ];
        for (name, slot) in slots {
            if let Some(value) = lookup(name) {
                *slot = value;
            }
        }
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Adds or replaces a default header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.stream_base, "http://stream.twitter.com/1");
        assert_eq!(options.user_stream_base, "https://userstream.twitter.com/2");
        assert_eq!(options.site_stream_base, "https://betastream.twitter.com/2b");
        assert_eq!(options.search_base, "http://search.twitter.com");
        assert_eq!(options.headers["Accept"], "*/*");
        assert!(options.headers["User-Agent"].starts_with("birdstream/"));
        assert_eq!(options.extractor.max_depth, crate::parser::DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn credentials_deserialize_flat() {
        let options: ClientOptions = serde_json::from_str(
            r#"{
                "consumer_key": "ck",
                "access_token_secret": "ats",
                "extractor": { "max_value_bytes": 1024 }
            }"#,
        )
        .unwrap();
        assert_eq!(options.credentials.consumer_key, "ck");
        assert_eq!(options.credentials.access_token_secret, "ats");
        assert!(options.credentials.consumer_secret.is_empty());
        assert_eq!(options.extractor.max_value_bytes, Some(1024));
        assert_eq!(options.headers, ClientOptions::default().headers);
    }

    #[test]
    fn env_credentials() {
        let options = ClientOptions::default().with_env_credentials(|name| match name {
            "TWITTER_CONSUMER_KEY" => Some("key".into()),
            "TWITTER_ACCESS_TOKEN_SECRET" => Some("secret".into()),
            _ => None,
        });
        assert_eq!(options.credentials.consumer_key, "key");
        assert_eq!(options.credentials.access_token_secret, "secret");
        assert!(options.credentials.access_token_key.is_empty());
    }
}
