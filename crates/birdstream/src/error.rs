use reqwest::StatusCode;
use thiserror::Error;

use crate::{rest::RestError, session::StreamError, transport::TransportError};

/// A non-success HTTP response, carrying the raw error body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("HTTP Error {status}: {reason}")]
pub struct HttpStatusError {
    pub status: u16,
    pub reason: &'static str,
    pub body: String,
}

impl HttpStatusError {
    #[must_use]
    pub fn new(status: StatusCode, body: String) -> Self {
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown"),
            body,
        }
    }
}

/// Errors raised by the [`Twitter`](crate::Twitter) facade.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid default header `{0}`")]
    InvalidHeader(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
