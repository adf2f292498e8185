//! Signed client for the Twitter REST and Streaming APIs.
//!
//! The streaming endpoints answer with one long-lived response whose body is
//! an unbounded run of JSON values written back to back. [`ValueExtractor`]
//! rebuilds those values from fragments cut at arbitrary byte positions, and
//! [`StreamSession`] drives it over a persistent connection, yielding each
//! value as soon as its last byte has arrived.

#![allow(missing_docs)]

mod auth;
mod client;
mod config;
mod error;
pub mod parser;
pub mod rest;
mod session;
pub mod transport;


pub use auth::{Credentials, OAuthSigner};
pub use client::Twitter;
pub use config::ClientOptions;
pub use error::{Error, HttpStatusError};
pub use parser::{ErrorSource, ExtractorOptions, ParserError, Position, SyntaxError, ValueExtractor};
pub use rest::{Params, RestClient, RestError};
pub use session::{SessionHandle, SessionState, StreamCategory, StreamError, StreamSession};
pub use transport::{ByteFeed, HttpTransport, StreamRequest, Transport, TransportError};
