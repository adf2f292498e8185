use thiserror::Error;

/// A failure raised by [`ValueExtractor`](crate::ValueExtractor).
///
/// Every error is terminal: once returned, the extractor keeps returning a
/// copy of it and never emits another value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} at {line}:{column} (byte {offset})")]
pub struct ParserError {
    pub(crate) source: ErrorSource,
    /// Zero-based byte offset into the whole stream.
    pub offset: u64,
    /// One-based line number.
    pub line: usize,
    /// One-based column, counted in bytes.
    pub column: usize,
}

impl ParserError {
    #[must_use]
    pub fn source_kind(&self) -> &ErrorSource {
        &self.source
    }

    /// `true` when the byte stream itself is not valid JSON.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self.source, ErrorSource::Syntax(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorSource {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    /// The span was structurally complete, but `serde_json` refused it.
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("invalid character {0}")]
    InvalidCharacter(EscapedByte),
    #[error("unmatched closing {0}")]
    UnmatchedClose(EscapedByte),
    #[error("invalid unicode escape character {0}")]
    InvalidUnicodeEscapeChar(EscapedByte),
    #[error("control character {0} in string")]
    ControlCharacterInString(EscapedByte),
    #[error("nesting deeper than {0} levels")]
    DepthLimitExceeded(usize),
    #[error("value larger than {0} bytes")]
    ValueTooLarge(usize),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
}

/// A raw input byte, rendered quoted and escaped in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapedByte(pub u8);

impl core::fmt::Display for EscapedByte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "'{}'", self.0.escape_ascii())
    }
}
