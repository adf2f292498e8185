//! Incremental extraction of concatenated top-level JSON values.
//!
//! Overview
//! - [`ValueExtractor`] accepts raw bytes in fragments of any size and returns
//!   each top-level value the moment its last byte arrives. Fragment
//!   boundaries carry no meaning: they may fall inside a string escape, a
//!   `\uXXXX` sequence, a multi-byte UTF-8 character, a number, a keyword or a
//!   whitespace run.
//! - All scanning state lives in the extractor (lex state, parse state, frame
//!   stack, escape and literal progress), never on the call stack, so a
//!   `feed` call can stop after any byte and the next one resumes exactly
//!   there.
//!
//! Spans
//! - The bytes of the current top-level value are copied into `span` as they
//!   are scanned. When the frame stack returns to empty (or a depth-zero
//!   scalar ends) the span is decoded with `serde_json` and cleared.
//! - Whitespace between top-level values is never part of a span, so
//!   keep-alive blank lines produce nothing.
//!
//! Numbers
//! - A number has no terminator of its own. At depth zero it completes only
//!   when the next non-number byte arrives or at [`ValueExtractor::finish`];
//!   that byte is then scanned again in the new state.
//!
//! Errors
//! - Every error is terminal. The first one is stored and returned again by
//!   every later call; nothing is emitted after it.

mod error;
mod escape_buffer;
mod literal_buffer;
mod options;
mod stack;

use core::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{ErrorSource, EscapedByte, ParserError, SyntaxError};
use escape_buffer::UnicodeEscapeBuffer;
use literal_buffer::{ExpectedLiteralBuffer, Step};
pub use options::{DECODE_DEPTH_LIMIT, DEFAULT_MAX_DEPTH, ExtractorOptions};
use stack::{FrameKind, FrameStack};

/// Where the scanner is in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Zero-based byte offset.
    pub offset: u64,
    /// One-based line.
    pub line: usize,
    /// One-based column, in bytes.
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Position {
    #[inline]
    fn advance(&mut self, b: u8) {
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Advance over a run that contains no line feeds.
    #[inline]
    fn advance_run(&mut self, len: usize) {
        self.offset += len as u64;
        self.column += len;
    }
}

/// What the grammar expects next, relative to the innermost open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Between top-level values.
    Start,
    BeforePropertyName,
    AfterPropertyName,
    BeforePropertyValue,
    AfterPropertyValue,
    BeforeArrayValue,
    AfterArrayValue,
}

/// Progress through the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    /// Between tokens.
    Default,
    String,
    StringEscape,
    StringEscapeUnicode,
    ValueLiteral,
    Sign,
    Zero,
    DecimalInteger,
    DecimalPoint,
    DecimalFraction,
    DecimalExponent,
    DecimalExponentSign,
    DecimalExponentInteger,
}

impl LexState {
    /// States in which the bytes seen so far already form a complete number.
    fn is_number_end(self) -> bool {
        matches!(
            self,
            LexState::Zero
                | LexState::DecimalInteger
                | LexState::DecimalFraction
                | LexState::DecimalExponentInteger
        )
    }
}

#[inline]
fn is_json_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Whether the current byte was consumed or must be scanned again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Consumed,
    Reprocess,
}

/// Reconstructs discrete top-level JSON values from an arbitrarily fragmented
/// byte stream.
///
/// Each value is decoded with `serde_json` once its last byte arrives.
/// Grammatical JSON that `serde_json` cannot represent in `T` is a
/// [`ErrorSource::Decode`] failure positioned at the value's first byte. For
/// the default [`Value`] target that includes numbers beyond the `f64` range
/// such as `1e400`, and lone surrogate escapes.
///
/// ```rust
/// use birdstream::ValueExtractor;
/// use serde_json::json;
///
/// let mut extractor: ValueExtractor = ValueExtractor::default();
/// assert_eq!(extractor.feed(br#"{"id":1}"#).unwrap(), vec![json!({"id": 1})]);
/// assert!(extractor.feed(br#"{"id""#).unwrap().is_empty());
/// assert_eq!(extractor.feed(b":2}").unwrap(), vec![json!({"id": 2})]);
/// assert!(extractor.feed(b"\r\n").unwrap().is_empty());
/// assert!(extractor.finish().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct ValueExtractor<T = Value> {
    options: ExtractorOptions,

    parse_state: ParseState,
    lex_state: LexState,
    stack: FrameStack,

    /// Whether the string being scanned is an object key.
    string_is_key: bool,
    unicode_escape: UnicodeEscapeBuffer,
    expected_literal: ExpectedLiteralBuffer,

    /// Raw bytes of the current top-level value.
    span: Vec<u8>,
    span_start: Position,
    position: Position,

    failure: Option<ParserError>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Default for ValueExtractor<T> {
    fn default() -> Self {
        Self::new(ExtractorOptions::default())
    }
}

impl<T: DeserializeOwned> ValueExtractor<T> {
    #[must_use]
    pub fn new(options: ExtractorOptions) -> Self {
        Self {
            options,
            parse_state: ParseState::Start,
            lex_state: LexState::Default,
            stack: FrameStack::new(options.max_depth),
            string_is_key: false,
            unicode_escape: UnicodeEscapeBuffer::new(),
            expected_literal: ExpectedLiteralBuffer::none(),
            span: Vec::new(),
            span_start: Position::default(),
            position: Position::default(),
            failure: None,
            _marker: PhantomData,
        }
    }

    /// Feeds the next fragment and returns the values it completed, in order.
    ///
    /// # Errors
    ///
    /// Returns the first malformed-input or decode error. Values completed
    /// earlier in the same fragment are dropped; use
    /// [`feed_into`](Self::feed_into) to keep them.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Vec<T>, ParserError> {
        let mut out = Vec::new();
        self.feed_into(fragment, &mut out)?;
        Ok(out)
    }

    /// Feeds the next fragment, pushing every completed value onto `out` as
    /// soon as it completes.
    ///
    /// # Errors
    ///
    /// On the first malformed-input or decode error the extractor is poisoned
    /// and the error is returned. Values completed before the error are
    /// already in `out`.
    pub fn feed_into(&mut self, fragment: &[u8], out: &mut Vec<T>) -> Result<(), ParserError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut i = 0;
        while i < fragment.len() {
            if self.lex_state == LexState::String {
                let rest = &fragment[i..];
                let run = rest
                    .iter()
                    .position(|&b| b == b'"' || b == b'\\' || b < 0x20)
                    .unwrap_or(rest.len());
                if run > 0 {
                    if let Err(err) = self.extend_span(&rest[..run]) {
                        return Err(self.poison(err));
                    }
                    self.position.advance_run(run);
                    i += run;
                    continue;
                }
            }

            let b = fragment[i];
            match self.step(b, out) {
                Ok(Advance::Consumed) => {
                    self.position.advance(b);
                    i += 1;
                }
                Ok(Advance::Reprocess) => {}
                Err(err) => return Err(self.poison(err)),
            }
        }
        Ok(())
    }

    /// Signals that no more bytes will arrive.
    ///
    /// A number still waiting for its delimiter at depth zero is completed
    /// and returned. Called between values, returns an empty list.
    ///
    /// # Errors
    ///
    /// Fails with [`SyntaxError::UnexpectedEndOfInput`] if a value is still
    /// incomplete; the partial value is discarded.
    pub fn finish(mut self) -> Result<Vec<T>, ParserError> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }

        let mut out = Vec::new();
        if self.stack.is_empty() && self.lex_state.is_number_end() {
            self.lex_state = LexState::Default;
            self.value_completed(&mut out)?;
        }

        if self.is_between_values() {
            Ok(out)
        } else {
            Err(self.syntax_error(SyntaxError::UnexpectedEndOfInput))
        }
    }

    /// `true` when no value is in progress.
    #[must_use]
    pub fn is_between_values(&self) -> bool {
        self.failure.is_none()
            && self.parse_state == ParseState::Start
            && self.lex_state == LexState::Default
    }

    /// Number of currently open objects and arrays.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Position of the next byte to be scanned.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// The error that poisoned this extractor, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ParserError> {
        self.failure.as_ref()
    }

    // ------------------------------------------------------------------------------------------------
    // Lexer
    // ------------------------------------------------------------------------------------------------

    #[expect(clippy::too_many_lines)]
    fn step(&mut self, b: u8, out: &mut Vec<T>) -> Result<Advance, ParserError> {
        use LexState::*;

        match self.lex_state {
            Default => {
                if is_json_whitespace(b) {
                    if !self.stack.is_empty() {
                        self.push_span(b)?;
                    }
                    return Ok(Advance::Consumed);
                }
                self.dispatch_parse_state(b, out)?;
                Ok(Advance::Consumed)
            }

            // -------------------------- STRINGS -----------------------------
            String => match b {
                b'"' => {
                    self.push_span(b)?;
                    self.lex_state = Default;
                    if self.string_is_key {
                        self.string_is_key = false;
                        self.parse_state = ParseState::AfterPropertyName;
                    } else {
                        self.value_completed(out)?;
                    }
                    Ok(Advance::Consumed)
                }
                b'\\' => {
                    self.push_span(b)?;
                    self.lex_state = StringEscape;
                    Ok(Advance::Consumed)
                }
                c if c < 0x20 => Err(self.syntax_error(SyntaxError::ControlCharacterInString(
                    EscapedByte(c),
                ))),
                _ => {
                    self.push_span(b)?;
                    Ok(Advance::Consumed)
                }
            },

            StringEscape => match b {
                b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => {
                    self.push_span(b)?;
                    self.lex_state = String;
                    Ok(Advance::Consumed)
                }
                b'u' => {
                    self.push_span(b)?;
                    self.unicode_escape.reset();
                    self.lex_state = StringEscapeUnicode;
                    Ok(Advance::Consumed)
                }
                c => Err(self.invalid_char(c)),
            },

            StringEscapeUnicode => {
                let done = self
                    .unicode_escape
                    .feed(b)
                    .map_err(|e| self.syntax_error(e))?;
                self.push_span(b)?;
                if done.is_some() {
                    self.lex_state = String;
                }
                Ok(Advance::Consumed)
            }

            // -------------------------- LITERALS -----------------------------
            ValueLiteral => match self.expected_literal.step(b) {
                Step::NeedMore => {
                    self.push_span(b)?;
                    Ok(Advance::Consumed)
                }
                Step::Done(_) => {
                    self.push_span(b)?;
                    self.expected_literal = ExpectedLiteralBuffer::none();
                    self.lex_state = Default;
                    self.value_completed(out)?;
                    Ok(Advance::Consumed)
                }
                Step::Reject => Err(self.invalid_char(b)),
            },

            // -------------------------- NUMBERS -----------------------------
            Sign => match b {
                b'0' => self.number_byte(b, Zero),
                b'1'..=b'9' => self.number_byte(b, DecimalInteger),
                c => Err(self.invalid_char(c)),
            },

            Zero => match b {
                b'.' => self.number_byte(b, DecimalPoint),
                b'e' | b'E' => self.number_byte(b, DecimalExponent),
                c if c.is_ascii_digit() => Err(self.invalid_char(c)),
                _ => self.end_number(out),
            },

            DecimalInteger => match b {
                b'0'..=b'9' => self.number_byte(b, DecimalInteger),
                b'.' => self.number_byte(b, DecimalPoint),
                b'e' | b'E' => self.number_byte(b, DecimalExponent),
                _ => self.end_number(out),
            },

            DecimalPoint => match b {
                b'0'..=b'9' => self.number_byte(b, DecimalFraction),
                c => Err(self.invalid_char(c)),
            },

            DecimalFraction => match b {
                b'0'..=b'9' => self.number_byte(b, DecimalFraction),
                b'e' | b'E' => self.number_byte(b, DecimalExponent),
                _ => self.end_number(out),
            },

            DecimalExponent => match b {
                b'+' | b'-' => self.number_byte(b, DecimalExponentSign),
                b'0'..=b'9' => self.number_byte(b, DecimalExponentInteger),
                c => Err(self.invalid_char(c)),
            },

            DecimalExponentSign => match b {
                b'0'..=b'9' => self.number_byte(b, DecimalExponentInteger),
                c => Err(self.invalid_char(c)),
            },

            DecimalExponentInteger => match b {
                b'0'..=b'9' => self.number_byte(b, DecimalExponentInteger),
                _ => self.end_number(out),
            },
        }
    }

    #[inline]
    fn number_byte(&mut self, b: u8, next: LexState) -> Result<Advance, ParserError> {
        self.push_span(b)?;
        self.lex_state = next;
        Ok(Advance::Consumed)
    }

    /// The current byte is not part of the number; finish the number and
    /// scan the byte again.
    fn end_number(&mut self, out: &mut Vec<T>) -> Result<Advance, ParserError> {
        self.lex_state = LexState::Default;
        self.value_completed(out)?;
        Ok(Advance::Reprocess)
    }

    // ------------------------------------------------------------------------------------------------
    // Parse state dispatcher
    // ------------------------------------------------------------------------------------------------

    fn dispatch_parse_state(&mut self, b: u8, out: &mut Vec<T>) -> Result<(), ParserError> {
        use ParseState::*;

        match self.parse_state {
            Start => match b {
                b'}' | b']' => Err(self.syntax_error(SyntaxError::UnmatchedClose(EscapedByte(b)))),
                _ => self.begin_value(b),
            },

            BeforePropertyName => match b {
                b'"' => {
                    self.push_span(b)?;
                    self.string_is_key = true;
                    self.lex_state = LexState::String;
                    Ok(())
                }
                b'}' if self.top_members() == 0 => self.close_container(b, out),
                c => Err(self.invalid_char(c)),
            },

            AfterPropertyName => match b {
                b':' => {
                    self.push_span(b)?;
                    self.parse_state = BeforePropertyValue;
                    Ok(())
                }
                c => Err(self.invalid_char(c)),
            },

            BeforePropertyValue => self.begin_value(b),

            AfterPropertyValue => match b {
                b',' => {
                    self.push_span(b)?;
                    self.parse_state = BeforePropertyName;
                    Ok(())
                }
                b'}' => self.close_container(b, out),
                c => Err(self.invalid_char(c)),
            },

            BeforeArrayValue => match b {
                b']' if self.top_members() == 0 => self.close_container(b, out),
                _ => self.begin_value(b),
            },

            AfterArrayValue => match b {
                b',' => {
                    self.push_span(b)?;
                    self.parse_state = BeforeArrayValue;
                    Ok(())
                }
                b']' => self.close_container(b, out),
                c => Err(self.invalid_char(c)),
            },
        }
    }

    fn begin_value(&mut self, b: u8) -> Result<(), ParserError> {
        if self.stack.is_empty() {
            self.span.clear();
            self.span_start = self.position;
        }

        let next_lex = match b {
            b'{' | b'[' => {
                let kind = if b == b'{' {
                    FrameKind::Object
                } else {
                    FrameKind::Array
                };
                self.stack.push(kind).map_err(|e| self.syntax_error(e))?;
                self.push_span(b)?;
                self.parse_state = match kind {
                    FrameKind::Object => ParseState::BeforePropertyName,
                    FrameKind::Array => ParseState::BeforeArrayValue,
                };
                return Ok(());
            }
            b'"' => LexState::String,
            b'n' | b't' | b'f' => {
                self.expected_literal = ExpectedLiteralBuffer::new(b);
                LexState::ValueLiteral
            }
            b'-' => LexState::Sign,
            b'0' => LexState::Zero,
            b'1'..=b'9' => LexState::DecimalInteger,
            c => return Err(self.invalid_char(c)),
        };

        self.push_span(b)?;
        self.lex_state = next_lex;
        Ok(())
    }

    fn close_container(&mut self, b: u8, out: &mut Vec<T>) -> Result<(), ParserError> {
        self.push_span(b)?;
        if self.stack.pop().is_none() {
            return Err(self.syntax_error(SyntaxError::UnmatchedClose(EscapedByte(b))));
        }
        self.value_completed(out)
    }

    /// A scalar token ended or a container closed. At depth zero that means a
    /// whole top-level value is available.
    fn value_completed(&mut self, out: &mut Vec<T>) -> Result<(), ParserError> {
        match self.stack.top_mut() {
            None => {
                self.parse_state = ParseState::Start;
                let decoded = serde_json::from_slice::<T>(&self.span)
                    .map_err(|e| self.decode_error(&e))?;
                self.span.clear();
                out.push(decoded);
            }
            Some(frame) => {
                frame.members += 1;
                self.parse_state = match frame.kind {
                    FrameKind::Object => ParseState::AfterPropertyValue,
                    FrameKind::Array => ParseState::AfterArrayValue,
                };
            }
        }
        Ok(())
    }

    fn top_members(&self) -> usize {
        self.stack.top().map_or(0, |frame| frame.members)
    }

    #[inline]
    fn push_span(&mut self, b: u8) -> Result<(), ParserError> {
        self.check_span_len(1)?;
        self.span.push(b);
        Ok(())
    }

    fn extend_span(&mut self, bytes: &[u8]) -> Result<(), ParserError> {
        self.check_span_len(bytes.len())?;
        self.span.extend_from_slice(bytes);
        Ok(())
    }

    #[inline]
    fn check_span_len(&self, additional: usize) -> Result<(), ParserError> {
        match self.options.max_value_bytes {
            Some(max) if self.span.len() + additional > max => {
                Err(self.syntax_error(SyntaxError::ValueTooLarge(max)))
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------------------------------

    fn poison(&mut self, err: ParserError) -> ParserError {
        self.span.clear();
        self.failure = Some(err.clone());
        err
    }

    fn invalid_char(&self, b: u8) -> ParserError {
        self.syntax_error(SyntaxError::InvalidCharacter(EscapedByte(b)))
    }

    fn syntax_error(&self, err: SyntaxError) -> ParserError {
        ParserError {
            source: ErrorSource::Syntax(err),
            offset: self.position.offset,
            line: self.position.line,
            column: self.position.column,
        }
    }

    /// Decode failures are reported at the first byte of the failing value.
    fn decode_error(&self, err: &serde_json::Error) -> ParserError {
        ParserError {
            source: ErrorSource::Decode(err.to_string()),
            offset: self.span_start.offset,
            line: self.span_start.line,
            column: self.span_start.column,
        }
    }
}
