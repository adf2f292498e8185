//! Incremental validation of four-digit `\uXXXX` escapes.
//!
//! The [`UnicodeEscapeBuffer`] accumulates exactly four ASCII hexadecimal
//! digits (`0-9`, `A-F`, `a-f`) into a UTF-16 code unit as they arrive, one
//! byte per call, so an escape may be split across any number of fragments.
//! Pairing surrogate halves is left to the final decode of the span.

use crate::parser::error::{EscapedByte, SyntaxError};

#[derive(Debug, Default)]
pub(crate) struct UnicodeEscapeBuffer {
    acc: u16,
    len: u8,
}

impl UnicodeEscapeBuffer {
    pub fn new() -> Self {
        Self { acc: 0, len: 0 }
    }

    pub fn reset(&mut self) {
        self.acc = 0;
        self.len = 0;
    }

    #[inline]
    fn hex_val(b: u8) -> Option<u16> {
        match b {
            b'0'..=b'9' => Some(u16::from(b - b'0')),
            b'a'..=b'f' => Some(u16::from(b - b'a') + 10),
            b'A'..=b'F' => Some(u16::from(b - b'A') + 10),
            _ => None,
        }
    }

    /// Feeds one byte of the escape.
    ///
    /// - `Ok(None)` while fewer than four digits have been seen.
    /// - `Ok(Some(unit))` on the fourth digit; the buffer resets itself.
    /// - `Err` if `b` is not an ASCII hex digit.
    pub fn feed(&mut self, b: u8) -> Result<Option<u16>, SyntaxError> {
        let d = Self::hex_val(b).ok_or(SyntaxError::InvalidUnicodeEscapeChar(EscapedByte(b)))?;

        self.acc = (self.acc << 4) | d;
        self.len += 1;

        if self.len < 4 {
            return Ok(None);
        }

        let unit = self.acc;
        self.reset();
        Ok(Some(unit))
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::UnicodeEscapeBuffer;
    use crate::parser::error::{EscapedByte, SyntaxError};

    #[test]
    fn basic_decoding() {
        let mut buf = UnicodeEscapeBuffer::new();
        assert_eq!(buf.feed(b'0').unwrap(), None);
        assert_eq!(buf.feed(b'0').unwrap(), None);
        assert_eq!(buf.feed(b'4').unwrap(), None);
        assert_eq!(buf.feed(b'1').unwrap(), Some(0x41));
        assert!(buf.is_empty());
    }

    #[test]
    fn mixed_case_hex() {
        let mut buf = UnicodeEscapeBuffer::new();
        let mut last = None;
        for b in *b"AbCd" {
            last = buf.feed(b).unwrap();
        }
        assert_eq!(last, Some(0xABCD));
    }

    #[test]
    fn surrogate_halves_are_passed_through() {
        let mut buf = UnicodeEscapeBuffer::new();
        let mut last = None;
        for b in *b"D83D" {
            last = buf.feed(b).unwrap();
        }
        assert_eq!(last, Some(0xD83D));
    }

    #[test]
    fn reset_clears_buffer() {
        let mut buf = UnicodeEscapeBuffer::new();
        assert!(buf.feed(b'F').unwrap().is_none());
        buf.reset();
        assert!(buf.is_empty());
        for b in *b"002" {
            assert_eq!(buf.feed(b).unwrap(), None);
        }
        assert_eq!(buf.feed(b'2').unwrap(), Some(0x22));
    }

    #[test]
    fn invalid_hex_error() {
        let mut buf = UnicodeEscapeBuffer::new();
        let err = buf.feed(b'G').unwrap_err();
        assert_eq!(err, SyntaxError::InvalidUnicodeEscapeChar(EscapedByte(b'G')));
    }
}
