/// Which keyword a literal token spells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpectedLiteralValue {
    Null,
    True,
    False,
}

/// What happened after feeding one more byte into the literal matcher?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Byte matched, but the literal is not finished yet.
    NeedMore,
    /// Byte matched *and* it was the last byte of the literal.
    Done(ExpectedLiteralValue),
    /// Byte did **not** match the expected byte.
    Reject,
}

/// `None`  ➜  we are **not** in the middle of a literal
/// `Some`  ➜  `(remaining_bytes, literal_kind)` while matching
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ExpectedLiteralBuffer(Option<(&'static [u8], ExpectedLiteralValue)>);

impl ExpectedLiteralBuffer {
    pub fn none() -> Self {
        ExpectedLiteralBuffer(None)
    }

    /// Start matching after the *first* byte (`n`, `t`, or `f`).
    pub fn new(first: u8) -> Self {
        match first {
            b'n' => ExpectedLiteralBuffer(Some((b"ull", ExpectedLiteralValue::Null))),
            b't' => ExpectedLiteralBuffer(Some((b"rue", ExpectedLiteralValue::True))),
            b'f' => ExpectedLiteralBuffer(Some((b"alse", ExpectedLiteralValue::False))),
            _ => ExpectedLiteralBuffer::none(),
        }
    }

    pub fn step(&mut self, b: u8) -> Step {
        let Some((bytes, kind)) = self.0.take() else {
            return Step::Reject;
        };

        match bytes.split_first() {
            Some((expected, rest)) if *expected == b => {
                if rest.is_empty() {
                    Step::Done(kind)
                } else {
                    self.0 = Some((rest, kind));
                    Step::NeedMore
                }
            }
            _ => {
                // Mismatch: restore the state taken above.
                self.0 = Some((bytes, kind));
                Step::Reject
            }
        }
    }
}
