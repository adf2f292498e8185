use crate::parser::{error::SyntaxError, options::DECODE_DEPTH_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Object,
    Array,
}

/// One open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    /// Completed members so far. Zero means a closing token may follow the
    /// opening one directly; anything else means a `,` was the last separator
    /// or a value is pending.
    pub members: usize,
}

/// Explicit stack of open containers. Depth changes by exactly one per
/// structural token.
#[derive(Debug)]
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl FrameStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth: max_depth.min(DECODE_DEPTH_LIMIT),
        }
    }

    pub fn push(&mut self, kind: FrameKind) -> Result<(), SyntaxError> {
        if self.frames.len() >= self.max_depth {
            return Err(SyntaxError::DepthLimitExceeded(self.max_depth));
        }
        self.frames.push(Frame { kind, members: 0 });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, FrameKind, FrameStack};
    use crate::parser::{error::SyntaxError, options::DECODE_DEPTH_LIMIT};

    #[test]
    fn push_pop_tracks_depth() {
        let mut stack = FrameStack::new(4);
        stack.push(FrameKind::Object).unwrap();
        stack.push(FrameKind::Array).unwrap();
        assert_eq!(stack.depth(), 2);
        stack.top_mut().unwrap().members += 1;
        assert_eq!(
            stack.pop(),
            Some(Frame {
                kind: FrameKind::Array,
                members: 1
            })
        );
        assert_eq!(stack.top().unwrap().kind, FrameKind::Object);
        stack.pop();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn depth_limit() {
        let mut stack = FrameStack::new(1);
        stack.push(FrameKind::Array).unwrap();
        assert_eq!(
            stack.push(FrameKind::Array),
            Err(SyntaxError::DepthLimitExceeded(1))
        );
    }

    #[test]
    fn limit_is_clamped_to_decodable_depth() {
        let mut stack = FrameStack::new(usize::MAX);
        for _ in 0..DECODE_DEPTH_LIMIT {
            stack.push(FrameKind::Object).unwrap();
        }
        assert_eq!(
            stack.push(FrameKind::Object),
            Err(SyntaxError::DepthLimitExceeded(DECODE_DEPTH_LIMIT))
        );
    }
}
