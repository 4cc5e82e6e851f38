use crate::{ReturnFrame, Value};

/// The interpreter's value stack.
///
/// Grows downwards: `sp` indexes the top word, `sp == words.len()` means
/// empty. `peek(0)` is the top, `peek(1)` the word below it.
#[derive(Debug, Clone)]
pub struct InterpreterStack {
    words: Vec<Value>,
    sp: usize,
}

impl InterpreterStack {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![Value::UNBOUND; size],
            sp: size,
        }
    }

    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of live words.
    #[inline]
    pub fn depth(&self) -> usize {
        self.words.len() - self.sp
    }

    /// Number of words that can still be pushed.
    #[inline]
    pub fn free(&self) -> usize {
        self.sp
    }

    /// The live words, top first.
    #[must_use]
    pub fn live(&self) -> &[Value] {
        &self.words[self.sp..]
    }

    /// Pushes a value onto the stack
    pub fn push(&mut self, value: Value) {
        assert!(self.sp > 0, "interpreter stack overflow");
        self.sp -= 1;
        self.words[self.sp] = value;
    }

    /// Pops a value from the stack
    pub fn pop(&mut self) -> Option<Value> {
        if self.depth() == 0 {
            return None;
        }
        let value = self.words[self.sp];
        self.sp += 1;
        Some(value)
    }

    /// Gets the nth value from the top of the stack (0-indexed)
    #[must_use]
    pub fn peek(&self, n: usize) -> Option<Value> {
        self.live().get(n).copied()
    }

    /// Sets the value at n from the top of the stack
    pub fn set(&mut self, n: usize, value: Value) {
        if n < self.depth() {
            self.words[self.sp + n] = value;
        }
    }

    /// Pushes `frame` so that `frame.pc` ends up on top.
    pub fn push_frame(&mut self, frame: ReturnFrame) {
        for word in frame.to_words().into_iter().rev() {
            self.push(word);
        }
    }

    /// Pops the return frame on top of the stack.
    pub fn pop_frame(&mut self) -> Option<ReturnFrame> {
        let words: &[Value; ReturnFrame::WORDS] =
            self.live().get(..ReturnFrame::WORDS)?.try_into().ok()?;
        let frame = ReturnFrame::from_words(words);
        self.sp += ReturnFrame::WORDS;
        Some(frame)
    }

    /// Moves the top `keep` words `by` words further up and returns the
    /// index (from the new top) of the first word freed below them.
    ///
    /// Panics unless `free() >= by` and `depth() >= keep`.
    pub(crate) fn open_gap(&mut self, by: usize, keep: usize) -> usize {
        let osp = self.sp;
        let nsp = osp - by;
        self.words.copy_within(osp..osp + keep, nsp);
        self.sp = nsp;
        keep
    }

    pub(crate) fn write(&mut self, n: usize, values: &[Value]) {
        let at = self.sp + n;
        self.words[at..at + values.len()].copy_from_slice(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_peek() {
        let mut stack = InterpreterStack::new(4);
        stack.push(Value::from_i64(1));
        stack.push(Value::from_i64(2));

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.free(), 2);
        assert_eq!(stack.peek(0), Some(Value::from_i64(2)));
        assert_eq!(stack.peek(1), Some(Value::from_i64(1)));
        assert_eq!(stack.peek(2), None);

        stack.set(1, Value::from_i64(7));
        assert_eq!(stack.pop(), Some(Value::from_i64(2)));
        assert_eq!(stack.pop(), Some(Value::from_i64(7)));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn frames_round_trip_with_pc_on_top() {
        let mut stack = InterpreterStack::new(8);
        let frame = ReturnFrame::pseudo(Value::from_code_addr(0x100), Value::from_i64(5));
        stack.push_frame(frame);

        assert_eq!(stack.peek(0), Some(frame.pc));
        assert_eq!(stack.peek(1), Some(frame.env));
        assert_eq!(stack.peek(2), Some(Value::from_i64(0)));
        assert_eq!(stack.pop_frame(), Some(frame));
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.pop_frame(), None);
    }

    #[test]
    #[should_panic(expected = "interpreter stack overflow")]
    fn push_past_the_end_panics() {
        let mut stack = InterpreterStack::new(1);
        stack.push(Value::from_i64(1));
        stack.push(Value::from_i64(2));
    }
}
