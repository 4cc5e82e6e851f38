//! Call interception by stack splicing.
//!
//! When a traced closure is called, the instrumentation code runs first and
//! invokes [`invoke_traced_function`] with the real target. The splice puts
//! a pseudo return frame into the real target underneath the
//! instrumentation's own frame, so that when the instrumentation returns the
//! interpreter enters the target as if it had been called directly.
//!
//! Stack after splicing, top first:
//!
//! ```text
//! sp[0 .. preserved]           instrumentation frame and its arguments (moved)
//! sp[preserved + 0]            pc         = target code
//! sp[preserved + 1]            env        = target environment
//! sp[preserved + 2]            extra_args = 0
//! sp[preserved + 3]            argument of the target
//! sp[preserved + 4 ..]         untouched
//! ```

use crate::{InterpreterStack, MetaError, Result, ReturnFrame, Value};

/// A call about to be intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracedCall {
    pub code: Value,
    pub env: Value,
    pub arg: Value,
}

/// Shape of the words that sit above the splice point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceLayout {
    /// Words on top of the stack that must stay on top: the return frame
    /// into the instrumentation plus the three arguments it was called with.
    pub preserved_words: usize,
}

impl Default for SpliceLayout {
    fn default() -> Self {
        Self {
            preserved_words: ReturnFrame::WORDS + 3,
        }
    }
}

impl SpliceLayout {
    /// How far the stack pointer moves down.
    pub const SHIFT: usize = ReturnFrame::WORDS + 1;

    /// Offset from the new `sp` of the spliced-in argument.
    #[inline]
    pub const fn argument_offset(&self) -> usize {
        self.preserved_words + ReturnFrame::WORDS
    }
}

/// Splices a pseudo return frame into `call.code` below the preserved
/// words on top of `stack`.
///
/// Fails without touching the stack if it lacks the free room for the frame
/// or holds fewer than `layout.preserved_words` live words.
pub fn invoke_traced_function(
    stack: &mut InterpreterStack,
    call: TracedCall,
    layout: SpliceLayout,
) -> Result<()> {
    let needed = SpliceLayout::SHIFT;
    if stack.free() < needed {
        return Err(MetaError::StackOverflow {
            needed,
            available: stack.free(),
        });
    }
    if stack.depth() < layout.preserved_words {
        return Err(MetaError::StackUnderflow {
            needed: layout.preserved_words,
            depth: stack.depth(),
        });
    }

    let at = stack.open_gap(needed, layout.preserved_words);
    let frame = ReturnFrame::pseudo(call.code, call.env);
    stack.write(at, &frame.to_words());
    stack.write(at + ReturnFrame::WORDS, &[call.arg]);
    Ok(())
}

/// The environment word on top of the stack.
pub fn current_environment(stack: &InterpreterStack) -> Option<Value> {
    stack.peek(0)
}
