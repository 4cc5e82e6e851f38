use crate::Value;

/// Version of the return-frame layout shared with the interpreter.
///
/// Bump whenever the field order or the number of words changes.
pub const FRAME_LAYOUT_VERSION: u32 = 1;

/// A return frame as the interpreter lays it out on its stack.
///
/// 3 words, `#[repr(C)]`. Fields are stored from the top of the stack
/// downwards: `pc` at `sp[0]`, `env` at `sp[1]`, `extra_args` at `sp[2]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnFrame {
    /// Code address execution resumes at.
    pub pc: Value,
    /// Environment (closure) of the code at `pc`.
    pub env: Value,
    /// Arguments supplied beyond what the callee consumes; fixnum 0 when the
    /// call had exactly the arguments it needed.
    pub extra_args: Value,
}

impl ReturnFrame {
    pub const WORDS: usize = 3;

    /// A frame that enters `pc` exactly as a direct call with no pending
    /// extra arguments would.
    pub fn pseudo(pc: Value, env: Value) -> Self {
        Self {
            pc,
            env,
            extra_args: Value::from_i64(0),
        }
    }

    #[inline]
    pub fn to_words(self) -> [Value; Self::WORDS] {
        [self.pc, self.env, self.extra_args]
    }

    #[inline]
    pub fn from_words(words: &[Value; Self::WORDS]) -> Self {
        Self {
            pc: words[0],
            env: words[1],
            extra_args: words[2],
        }
    }
}
