use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetaError>;

/// Failures reported by the loader, the unloader, the global table and the
/// trace trampoline.
///
/// None of these are retryable. [`MetaError::UnknownFragment`] is a caller
/// contract violation and never happens in a correct program; the others are
/// resource exhaustion or a mode mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// The summed chunk lengths do not fit in the address space.
    #[error("bytecode unit too large: {chunks} chunks overflow usize")]
    CodeTooLarge { chunks: usize },

    /// No registered fragment has exactly this range. The handle was either
    /// never produced by `reify_bytecode` or has already been released.
    #[error("no code fragment registered for [{start:#x}, {end:#x})")]
    UnknownFragment { start: usize, end: usize },

    /// The runtime executes native code and has no bytecode path for this.
    #[error("{operation} is impossible with native code")]
    Unsupported { operation: &'static str },

    #[error("not found")]
    NotFound,

    #[error("invalid code settings: {0}")]
    InvalidSettings(&'static str),

    /// The interpreter stack has no room for the pseudo frame.
    #[error("stack overflow: need {needed} free words, {available} available")]
    StackOverflow { needed: usize, available: usize },

    /// The interpreter stack holds fewer words than the splice must keep on
    /// top.
    #[error("stack underflow: need {needed} live words, {depth} present")]
    StackUnderflow { needed: usize, depth: usize },
}

impl MetaError {
    /// Whether this error means the caller broke the loader protocol.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            MetaError::UnknownFragment { .. } | MetaError::Unsupported { .. }
        )
    }
}
