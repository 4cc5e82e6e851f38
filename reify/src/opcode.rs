/// Bytecode opcodes.
///
/// Code is a sequence of 32-bit words. Every instruction is one opcode word
/// followed by a fixed number of operand words, except [`Switch`](Op::Switch)
/// whose length is encoded in its first operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Op {
    /// Load the n-th stack slot into the accumulator.
    /// Operands: `n`
    Acc = 0,

    /// Push the accumulator.
    Push,

    /// Push the accumulator, then load the n-th stack slot.
    /// Operands: `n`
    PushAcc,

    /// Drop n stack slots.
    /// Operands: `n`
    Pop,

    /// Store the accumulator into the n-th stack slot.
    /// Operands: `n`
    Assign,

    /// Load the n-th field of the current environment.
    /// Operands: `n`
    EnvAcc,

    /// Push a return frame `(pc + ofs, env, extra_args)`.
    /// Operands: `ofs`
    PushRetAddr,

    /// Call the closure in the accumulator with n stacked arguments.
    /// Operands: `n`
    Apply,

    /// Tail call with n arguments, discarding a frame of the given size.
    /// Operands: `n`, `frame_size`
    AppTerm,

    /// Return, popping n argument slots and then the return frame.
    /// Operands: `n`
    Return,

    /// Re-push the arguments of a partial application.
    Restart,

    /// Check that n extra arguments are available, else build a partial
    /// application.
    /// Operands: `n`
    Grab,

    /// Build a closure over n stacked values.
    /// Operands: `nvars`, `ofs`
    Closure,

    /// Operands: `idx`
    GetGlobal,

    /// Operands: `idx`
    SetGlobal,

    /// Load an immediate integer.
    /// Operands: `value`
    Const,

    /// Allocate a block and fill it from the accumulator and the stack.
    /// Operands: `size`, `tag`
    MakeBlock,

    /// Operands: `n`
    GetField,

    /// Operands: `n`
    SetField,

    /// Operands: `ofs`
    Branch,

    /// Operands: `ofs`
    BranchIf,

    /// Operands: `ofs`
    BranchIfNot,

    /// Jump table on the accumulator.
    /// Operands: `sizes` (`consts | blocks << 16`), then one offset per case.
    Switch,

    /// Call a host primitive.
    /// Operands: `nargs`, `prim`
    CCall,

    /// Leave the interpreter.
    Stop,
}

impl Op {
    pub const COUNT: usize = Op::Stop as usize + 1;

    /// Number of operand words for opcodes with a fixed length.
    ///
    /// Returns `None` for [`Switch`](Op::Switch), use [`Op::operand_words`].
    pub const fn fixed_operands(self) -> Option<usize> {
        let n = match self {
            Op::Push | Op::Restart | Op::Stop => 0,
            Op::Acc
            | Op::PushAcc
            | Op::Pop
            | Op::Assign
            | Op::EnvAcc
            | Op::PushRetAddr
            | Op::Apply
            | Op::Return
            | Op::Grab
            | Op::GetGlobal
            | Op::SetGlobal
            | Op::Const
            | Op::GetField
            | Op::SetField
            | Op::Branch
            | Op::BranchIf
            | Op::BranchIfNot => 1,
            Op::AppTerm | Op::Closure | Op::MakeBlock | Op::CCall => 2,
            Op::Switch => return None,
        };
        Some(n)
    }

    /// Number of operand words following the opcode at `code[pc]`.
    ///
    /// `code` must already be in host byte order for the switch size word.
    /// A switch whose size word lies past the end of `code` counts as having
    /// no operands.
    pub fn operand_words(self, code: &[u32], pc: usize) -> usize {
        match self.fixed_operands() {
            Some(n) => n,
            None => code
                .get(pc + 1)
                .map_or(0, |&sizes| 1 + switch_cases(sizes)),
        }
    }
}

/// Total number of jump offsets encoded by a switch size word.
#[inline]
pub fn switch_cases(sizes: u32) -> usize {
    (sizes & 0xFFFF) as usize + (sizes >> 16) as usize
}

impl TryFrom<u32> for Op {
    type Error = u32;

    fn try_from(word: u32) -> Result<Self, u32> {
        if (word as usize) < Self::COUNT {
            // SAFETY: Op is repr(u32) with contiguous variants starting at 0.
            Ok(unsafe { core::mem::transmute::<u32, Op>(word) })
        } else {
            Err(word)
        }
    }
}
