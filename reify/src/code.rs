//! Executable bytecode buffers and the passes that prepare them for the
//! interpreter.

use log::trace;

use crate::{MetaError, Op, Result};

const WORD: usize = std::mem::size_of::<u32>();

/// Byte order of the words in a bytecode unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub const NATIVE: ByteOrder = if cfg!(target_endian = "little") {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };
}

/// Handler addresses used for threaded dispatch.
///
/// Threaded code stores `handler - base` in each opcode slot, so every
/// handler must lie within 4 GiB above `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    base: usize,
    offsets: [u32; Op::COUNT],
}

impl DispatchTable {
    /// Builds a table from absolute handler addresses, indexed by opcode.
    ///
    /// Returns `None` if a handler lies below `base` or too far above it.
    pub fn new(base: usize, handlers: &[usize; Op::COUNT]) -> Option<Self> {
        let mut offsets = [0u32; Op::COUNT];
        for (slot, &handler) in offsets.iter_mut().zip(handlers) {
            *slot = u32::try_from(handler.checked_sub(base)?).ok()?;
        }
        Some(Self { base, offsets })
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline(always)]
    pub fn threaded(&self, op: Op) -> u32 {
        self.offsets[op as usize]
    }

    /// Absolute handler address for a threaded opcode slot.
    #[inline(always)]
    pub fn handler(&self, slot: u32) -> usize {
        self.base + slot as usize
    }

    /// Reverse mapping, mostly for disassembly and tests.
    pub fn opcode_of(&self, slot: u32) -> Option<Op> {
        self.offsets
            .iter()
            .position(|&offset| offset == slot)
            .and_then(|idx| Op::try_from(idx as u32).ok())
    }
}

/// One contiguous, word-aligned bytecode unit owned by the runtime.
///
/// The buffer is allocated independently of the chunks it was assembled
/// from and never moves while it is alive, so its address range can be
/// registered as a code fragment.
pub struct CodeBuffer {
    words: Box<[u32]>,
    len: usize,
}

impl CodeBuffer {
    /// Concatenates `chunks` into a fresh buffer.
    ///
    /// Fails only if the summed length overflows; allocation failure aborts.
    pub fn assemble(chunks: &[&[u8]]) -> Result<Self> {
        debug_assert!(!chunks.is_empty(), "bytecode unit without chunks");
        let len = chunks
            .iter()
            .try_fold(0usize, |acc, chunk| acc.checked_add(chunk.len()))
            .ok_or(MetaError::CodeTooLarge {
                chunks: chunks.len(),
            })?;

        // at least one word, so every buffer has a distinct address
        let word_count = len.div_ceil(WORD).max(1);
        let mut buffer = Self {
            words: vec![0u32; word_count].into_boxed_slice(),
            len,
        };

        let bytes = buffer.as_bytes_mut();
        let mut off = 0;
        for chunk in chunks {
            bytes[off..off + chunk.len()].copy_from_slice(chunk);
            off += chunk.len();
        }
        debug_assert_eq!(off, len);

        Ok(buffer)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.words.as_ptr() as usize
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start() + self.len
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the word buffer holds at least `len` initialized bytes
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: the word buffer holds at least `len` bytes, and we hold
        // the only reference to it
        unsafe {
            std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len)
        }
    }

    /// The complete instruction words of the unit.
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len / WORD]
    }

    pub fn words_mut(&mut self) -> &mut [u32] {
        let n = self.len / WORD;
        &mut self.words[..n]
    }
}

impl std::fmt::Debug for CodeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeBuffer")
            .field("start", &format_args!("{:#x}", self.start()))
            .field("len", &self.len)
            .finish()
    }
}

/// Rewrites every instruction word from `order` into host order.
///
/// The opcode word is converted first so the instruction length can be read
/// from it; words after a truncated final instruction are left alone.
pub fn fixup_endianness(code: &mut [u32], order: ByteOrder) {
    if order == ByteOrder::NATIVE {
        return;
    }
    trace!("swapping {} code words to host order", code.len());

    let mut pc = 0;
    while pc < code.len() {
        code[pc] = code[pc].swap_bytes();
        let op = Op::try_from(code[pc]).ok();
        if op == Some(Op::Switch) {
            if let Some(sizes) = code.get_mut(pc + 1) {
                *sizes = sizes.swap_bytes();
            }
        }
        let operands = op.map_or(0, |op| op.operand_words(code, pc));
        let first = pc + 1 + usize::from(op == Some(Op::Switch));
        let end = (pc + 1 + operands).min(code.len());
        for word in code.iter_mut().take(end).skip(first.min(end)) {
            *word = word.swap_bytes();
        }
        pc += 1 + operands;
    }
}

/// Replaces each opcode with its threaded handler offset.
///
/// Unknown opcodes are threaded as [`Op::Stop`].
pub fn thread_code(code: &mut [u32], table: &DispatchTable) {
    trace!("threading {} code words", code.len());

    let mut pc = 0;
    while pc < code.len() {
        let op = Op::try_from(code[pc]).unwrap_or(Op::Stop);
        let operands = op.operand_words(code, pc);
        code[pc] = table.threaded(op);
        pc += 1 + operands;
    }
}
