use std::{fmt, sync::Arc};

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::{CodeBuffer, GrowableTable};

/// 128-bit content hash of a persisted code fragment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; 16]);

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// How a fragment came to be resident, and who owns its memory.
#[derive(Debug)]
pub enum FragmentKind {
    /// Reified at runtime. The fragment owns the buffer and dropping the
    /// fragment frees the code.
    Loaded { code: CodeBuffer },
    /// Code the runtime does not own, identified by a precomputed digest.
    Trusted { digest: Digest },
}

/// One contiguous block of executable bytecode, `[start, end)`.
#[derive(Debug)]
pub struct CodeFragment {
    start: usize,
    end: usize,
    kind: FragmentKind,
}

pub type FragmentRef = Arc<CodeFragment>;

impl CodeFragment {
    pub fn loaded(code: CodeBuffer) -> Self {
        Self {
            start: code.start(),
            end: code.end(),
            kind: FragmentKind::Loaded { code },
        }
    }

    pub fn trusted(start: usize, len: usize, digest: Digest) -> Self {
        Self {
            start,
            end: start + len,
            kind: FragmentKind::Trusted { digest },
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    pub fn digest(&self) -> Option<Digest> {
        match self.kind {
            FragmentKind::Trusted { digest } => Some(digest),
            FragmentKind::Loaded { .. } => None,
        }
    }

    pub fn digest_computed(&self) -> bool {
        matches!(self.kind, FragmentKind::Trusted { .. })
    }

    #[inline]
    pub fn contains(&self, pc: usize) -> bool {
        (self.start..self.end).contains(&pc)
    }

    /// The owned code, if this fragment was reified at runtime.
    pub fn code(&self) -> Option<&CodeBuffer> {
        match &self.kind {
            FragmentKind::Loaded { code } => Some(code),
            FragmentKind::Trusted { .. } => None,
        }
    }
}

/// Table of the code fragments currently resident in memory.
///
/// Fragments are registered without any overlap check; callers guarantee
/// that live ranges are disjoint.
#[derive(Debug)]
pub struct FragmentRegistry {
    table: GrowableTable<FragmentRef>,
}

impl FragmentRegistry {
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self {
            table: GrowableTable::with_capacity(capacity_hint),
        }
    }

    pub fn register(&mut self, fragment: FragmentRef) {
        debug!(
            "registering code fragment [{:#x}, {:#x})",
            fragment.start(),
            fragment.end()
        );
        self.table.add(fragment);
    }

    /// The fragment whose range is exactly `[start, end)`.
    pub fn find_exact(&self, start: usize, end: usize) -> Option<&FragmentRef> {
        self.table.iter().find(|cf| cf.start == start && cf.end == end)
    }

    /// The fragment containing `pc`, for backtrace resolution.
    pub fn find_by_pc(&self, pc: usize) -> Option<&FragmentRef> {
        self.table.iter().find(|cf| cf.contains(pc))
    }

    pub fn find_by_digest(&self, digest: &Digest) -> Option<&FragmentRef> {
        self.table.iter().find(|cf| cf.digest().as_ref() == Some(digest))
    }

    /// Removes `fragment` from the table and hands it back. The memory is
    /// released only once the last handle is dropped.
    pub fn unregister(&mut self, fragment: &FragmentRef) -> Option<FragmentRef> {
        debug!(
            "unregistering code fragment [{:#x}, {:#x})",
            fragment.start(),
            fragment.end()
        );
        self.table.remove(fragment)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentRef> {
        self.table.iter()
    }
}

/// Process-wide fragment registry, shared between the loader and the
/// backtrace machinery.
#[derive(Debug, Clone)]
pub struct CodeRegistry(Arc<Mutex<FragmentRegistry>>);

impl CodeRegistry {
    pub fn new(capacity_hint: usize) -> Self {
        Self(Arc::new(Mutex::new(FragmentRegistry::with_capacity(capacity_hint))))
    }

    pub fn lock(&self) -> MutexGuard<'_, FragmentRegistry> {
        self.0.lock()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Range of the fragment containing `pc`.
    pub fn resolve(&self, pc: usize) -> Option<(usize, usize)> {
        self.0.lock().find_by_pc(pc).map(|cf| (cf.start(), cf.end()))
    }
}
