use parking_lot::Mutex;

use crate::Value;

/// Debug-info subsystem as seen by the loader.
///
/// `attach` is called with the buffer range before the code is normalized,
/// `detach` with the buffer start when the unit is released.
pub trait DebugInfo: Send + Sync {
    fn attach(&self, start: usize, len: usize, info: Value);
    fn detach(&self, start: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugEntry {
    pub start: usize,
    pub len: usize,
    pub info: Value,
}

/// In-memory debug info keyed by code range.
#[derive(Debug, Default)]
pub struct DebugInfoTable {
    entries: Mutex<Vec<DebugEntry>>,
}

impl DebugInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug info of the unit containing `pc`.
    pub fn resolve(&self, pc: usize) -> Option<Value> {
        self.entries
            .lock()
            .iter()
            .find(|e| (e.start..e.start + e.len).contains(&pc))
            .map(|e| e.info)
    }

    pub fn entry(&self, start: usize) -> Option<DebugEntry> {
        self.entries.lock().iter().find(|e| e.start == start).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DebugInfo for DebugInfoTable {
    fn attach(&self, start: usize, len: usize, info: Value) {
        self.entries.lock().push(DebugEntry { start, len, info });
    }

    fn detach(&self, start: usize) {
        self.entries.lock().retain(|e| e.start != start);
    }
}
