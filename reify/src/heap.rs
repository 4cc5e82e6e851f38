//! The garbage collector as seen by this crate, plus a small relocating
//! arena that implements it.

use std::collections::HashMap;

use log::trace;

use crate::Value;

/// Tag of closure blocks.
pub const CLOSURE_TAG: u8 = 247;

/// Well-known roots the collector always treats as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    /// The interpreter's global binding table.
    GlobalData,
}

/// Allocation, barrier-safe initialization and root access.
///
/// Every `allocate_block` is a potential collection point: any block not
/// reachable from a root may move or disappear during the call, so callers
/// re-read roots afterwards instead of holding on to block values.
pub trait ManagedHeap {
    /// Allocates a block of `len` fields. Fields must be initialized with
    /// [`ManagedHeap::initialize_field`] before the block is published.
    fn allocate_block(&mut self, len: usize, tag: u8) -> Value;

    fn block_len(&self, block: Value) -> usize;

    fn block_tag(&self, block: Value) -> u8;

    fn field(&self, block: Value, idx: usize) -> Value;

    /// First write into a freshly allocated block; informs the collector of
    /// the new reference.
    fn initialize_field(&mut self, block: Value, idx: usize, value: Value);

    fn read_root(&self, root: Root) -> Value;

    /// Replaces a root in one step.
    fn update_root(&mut self, root: Root, value: Value);
}

#[derive(Debug, Clone)]
struct Block {
    tag: u8,
    fields: Vec<Value>,
}

/// Block heap for hosts without a collector of their own, and for tests.
///
/// Block values are opaque ids. A relocating arena runs a full copying
/// collection before every allocation: reachable blocks get new ids, and
/// anything else, including stale ids held outside a root, becomes dangling.
#[derive(Debug, Default)]
pub struct ArenaHeap {
    blocks: HashMap<u64, Block>,
    roots: HashMap<Root, Value>,
    next_id: u64,
    relocate_on_allocate: bool,
    barrier_writes: usize,
    collections: usize,
}

impl ArenaHeap {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// An arena that moves every live block on each allocation.
    pub fn relocating() -> Self {
        Self {
            relocate_on_allocate: true,
            ..Self::new()
        }
    }

    #[inline]
    fn value_of(id: u64) -> Value {
        Value::from_ptr((id << 3) as usize as *const u64)
    }

    #[inline]
    fn id_of(value: Value) -> Option<u64> {
        value.is_ref().then(|| value.ref_bits() >> 3)
    }

    fn block(&self, value: Value) -> &Block {
        Self::id_of(value)
            .and_then(|id| self.blocks.get(&id))
            .unwrap_or_else(|| panic!("dangling heap reference {value:?}"))
    }

    fn block_mut(&mut self, value: Value) -> &mut Block {
        Self::id_of(value)
            .and_then(|id| self.blocks.get_mut(&id))
            .unwrap_or_else(|| panic!("dangling heap reference {value:?}"))
    }

    pub fn set_relocate_on_allocate(&mut self, relocate: bool) {
        self.relocate_on_allocate = relocate;
    }

    pub fn is_live(&self, value: Value) -> bool {
        Self::id_of(value).is_some_and(|id| self.blocks.contains_key(&id))
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn barrier_writes(&self) -> usize {
        self.barrier_writes
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Copies every block reachable from the roots to a fresh id and drops
    /// the rest.
    pub fn collect(&mut self) {
        let mut from = std::mem::take(&mut self.blocks);
        let mut forwarding: HashMap<u64, u64> = HashMap::new();
        let mut scan: Vec<u64> = Vec::new();
        let mut next_id = self.next_id;

        let mut evacuate = |value: Value,
                            from: &mut HashMap<u64, Block>,
                            to: &mut HashMap<u64, Block>,
                            scan: &mut Vec<u64>|
         -> Value {
            let Some(old) = Self::id_of(value) else {
                return value;
            };
            if let Some(&new) = forwarding.get(&old) {
                return Self::value_of(new);
            }
            let block = from
                .remove(&old)
                .unwrap_or_else(|| panic!("dangling heap reference {value:?}"));
            let new = next_id;
            next_id += 1;
            forwarding.insert(old, new);
            to.insert(new, block);
            scan.push(new);
            Self::value_of(new)
        };

        let mut to = HashMap::new();
        let roots: Vec<(Root, Value)> =
            self.roots.iter().map(|(&r, &v)| (r, v)).collect();
        for (root, value) in roots {
            let moved = evacuate(value, &mut from, &mut to, &mut scan);
            self.roots.insert(root, moved);
        }

        while let Some(id) = scan.pop() {
            let mut fields = std::mem::take(
                &mut to.get_mut(&id).expect("scanned block exists").fields,
            );
            for field in fields.iter_mut() {
                *field = evacuate(*field, &mut from, &mut to, &mut scan);
            }
            to.get_mut(&id).expect("scanned block exists").fields = fields;
        }

        trace!(
            "arena collection: {} live, {} freed",
            to.len(),
            from.len()
        );
        self.blocks = to;
        self.next_id = next_id;
        self.collections += 1;
    }
}

impl ManagedHeap for ArenaHeap {
    fn allocate_block(&mut self, len: usize, tag: u8) -> Value {
        if self.relocate_on_allocate {
            self.collect();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(
            id,
            Block {
                tag,
                fields: vec![Value::UNBOUND; len],
            },
        );
        Self::value_of(id)
    }

    fn block_len(&self, block: Value) -> usize {
        self.block(block).fields.len()
    }

    fn block_tag(&self, block: Value) -> u8 {
        self.block(block).tag
    }

    fn field(&self, block: Value, idx: usize) -> Value {
        self.block(block).fields[idx]
    }

    fn initialize_field(&mut self, block: Value, idx: usize, value: Value) {
        self.barrier_writes += 1;
        self.block_mut(block).fields[idx] = value;
    }

    fn read_root(&self, root: Root) -> Value {
        self.roots.get(&root).copied().unwrap_or(Value::UNBOUND)
    }

    fn update_root(&mut self, root: Root, value: Value) {
        self.roots.insert(root, value);
    }
}
