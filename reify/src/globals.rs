//! Growth of the interpreter's global binding table.
//!
//! The table is a single block reachable from [`Root::GlobalData`]. The
//! collector may run inside the allocation of the new table, so the old
//! table is only ever reached through the root, never through a value held
//! across the allocation.

use log::debug;

use crate::{ManagedHeap, Root, Value};

/// Tag of the global table block.
pub const GLOBAL_DATA_TAG: u8 = 0;

/// Rounds a requested slot count up to the growth granularity.
#[inline]
pub fn rounded_size(requested: usize, granularity: usize) -> usize {
    requested.next_multiple_of(granularity)
}

/// Installs an initial global table holding `values`.
pub fn init_global_data(heap: &mut dyn ManagedHeap, values: &[Value]) {
    let table = heap.allocate_block(values.len(), GLOBAL_DATA_TAG);
    for (i, &value) in values.iter().enumerate() {
        heap.initialize_field(table, i, value);
    }
    heap.update_root(Root::GlobalData, table);
}

/// Current number of global slots.
pub fn global_size(heap: &dyn ManagedHeap) -> usize {
    let table = heap.read_root(Root::GlobalData);
    if table.is_ref() { heap.block_len(table) } else { 0 }
}

/// Makes sure the global table has at least `requested` slots.
///
/// Never shrinks. When growing, the new table is rounded up to a multiple of
/// `granularity`, every old slot is copied and every new slot holds
/// [`Value::UNBOUND`] before the root is switched over.
pub fn realloc_global(heap: &mut dyn ManagedHeap, requested: usize, granularity: usize) {
    let actual_size = global_size(heap);
    if requested <= actual_size {
        return;
    }

    let new_size = rounded_size(requested, granularity);
    debug!("Growing global data to {new_size} entries");

    let new_global_data = heap.allocate_block(new_size, GLOBAL_DATA_TAG);
    // the allocation may have moved the old table
    let old_global_data = heap.read_root(Root::GlobalData);

    for i in 0..actual_size {
        let value = heap.field(old_global_data, i);
        heap.initialize_field(new_global_data, i, value);
    }
    for i in actual_size..new_size {
        heap.initialize_field(new_global_data, i, Value::UNBOUND);
    }

    heap.update_root(Root::GlobalData, new_global_data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArenaHeap;

    fn values(heap: &ArenaHeap) -> Vec<Value> {
        let table = heap.read_root(Root::GlobalData);
        (0..heap.block_len(table)).map(|i| heap.field(table, i)).collect()
    }

    #[test]
    fn rounds_to_granularity() {
        assert_eq!(rounded_size(10, 256), 256);
        assert_eq!(rounded_size(256, 256), 256);
        assert_eq!(rounded_size(257, 256), 512);
    }

    #[test]
    fn growing_preserves_old_slots_and_fills_unbound() {
        let mut heap = ArenaHeap::new();
        let cells: Vec<Value> = (0..4)
            .map(|i| {
                // heap references, so relocation matters
                let cell = heap.allocate_block(1, 0);
                heap.initialize_field(cell, 0, Value::from_i64(100 + i));
                cell
            })
            .collect();
        init_global_data(&mut heap, &cells);
        heap.set_relocate_on_allocate(true);
        let before = heap.read_root(Root::GlobalData);

        realloc_global(&mut heap, 10, 256);

        let table = heap.read_root(Root::GlobalData);
        assert_ne!(table, before);
        assert!(!heap.is_live(before));
        assert_eq!(heap.block_len(table), 256);
        for i in 0..4 {
            let cell = heap.field(table, i);
            assert_eq!(heap.field(cell, 0), Value::from_i64(100 + i as i64));
        }
        for i in 4..256 {
            assert_eq!(heap.field(table, i), Value::UNBOUND);
        }
    }

    #[test]
    fn old_table_is_unreachable_after_growth() {
        let mut heap = ArenaHeap::new();
        init_global_data(&mut heap, &[Value::from_i64(1); 4]);
        let old = heap.read_root(Root::GlobalData);

        realloc_global(&mut heap, 10, 256);
        assert_ne!(heap.read_root(Root::GlobalData), old);

        heap.collect();
        assert!(!heap.is_live(old));
        assert_eq!(heap.live_blocks(), 1);
    }

    #[test]
    fn requests_within_current_size_change_nothing() {
        let mut heap = ArenaHeap::new();
        let initial = [1, 2, 3, 4].map(Value::from_i64);
        init_global_data(&mut heap, &initial);
        let table = heap.read_root(Root::GlobalData);
        let writes = heap.barrier_writes();

        realloc_global(&mut heap, 0, 256);
        realloc_global(&mut heap, 3, 256);
        realloc_global(&mut heap, 4, 256);

        assert_eq!(heap.read_root(Root::GlobalData), table);
        assert_eq!(heap.barrier_writes(), writes);
        assert_eq!(values(&heap), initial.to_vec());
    }

    #[test]
    fn every_slot_goes_through_the_barrier() {
        let mut heap = ArenaHeap::new();
        init_global_data(&mut heap, &[Value::from_i64(9); 4]);
        let writes = heap.barrier_writes();

        realloc_global(&mut heap, 300, 256);

        assert_eq!(global_size(&heap), 512);
        assert_eq!(heap.barrier_writes() - writes, 512);
    }

    #[test]
    fn growing_an_empty_heap_creates_the_table() {
        let mut heap = ArenaHeap::new();
        assert_eq!(global_size(&heap), 0);
        realloc_global(&mut heap, 1, 256);
        assert_eq!(values(&heap), vec![Value::UNBOUND; 256]);
    }
}
