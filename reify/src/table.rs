use std::{ptr::NonNull, sync::Arc};

/// Identity comparison for table entries.
///
/// Entries are handles; two handles are the same entry when they point at the
/// same object, regardless of what that object contains.
pub trait EntryHandle {
    fn same_entry(&self, other: &Self) -> bool;
}

impl<T: ?Sized> EntryHandle for Arc<T> {
    #[inline]
    fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> EntryHandle for Box<T> {
    #[inline]
    fn same_entry(&self, other: &Self) -> bool {
        std::ptr::addr_eq(&**self as *const T, &**other as *const T)
    }
}

impl<T: ?Sized> EntryHandle for NonNull<T> {
    #[inline]
    fn same_entry(&self, other: &Self) -> bool {
        std::ptr::addr_eq(self.as_ptr(), other.as_ptr())
    }
}

/// What happens to the entries when a table is cleared or freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Drop every entry together with the table contents.
    Entries,
    /// Hand the entries back to the caller untouched.
    Keep,
}

/// Growable array of entry handles with explicit capacity tracking.
///
/// `add` doubles the capacity when full, `remove` scans for the entry by
/// identity. Positions are not stable across removals.
#[derive(Debug)]
pub struct GrowableTable<T> {
    capacity: usize,
    contents: Vec<T>,
}

impl<T> GrowableTable<T> {
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self {
            capacity: capacity_hint,
            contents: Vec::with_capacity(capacity_hint),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.contents.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.contents.iter()
    }

    /// Appends `entry` and returns the index it was stored at.
    pub fn add(&mut self, entry: T) -> usize {
        let size = self.contents.len();
        if size == self.capacity {
            let new_capacity = (self.capacity * 2).max(1);
            self.contents.reserve_exact(new_capacity - size);
            self.capacity = new_capacity;
        }
        self.contents.push(entry);
        size
    }

    /// Resets the table to zero entries, keeping the storage.
    ///
    /// With [`Release::Keep`] the entries are returned instead of dropped.
    pub fn clear(&mut self, release: Release) -> Vec<T> {
        match release {
            Release::Entries => {
                self.contents.clear();
                Vec::new()
            }
            Release::Keep => self.contents.drain(..).collect(),
        }
    }

    /// Tears the table down. The returned vector is empty unless
    /// [`Release::Keep`] was requested.
    pub fn free(mut self, release: Release) -> Vec<T> {
        self.clear(release)
    }
}

impl<T: EntryHandle> GrowableTable<T> {
    /// Removes `entry` (matched by identity) and returns the stored handle.
    ///
    /// The caller must know the entry is present; removing an absent entry is
    /// a logic error and only caught in debug builds.
    pub fn remove(&mut self, entry: &T) -> Option<T> {
        let position = self.contents.iter().position(|e| e.same_entry(entry));
        debug_assert!(position.is_some(), "removing an entry that is not in the table");
        position.map(|idx| self.contents.remove(idx))
    }

    pub fn contains(&self, entry: &T) -> bool {
        self.contents.iter().any(|e| e.same_entry(entry))
    }
}

impl<'a, T> IntoIterator for &'a GrowableTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn add_grows_capacity_geometrically() {
        let mut table = GrowableTable::with_capacity(2);
        assert_eq!(table.add(Arc::new(1)), 0);
        assert_eq!(table.add(Arc::new(2)), 1);
        assert_eq!(table.capacity(), 2);

        assert_eq!(table.add(Arc::new(3)), 2);
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.len(), 3);
        let values: Vec<i32> = table.iter().map(|e| **e).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_hint_still_accepts_entries() {
        let mut table = GrowableTable::with_capacity(0);
        table.add(Arc::new("a"));
        assert_eq!(table.capacity(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_matches_identity_not_contents() {
        let a = Arc::new(7);
        let b = Arc::new(7);
        let mut table = GrowableTable::with_capacity(4);
        table.add(a.clone());
        table.add(b.clone());

        let removed = table.remove(&b).expect("b is present");
        assert!(Arc::ptr_eq(&removed, &b));
        assert_eq!(table.len(), 1);
        assert!(table.contains(&a));
        assert!(!table.contains(&b));
    }

    #[test]
    fn clear_keep_hands_entries_back() {
        let mut table = GrowableTable::with_capacity(1);
        let a = Arc::new(1);
        table.add(a.clone());
        assert_eq!(Arc::strong_count(&a), 2);

        let storage = table.contents.as_ptr();
        let kept = table.clear(Release::Keep);
        assert!(table.is_empty());
        assert_eq!(table.contents.as_ptr(), storage);
        assert!(table.contents.capacity() >= 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(Arc::strong_count(&a), 2);

        drop(kept);
        assert_eq!(Arc::strong_count(&a), 1);
    }

    #[test]
    fn clear_entries_drops_them() {
        let a = Arc::new(1);
        let mut table = GrowableTable::with_capacity(1);
        table.add(a.clone());
        let storage = table.contents.as_ptr();
        let rest = table.clear(Release::Entries);
        assert_eq!(table.contents.as_ptr(), storage);
        assert!(rest.is_empty());
        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(table.capacity(), 1);
    }

    #[test]
    fn free_consumes_the_table() {
        let a = Arc::new(1);
        let mut table = GrowableTable::with_capacity(1);
        table.add(a.clone());
        assert!(table.free(Release::Entries).is_empty());
        assert_eq!(Arc::strong_count(&a), 1);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Add,
        Remove(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![Just(Step::Add), any::<usize>().prop_map(Step::Remove)]
    }

    proptest! {
        #[test]
        fn size_tracks_present_entries(steps in prop::collection::vec(step(), 0..64)) {
            let mut table = GrowableTable::with_capacity(1);
            let mut live: Vec<Arc<usize>> = Vec::new();
            for (n, step) in steps.into_iter().enumerate() {
                match step {
                    Step::Add => {
                        let entry = Arc::new(n);
                        table.add(entry.clone());
                        live.push(entry);
                    }
                    Step::Remove(pick) if !live.is_empty() => {
                        let entry = live.swap_remove(pick % live.len());
                        prop_assert!(table.remove(&entry).is_some());
                    }
                    Step::Remove(_) => {}
                }
                prop_assert_eq!(table.len(), live.len());
                prop_assert!(table.len() <= table.capacity());
            }
            for entry in &live {
                prop_assert!(table.contains(entry));
            }
        }
    }
}
