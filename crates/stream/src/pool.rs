//! Fixed-capacity object pools for the streaming hot path.
//!
//! Region activation/deactivation touches thousands of leaves per cadence
//! tick; every transient buffer it needs is pool-backed so the steady
//! state performs no allocation. Each pool pre-owns its instances and
//! hands out index handles; `taken()` is the outstanding-borrow count,
//! asserted back to zero after every full cycle.
//!
//! Capacity exhaustion is a hard error. A pool that runs dry means the
//! streaming policy is holding more transient state than it was sized
//! for, which the caller must treat as a bug, not absorb silently.

use std::collections::HashSet;
use std::hash::Hash;

/// Handle to a matrix borrowed from a [`MatrixPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixHandle(u32);

/// Handle to a set borrowed from an [`IndexedSetPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetHandle(u32);

/// Handle to a list borrowed from a [`ListPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListHandle(u32);

/// Fixed-size row-major 2D numeric buffer, reused across leaf
/// activations.
#[derive(Debug)]
pub struct Matrix<T> {
    side: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Matrix<T> {
    fn new(side: usize) -> Self {
        Self {
            side,
            data: vec![T::default(); side * side],
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.side + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.side + x] = value;
    }

    fn reset(&mut self) {
        self.data.fill(T::default());
    }
}

/// Pool of fixed-size numeric matrices.
///
/// Matrices are zeroed on give-back, so a fresh borrow always starts
/// from the kind's zero value.
#[derive(Debug)]
pub struct MatrixPool<T> {
    side: usize,
    capacity: usize,
    slots: Vec<Matrix<T>>,
    free: Vec<usize>,
}

impl<T: Copy + Default> MatrixPool<T> {
    pub fn new(side: usize, capacity: usize) -> Self {
        Self {
            side,
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn borrow(&mut self) -> MatrixHandle {
        if let Some(index) = self.free.pop() {
            return MatrixHandle(index as u32);
        }
        assert!(
            self.slots.len() < self.capacity,
            "matrix pool exhausted (capacity {})",
            self.capacity
        );
        self.slots.push(Matrix::new(self.side));
        MatrixHandle((self.slots.len() - 1) as u32)
    }

    pub fn give_back(&mut self, handle: MatrixHandle) {
        let index = handle.0 as usize;
        debug_assert!(!self.free.contains(&index), "matrix returned twice");
        self.slots[index].reset();
        self.free.push(index);
    }

    pub fn get(&self, handle: MatrixHandle) -> &Matrix<T> {
        &self.slots[handle.0 as usize]
    }

    pub fn get_mut(&mut self, handle: MatrixHandle) -> &mut Matrix<T> {
        &mut self.slots[handle.0 as usize]
    }

    /// Number of currently-outstanding borrows.
    pub fn taken(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Insertion-order-preserving, duplicate-rejecting collection.
#[derive(Debug)]
pub struct IndexedSet<T> {
    order: Vec<T>,
    seen: HashSet<T>,
}

impl<T> Default for IndexedSet<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> IndexedSet<T> {
    /// Append a value unless already present. Reports whether it was added.
    pub fn insert(&mut self, value: T) -> bool {
        if !self.seen.insert(value) {
            return false;
        }
        self.order.push(value);
        true
    }

    /// Remove a value, preserving the order of the rest.
    pub fn remove(&mut self, value: T) -> bool {
        if !self.seen.remove(&value) {
            return false;
        }
        self.order.retain(|&v| v != value);
        true
    }

    pub fn contains(&self, value: T) -> bool {
        self.seen.contains(&value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

/// Pool of [`IndexedSet`]s, used for the per-cadence entity↔cell index.
#[derive(Debug)]
pub struct IndexedSetPool<T> {
    capacity: usize,
    slots: Vec<IndexedSet<T>>,
    free: Vec<usize>,
}

impl<T: Copy + Eq + Hash> IndexedSetPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn borrow(&mut self) -> SetHandle {
        if let Some(index) = self.free.pop() {
            return SetHandle(index as u32);
        }
        assert!(
            self.slots.len() < self.capacity,
            "indexed-set pool exhausted (capacity {})",
            self.capacity
        );
        self.slots.push(IndexedSet::default());
        SetHandle((self.slots.len() - 1) as u32)
    }

    pub fn give_back(&mut self, handle: SetHandle) {
        let index = handle.0 as usize;
        debug_assert!(!self.free.contains(&index), "set returned twice");
        self.slots[index].clear();
        self.free.push(index);
    }

    /// Return every outstanding set to the free list.
    pub fn give_back_all(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.clear();
            self.free.push(index);
        }
    }

    pub fn get(&self, handle: SetHandle) -> &IndexedSet<T> {
        &self.slots[handle.0 as usize]
    }

    pub fn get_mut(&mut self, handle: SetHandle) -> &mut IndexedSet<T> {
        &mut self.slots[handle.0 as usize]
    }

    pub fn taken(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Pool of growable scratch lists, used per tree-search level.
#[derive(Debug)]
pub struct ListPool<T> {
    capacity: usize,
    slots: Vec<Vec<T>>,
    free: Vec<usize>,
}

impl<T: Copy> ListPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn borrow(&mut self) -> ListHandle {
        if let Some(index) = self.free.pop() {
            return ListHandle(index as u32);
        }
        assert!(
            self.slots.len() < self.capacity,
            "list pool exhausted (capacity {})",
            self.capacity
        );
        self.slots.push(Vec::new());
        ListHandle((self.slots.len() - 1) as u32)
    }

    pub fn give_back(&mut self, handle: ListHandle) {
        let index = handle.0 as usize;
        debug_assert!(!self.free.contains(&index), "list returned twice");
        self.slots[index].clear();
        self.free.push(index);
    }

    /// Return every outstanding list except `keep`. Used by the tree
    /// search to discard intermediate level-lists while keeping its
    /// result.
    pub fn give_back_all_except(&mut self, keep: ListHandle) {
        let mut is_free = vec![false; self.slots.len()];
        for &index in &self.free {
            is_free[index] = true;
        }
        for index in 0..self.slots.len() {
            if is_free[index] || index == keep.0 as usize {
                continue;
            }
            self.slots[index].clear();
            self.free.push(index);
        }
    }

    pub fn get(&self, handle: ListHandle) -> &[T] {
        &self.slots[handle.0 as usize]
    }

    pub fn get_mut(&mut self, handle: ListHandle) -> &mut Vec<T> {
        &mut self.slots[handle.0 as usize]
    }

    pub fn taken(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
