//! Thread-local visited sets for graph traversal.
//!
//! Each set is an epoch array: marking is one write, and clearing bumps the
//! epoch instead of zeroing memory.

use std::cell::RefCell;

const MIN_CAPACITY: usize = 1024;
const POOL_LIMIT: usize = 4;

thread_local! {
    static POOL: RefCell<Vec<EpochSet>> = const { RefCell::new(Vec::new()) };
}

struct EpochSet {
    epochs: Vec<u32>,
    current: u32,
}

impl EpochSet {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            epochs: vec![0; capacity.max(MIN_CAPACITY)],
            current: 1,
        }
    }

    fn reset(&mut self) {
        self.current = self.current.wrapping_add(1);
        if self.current == 0 {
            self.epochs.fill(0);
            self.current = 1;
        }
    }
}

/// Visited set borrowed from the thread-local pool; returned on drop
pub struct Visited {
    set: Option<EpochSet>,
}

impl Visited {
    /// Borrows a cleared set able to hold ids below `capacity` without growing
    pub fn new(capacity: usize) -> Self {
        let set = POOL.with(|pool| {
            let mut pool = pool.borrow_mut();
            match pool.iter().position(|s| s.epochs.len() >= capacity) {
                Some(idx) => {
                    let mut set = pool.swap_remove(idx);
                    set.reset();
                    set
                }
                None => EpochSet::with_capacity(capacity),
            }
        });
        Self { set: Some(set) }
    }

    #[inline]
    fn set(&self) -> &EpochSet {
        self.set.as_ref().expect("visited set present until drop")
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        let set = self.set();
        let id = id as usize;
        id < set.epochs.len() && set.epochs[id] == set.current
    }

    /// Marks `id`; returns false if it was already marked
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        if self.contains(id) {
            return false;
        }
        let set = self.set.as_mut().expect("visited set present until drop");
        let id = id as usize;
        if id >= set.epochs.len() {
            let len = (id + 1).next_power_of_two().max(MIN_CAPACITY);
            set.epochs.resize(len, 0);
        }
        set.epochs[id] = set.current;
        true
    }
}

impl Drop for Visited {
    fn drop(&mut self) {
        if let Some(set) = self.set.take() {
            POOL.with(|pool| {
                let mut pool = pool.borrow_mut();
                if pool.len() < POOL_LIMIT {
                    pool.push(set);
                }
            });
        }
    }
}
