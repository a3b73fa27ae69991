use std::fmt;

use crate::tv::TestVector;

/// Handle to a test vector owned by a [`TvArena`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TvId(u32);

impl TvId {
    /// Index of the vector in its arena
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tv{}", self.0)
    }
}

/// Storage for test vectors of a given width
///
/// Deleted vectors go to a free list and are handed out again by [`TvArena::new_vector`].
#[derive(Clone, Debug, Default)]
pub struct TvArena {
    input_num: usize,
    slots: Vec<TestVector>,
    in_use: Vec<bool>,
    free: Vec<TvId>,
}

impl TvArena {
    /// Create an arena for vectors with the given number of positions
    pub fn new(input_num: usize) -> TvArena {
        TvArena {
            input_num,
            ..Default::default()
        }
    }

    /// Number of positions of the vectors
    pub fn input_width(&self) -> usize {
        self.input_num
    }

    /// Obtain a fully unknown vector
    pub fn new_vector(&mut self) -> TvId {
        if let Some(id) = self.free.pop() {
            self.in_use[id.index()] = true;
            return id;
        }
        let id = TvId(self.slots.len() as u32);
        self.slots.push(TestVector::new(self.input_num));
        self.in_use.push(true);
        id
    }

    /// Give a vector back to the arena
    pub fn delete_vector(&mut self, id: TvId) {
        assert!(self.in_use[id.index()], "{id} deleted twice");
        self.in_use[id.index()] = false;
        self.slots[id.index()].clear();
        self.free.push(id);
    }

    /// Access a vector
    pub fn get(&self, id: TvId) -> &TestVector {
        debug_assert!(self.in_use[id.index()], "{id} used after deletion");
        &self.slots[id.index()]
    }

    /// Access a vector mutably
    pub fn get_mut(&mut self, id: TvId) -> &mut TestVector {
        debug_assert!(self.in_use[id.index()], "{id} used after deletion");
        &mut self.slots[id.index()]
    }

    /// Number of vectors ever allocated, including free ones
    pub fn nb_allocated(&self) -> usize {
        self.slots.len()
    }

    /// Number of vectors waiting on the free list
    pub fn nb_free(&self) -> usize {
        self.free.len()
    }

    /// Drop every vector, outstanding handles included
    pub fn clear(&mut self) {
        self.slots.clear();
        self.in_use.clear();
        self.free.clear();
    }
}
