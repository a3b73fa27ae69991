//! Test vectors and their storage

mod arena;
mod vector;

pub use arena::{TvArena, TvId};
pub use vector::TestVector;
