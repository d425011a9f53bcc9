use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One search hit: a row position and its squared L2 distance to the query.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Positional vector storage answering exact k-NN queries.
///
/// Rows are addressed by their zero-based position. Removing rows compacts
/// the storage, so every surviving row after a removed one moves down.
pub trait VectorIndex {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn append(&mut self, vector: &[f32]) -> Result<usize>;
    /// `positions` must be sorted, deduplicated and in range.
    fn remove_rows(&mut self, positions: &[usize]) -> Result<()>;
    fn reconstruct(&self, position: usize) -> Option<&[f32]>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}
