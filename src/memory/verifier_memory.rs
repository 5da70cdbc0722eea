//! This module provides the [`VerifierMemory`] structure, a sparse representation
//! of the block store.
//!
//! During verification the filled memory is not available; only the blocks revealed
//! by a proof are stored, keyed by their absolute index.

use std::collections::HashMap;

use crate::memory::{Block, PartialMemory};

/// The blocks revealed in a proof, indexed by their original positions.
#[derive(Debug, Default)]
pub struct VerifierMemory {
    data: HashMap<usize, Block>,
}

impl VerifierMemory {
    /// Inserts a block at the specified index.
    ///
    /// Returns the previous block at that index, if any.
    pub fn insert(&mut self, index: usize, block: Block) -> Option<Block> {
        self.data.insert(index, block)
    }

    /// Whether a block was revealed at `index`.
    pub fn contains(&self, index: usize) -> bool {
        self.data.contains_key(&index)
    }

    /// Number of revealed blocks.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing was revealed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl PartialMemory for VerifierMemory {
    fn get_block(&self, index: usize) -> Option<&Block> {
        self.data.get(&index)
    }
}
