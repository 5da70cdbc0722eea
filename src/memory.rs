//! The block store: the working memory of the memory-hard function.
//!
//! All blocks live in one contiguous arena addressed by absolute index
//! (`lane * lane_length + index_in_lane`). Blocks are written once per pass, by
//! exactly one segment job, and only read after the sync point that wrote them.

use crate::{
    config::Config,
    error::{PowError, Result},
    hash::{PREHASH_LENGTH, long_hash},
};

mod block;
pub mod compress;
pub mod position;
pub mod scheduler;
pub mod verifier_memory;

pub use block::{BLOCK_SIZE, BLOCK_WORDS, Block};
pub use compress::{HeaderBinding, fill_block};
pub use position::{FillPosition, MemoryGeometry, index_alpha, reference_block};
pub use scheduler::{FillScheduler, FillState};

/// Read access to (some of) the blocks of a memory.
///
/// The solver has every block; the verifier only has the ones revealed in a proof.
pub trait PartialMemory {
    /// Returns the block at `index` if it is available.
    fn get_block(&self, index: usize) -> Option<&Block>;
}

/// The full memory of one job.
pub struct Memory {
    geometry: MemoryGeometry,
    header: Option<[u32; 8]>,
    blocks: Vec<Block>,
}

impl Memory {
    /// Allocates a zeroed store for `config`.
    ///
    /// With `header` set, every computed block is bound to those words and to its
    /// own index (MTP mode); without it the fill is plain Argon2d.
    pub fn new(config: &Config, header: Option<[u32; 8]>) -> Result<Self> {
        config.validate()?;
        let geometry = MemoryGeometry::from_config(config);
        let count = geometry.block_count();

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| PowError::Allocation {
                what: "block store",
                bytes: count.saturating_mul(BLOCK_SIZE),
            })?;
        blocks.resize(count, Block::ZERO);

        Ok(Self {
            geometry,
            header,
            blocks,
        })
    }

    /// Shape of this store.
    pub fn geometry(&self) -> &MemoryGeometry {
        &self.geometry
    }

    /// Header words bound into every block, if any.
    pub fn header(&self) -> Option<&[u32; 8]> {
        self.header.as_ref()
    }

    /// The binding to apply when producing the block at `block_index`.
    #[inline]
    pub fn binding(&self, block_index: usize) -> Option<HeaderBinding<'_>> {
        self.header.as_ref().map(|header| HeaderBinding {
            header,
            block_index: block_index as u64,
        })
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store holds no blocks. Never true for a validated config.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the block at an absolute index.
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// All blocks, lane after lane.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Writes the two seed blocks of every lane from the prehash.
    pub fn write_seeds(&mut self, prehash: &[u8; PREHASH_LENGTH]) {
        for lane in 0..self.geometry.lanes {
            let start = lane * self.geometry.lane_length;
            self.blocks[start] = seed_block(prehash, lane as u32, 0);
            self.blocks[start + 1] = seed_block(prehash, lane as u32, 1);
        }
    }

    /// Replaces the blocks of `range` with a finished segment.
    pub(crate) fn write_segment(&mut self, start: usize, segment: &[Block]) {
        self.blocks[start..start + segment.len()].copy_from_slice(segment);
    }

    /// XORs the last block of every lane and expands the result to the final tag.
    pub fn finalize(&self, tag_length: usize) -> Vec<u8> {
        let lane_length = self.geometry.lane_length;
        let mut accumulator = self.blocks[lane_length - 1];
        for lane in 1..self.geometry.lanes {
            accumulator ^= &self.blocks[lane * lane_length + lane_length - 1];
        }

        let mut tag = vec![0u8; tag_length];
        long_hash(&[&accumulator.to_bytes()], &mut tag);
        tag
    }
}

impl PartialMemory for Memory {
    fn get_block(&self, index: usize) -> Option<&Block> {
        self.get(index)
    }
}

/// Seed block `which` (0 or 1) of `lane`: `H′¹⁰²⁴(H0 || LE32(which) || LE32(lane))`.
pub fn seed_block(prehash: &[u8; PREHASH_LENGTH], lane: u32, which: u32) -> Block {
    let mut bytes = [0u8; BLOCK_SIZE];
    long_hash(
        &[prehash, &which.to_le_bytes(), &lane.to_le_bytes()],
        &mut bytes,
    );
    Block::from_bytes(&bytes)
}

#[cfg(test)]
mod tests;
