//! This module implements the Merkle Tree used to commit to the memory contents.
//!
//! The tree lets a prover show that specific blocks were part of the filled memory
//! without shipping the memory itself. Every hash is personalised with the job's
//! challenge so a tree can never be reused across jobs.
//!
//! Layout and conventions:
//! - leaves are `H(block bytes || challenge)`, parents `H(left || right || challenge)`,
//!   where `H` is Blake2b truncated to the configured node size;
//! - levels are stored one after the other in a single flat byte vector, leaves first;
//! - when a level has an odd number of nodes, its last node is paired with itself.

use std::{collections::BTreeSet, ops::Range, thread};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::{
    challenge_id::ChallengeId,
    config::{Config, MAX_NODE_SIZE, MIN_NODE_SIZE},
    error::{PowError, Result},
    hash::blake2b_var,
    memory::{Block, Memory},
};

/// A Merkle Tree over every block of a [`Memory`].
pub struct MerkleTree {
    /// The size of each node in bytes.
    node_size: usize,
    leaf_count: usize,
    /// Node index range of every level, leaves first, root last.
    levels: Vec<Range<usize>>,
    /// Flat storage for all tree nodes.
    nodes: Vec<u8>,
}

/// The sibling hashes linking one leaf to the root, bottom-up.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// One sibling per level below the root.
    #[serde_as(as = "Vec<Base64>")]
    pub siblings: Vec<Bytes>,
}

/// Number of levels above the leaves for a tree of `leaf_count` leaves.
pub fn tree_depth(leaf_count: usize) -> usize {
    let mut width = leaf_count;
    let mut depth = 0;
    while width > 1 {
        width = width.div_ceil(2);
        depth += 1;
    }
    depth
}

impl MerkleTree {
    /// Computes the hash for a leaf node (a memory block).
    pub fn compute_leaf_hash(challenge_id: &ChallengeId, block: &Block, output: &mut [u8]) {
        blake2b_var(&[&block.to_bytes(), &challenge_id.bytes], output);
    }

    /// Computes the hash of an intermediate node from its children.
    pub fn compute_intermediate_hash(
        challenge_id: &ChallengeId,
        left: &[u8],
        right: &[u8],
        output: &mut [u8],
    ) {
        blake2b_var(&[left, right, &challenge_id.bytes], output);
    }

    /// Builds the tree over every block of `memory`.
    ///
    /// Leaves are hashed on up to `config.jobs` threads; the levels above are cheap
    /// and computed on the calling thread.
    pub fn build(config: &Config, challenge_id: &ChallengeId, memory: &Memory) -> Result<Self> {
        config.validate()?;
        Self::from_blocks(
            config.merkle_node_size,
            challenge_id,
            memory.blocks(),
            config.jobs,
        )
    }

    /// Builds the tree over an arbitrary run of blocks.
    pub(crate) fn from_blocks(
        node_size: usize,
        challenge_id: &ChallengeId,
        blocks: &[Block],
        jobs: usize,
    ) -> Result<Self> {
        if !(MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&node_size) {
            return Err(PowError::parameter(format!(
                "node size must be within {MIN_NODE_SIZE}..={MAX_NODE_SIZE} bytes, got {node_size}"
            )));
        }
        let leaf_count = blocks.len();
        if leaf_count == 0 {
            return Err(PowError::parameter("cannot commit to an empty memory"));
        }

        let mut levels = Vec::with_capacity(tree_depth(leaf_count) + 1);
        let mut start = 0;
        let mut width = leaf_count;
        loop {
            levels.push(start..start + width);
            start += width;
            if width == 1 {
                break;
            }
            width = width.div_ceil(2);
        }

        let total_bytes = start.saturating_mul(node_size);
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(total_bytes)
            .map_err(|_| PowError::Allocation {
                what: "merkle tree",
                bytes: total_bytes,
            })?;
        nodes.resize(total_bytes, 0);

        let mut tree = Self {
            node_size,
            leaf_count,
            levels,
            nodes,
        };
        tree.compute_leaf_hashes(challenge_id, blocks, jobs)?;
        tree.compute_intermediate_nodes(challenge_id);
        Ok(tree)
    }

    /// Populates the leaf level by hashing every block.
    fn compute_leaf_hashes(
        &mut self,
        challenge_id: &ChallengeId,
        blocks: &[Block],
        jobs: usize,
    ) -> Result<()> {
        let node_size = self.node_size;
        let leaves = &mut self.nodes[..self.leaf_count * node_size];
        let per_thread = self.leaf_count.div_ceil(jobs.max(1));

        thread::scope(|scope| {
            let mut handles = Vec::new();
            for (worker, (leaf_chunk, block_chunk)) in leaves
                .chunks_mut(per_thread * node_size)
                .zip(blocks.chunks(per_thread))
                .enumerate()
            {
                let handle = thread::Builder::new()
                    .name(format!("leaves-{worker}"))
                    .spawn_scoped(scope, move || {
                        let outputs = leaf_chunk.chunks_exact_mut(node_size);
                        for (output, block) in outputs.zip(block_chunk) {
                            Self::compute_leaf_hash(challenge_id, block, output);
                        }
                    })
                    .map_err(|err| {
                        PowError::Thread(format!("could not spawn leaf worker {worker}: {err}"))
                    })?;
                handles.push(handle);
            }

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                return Err(PowError::Thread("leaf worker panicked".to_string()));
            }
            Ok(())
        })
    }

    /// Computes every level above the leaves, bottom-up.
    fn compute_intermediate_nodes(&mut self, challenge_id: &ChallengeId) {
        let node_size = self.node_size;
        for level in 1..self.levels.len() {
            let children = self.levels[level - 1].clone();
            let parents = self.levels[level].clone();

            // children always precede their parents in the flat storage
            let (lower, upper) = self.nodes.split_at_mut(parents.start * node_size);
            let child_width = children.len();
            for (offset, parent) in upper[..parents.len() * node_size]
                .chunks_exact_mut(node_size)
                .enumerate()
            {
                let left = 2 * offset;
                let right = (left + 1).min(child_width - 1);
                let left = &lower[(children.start + left) * node_size..][..node_size];
                let right = &lower[(children.start + right) * node_size..][..node_size];
                Self::compute_intermediate_hash(challenge_id, left, right, parent);
            }
        }
    }

    /// Width of every node in bytes.
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Number of leaves (memory blocks).
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Retrieves the node at `index` within `level` (0 = leaves).
    pub fn get_node(&self, level: usize, index: usize) -> Option<&[u8]> {
        let range = self.levels.get(level)?;
        if index >= range.len() {
            return None;
        }
        let start = (range.start + index) * self.node_size;
        self.nodes.get(start..start + self.node_size)
    }

    /// The commitment to the whole memory.
    pub fn root(&self) -> &[u8] {
        let root = self.levels[self.levels.len() - 1].start * self.node_size;
        &self.nodes[root..root + self.node_size]
    }

    /// Builds the authentication path of one leaf.
    pub fn open(&self, leaf_index: usize) -> Option<MerklePath> {
        if leaf_index >= self.leaf_count {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.levels.len() - 1);
        let mut index = leaf_index;
        for (level, range) in self.levels[..self.levels.len() - 1].iter().enumerate() {
            let sibling = if index % 2 == 0 {
                (index + 1).min(range.len() - 1)
            } else {
                index - 1
            };
            siblings.push(Bytes::copy_from_slice(self.get_node(level, sibling)?));
            index /= 2;
        }
        Some(MerklePath { siblings })
    }

    /// Opens every requested leaf, in ascending order.
    pub fn get_proof(&self, leaf_indices: &BTreeSet<u32>) -> Vec<(u32, MerklePath)> {
        leaf_indices
            .iter()
            .filter_map(|&leaf| Some((leaf, self.open(leaf as usize)?)))
            .collect()
    }
}

impl MerklePath {
    /// Recomputes the root from `block` and this path and compares it with `root`.
    ///
    /// Fails on any structural mismatch: a node size outside the supported range,
    /// wrong depth, wrong node width, or a duplicated last node whose sibling is
    /// not itself.
    pub fn verify(
        &self,
        challenge_id: &ChallengeId,
        node_size: usize,
        leaf_count: usize,
        leaf_index: usize,
        block: &Block,
        root: &[u8],
    ) -> bool {
        if !(MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&node_size) {
            return false;
        }
        if leaf_index >= leaf_count || self.siblings.len() != tree_depth(leaf_count) {
            return false;
        }

        let mut current = vec![0u8; node_size];
        MerkleTree::compute_leaf_hash(challenge_id, block, &mut current);

        let mut parent = vec![0u8; node_size];
        let mut index = leaf_index;
        let mut width = leaf_count;
        for sibling in &self.siblings {
            if sibling.len() != node_size {
                return false;
            }
            if index % 2 == 0 {
                if index + 1 == width && sibling.as_ref() != current.as_slice() {
                    return false;
                }
                MerkleTree::compute_intermediate_hash(challenge_id, &current, sibling, &mut parent);
            } else {
                MerkleTree::compute_intermediate_hash(challenge_id, sibling, &current, &mut parent);
            }
            std::mem::swap(&mut current, &mut parent);
            index /= 2;
            width = width.div_ceil(2);
        }

        current.as_slice() == root
    }
}
