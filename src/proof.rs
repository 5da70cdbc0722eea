//! This module defines the [`Proof`] object.
//!
//! A proof carries the winning nonce, the Merkle root the search was run against,
//! the resulting digest and, for every step of the search walk, the opened block
//! with its Merkle path. When the memory was filled in a single pass, each
//! computed block also comes with the two blocks it was compressed from, so a
//! verifier can recompute it instead of trusting the prover.

use std::fmt::{Display, Formatter};

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use blake3::Hasher;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, hex::Hex, serde_as};

use crate::{
    memory::{Block, Memory, PartialMemory},
    merkle_tree::{MerklePath, MerkleTree},
    target::TARGET_LENGTH,
};

pub mod error;
pub mod search_params;
mod solve;
mod verify;

pub use error::VerificationError;
pub use search_params::{SearchParams, SolverSearchParams, VerifierSearchParams};

/// One revealed memory block together with its authentication path.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOpening {
    /// Absolute block index.
    pub index: u32,
    /// The 1024 block bytes.
    #[serde_as(as = "Base64")]
    pub block: Bytes,
    /// Siblings from the leaf up to the root.
    pub path: MerklePath,
}

impl BlockOpening {
    /// Reveals the block at `index`.
    pub(crate) fn open(memory: &Memory, merkle_tree: &MerkleTree, index: usize) -> Option<Self> {
        let block = memory.get(index)?;
        Some(Self {
            index: u32::try_from(index).ok()?,
            block: Bytes::copy_from_slice(&block.to_bytes()),
            path: merkle_tree.open(index)?,
        })
    }

    /// Decodes the revealed bytes, if they have the size of a block.
    pub fn decode_block(&self) -> Option<Block> {
        Block::from_slice(&self.block)
    }
}

/// The blocks revealed for one step of the search walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOpening {
    /// The block the step selected.
    pub selected: BlockOpening,
    /// The block the selected one chains from. Absent for seed blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<BlockOpening>,
    /// The reference block mixed into the selected one. Absent for seed blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<BlockOpening>,
}

/// A solution to one job.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The winning nonce.
    pub nonce: u32,
    /// Root of the Merkle tree over the filled memory.
    #[serde_as(as = "Base64")]
    pub root: Bytes,
    /// The final value of the search walk; does not exceed the job target.
    #[serde_as(as = "Hex")]
    pub digest: [u8; TARGET_LENGTH],
    /// One entry per search step, in order.
    pub openings: Vec<StepOpening>,
}

impl Display for Proof {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "(proof")?;
        writeln!(f, "  (nonce {})", self.nonce)?;
        writeln!(f, "  (root \"{}\")", BASE64_URL_SAFE_NO_PAD.encode(&self.root))?;
        writeln!(f, "  (digest \"{}\")", hex::encode(self.digest))?;

        writeln!(f, "  (openings")?;
        for (step, opening) in self.openings.iter().enumerate() {
            write!(f, "    ({step} (selected {})", opening.selected.index)?;
            if let Some(previous) = &opening.previous {
                write!(f, " (previous {})", previous.index)?;
            }
            if let Some(reference) = &opening.reference {
                write!(f, " (reference {})", reference.index)?;
            }
            writeln!(f, ")")?;
        }
        writeln!(f, "  )")?;

        write!(f, ")")
    }
}

impl Proof {
    /// Walks the memory for one nonce and returns the final digest.
    ///
    /// `Y0 = blake3(challenge || root || LE32(nonce))`, then for every step the
    /// first eight bytes of the previous value select a block and
    /// `Y = blake3(Y || block)`. The selected indices are left in `selected_blocks`.
    ///
    /// Returns `None` when the walk reaches a block `params` does not hold, which
    /// only happens on partial (verifier) memory.
    pub(crate) fn calculate_digest<P: SearchParams>(
        params: &P,
        root: &[u8],
        hasher: &mut Hasher,
        selected_blocks: &mut Vec<usize>,
        nonce: u32,
    ) -> Option<[u8; TARGET_LENGTH]> {
        let block_count = params.config().block_count() as u64;
        selected_blocks.clear();

        hasher.reset();
        hasher.update(&params.challenge_id().bytes);
        hasher.update(root);
        hasher.update(&nonce.to_le_bytes());
        let mut current: [u8; TARGET_LENGTH] = hasher.finalize().into();

        for _ in 0..params.config().search_length {
            let seed = u64::from_le_bytes(std::array::from_fn(|i| current[i]));
            let index = (seed % block_count) as usize;
            selected_blocks.push(index);

            let block = params.memory().get_block(index)?;
            hasher.reset();
            hasher.update(&current);
            hasher.update(&block.to_bytes());
            current = hasher.finalize().into();
        }

        Some(current)
    }

    /// The block indices selected by the search walk, in step order.
    pub fn selected_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.openings.iter().map(|opening| opening.selected.index)
    }
}
