//! This module abstracts the environment parameters required for both the PoW search
//! (solving) and validation (verifying).
//!
//! By using the [`SearchParams`] trait, the search walk can remain agnostic of
//! whether it is operating on a complete memory or on the blocks revealed in a proof.

use crate::{
    challenge_id::ChallengeId,
    config::Config,
    memory::{Memory, PartialMemory, verifier_memory::VerifierMemory},
    merkle_tree::MerkleTree,
};

/// Defines the requirements for parameters used in the PoW search or verification process.
pub trait SearchParams: Copy {
    /// The specific implementation of partial memory access (Full or Sparse).
    type MemoryType: PartialMemory;

    /// Returns the protocol configuration settings.
    fn config(&self) -> &Config;
    /// Returns the challenge of the job being solved or verified.
    fn challenge_id(&self) -> &ChallengeId;
    /// Returns a reference to the memory provider.
    fn memory(&self) -> &Self::MemoryType;
}

/// Immutable search parameters shared by the workers during the solving phase.
///
/// This implementation uses the full [`Memory`] and [`MerkleTree`] structures.
#[derive(Clone, Copy)]
pub struct SolverSearchParams<'a> {
    /// The protocol configuration.
    pub config: &'a Config,
    /// The specific challenge being solved.
    pub challenge_id: &'a ChallengeId,
    /// The full memory dataset.
    pub memory: &'a Memory,
    /// The complete Merkle tree commitment.
    pub merkle_tree: &'a MerkleTree,
}

impl SearchParams for SolverSearchParams<'_> {
    type MemoryType = Memory;

    fn config(&self) -> &Config {
        self.config
    }
    fn challenge_id(&self) -> &ChallengeId {
        self.challenge_id
    }
    fn memory(&self) -> &Self::MemoryType {
        self.memory
    }
}

/// Parameters provided to the verifier to validate a specific proof.
///
/// The memory only holds blocks whose Merkle paths already checked out.
#[derive(Clone, Copy)]
pub struct VerifierSearchParams<'a> {
    /// The protocol configuration used for validation.
    pub config: &'a Config,
    /// The challenge ID associated with the proof.
    pub challenge_id: &'a ChallengeId,
    /// The sparse memory containing only revealed blocks.
    pub memory: &'a VerifierMemory,
}

impl SearchParams for VerifierSearchParams<'_> {
    type MemoryType = VerifierMemory;

    fn config(&self) -> &Config {
        self.config
    }
    fn challenge_id(&self) -> &ChallengeId {
        self.challenge_id
    }
    fn memory(&self) -> &Self::MemoryType {
        self.memory
    }
}
