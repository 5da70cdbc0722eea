//! This module defines errors that can occur during proof verification.

use crate::error::PowError;

/// Specific errors that can occur during proof verification.
///
/// These errors cover all structural, cryptographic, and consistency
/// failures that can arise when validating a proof.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The configuration the proof is checked against is itself invalid.
    #[error("invalid verification parameters: {0}")]
    Config(#[from] PowError),

    /// The proof does not contain one opening per search step.
    #[error("expected {expected} search steps, proof has {actual}")]
    StepCountMismatch {
        /// Configured search length.
        expected: usize,
        /// Number of openings in the proof.
        actual: usize,
    },

    /// The Merkle root does not have the configured node size.
    #[error("Merkle root has {0} bytes")]
    MalformedRoot(usize),

    /// A revealed block index lies outside the memory.
    #[error("block index {0} is out of range")]
    IndexOutOfRange(u32),

    /// The revealed bytes of a block are not exactly one block long.
    #[error("revealed block {0} has the wrong size")]
    MalformedBlock(u32),

    /// A Merkle path does not lead from the revealed block to the root.
    #[error("Merkle path for block {0} does not match the root")]
    PathMismatch(u32),

    /// During digest recomputation, the walk reached a block that was not revealed.
    #[error("search walk reached a block not provided in the proof")]
    UnprovenBlockInPath,

    /// The recomputed walk selected another block than the one opened for a step.
    #[error("step {step} selects block {expected}, proof opens block {actual}")]
    SelectionMismatch {
        /// Step number.
        step: usize,
        /// Block index the walk selects.
        expected: usize,
        /// Block index opened in the proof.
        actual: u32,
    },

    /// The recomputed digest differs from the one carried by the proof.
    #[error("recomputed digest does not match the proof")]
    DigestMismatch,

    /// The digest exceeds the job target.
    #[error("proof digest does not meet the target")]
    DifficultyNotMet,

    /// A computed block was revealed without the blocks it derives from.
    #[error("block {0} is revealed without its previous and reference blocks")]
    MissingAntecedent(u32),

    /// The previous or reference block revealed for a block is not the right one.
    #[error("wrong previous or reference block revealed for block {0}")]
    AntecedentMismatch(u32),

    /// A revealed block is not what the memory fill would have produced.
    #[error("block {0} was not produced by the memory fill")]
    DerivationMismatch(u32),
}
