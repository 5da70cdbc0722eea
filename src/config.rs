//! This module defines the core **configuration parameters** of the memory-hard
//! proof-of-work.
//!
//! The `Config` struct holds every tunable that changes the memory layout, the
//! Merkle commitment or the search. Prover and verifier must agree on all of them,
//! which is why the struct is serialisable and embedded in the CLI as-is.

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{PowError, Result};

/// Number of sync points (segments) per lane and pass. Fixed by Argon2.
pub const SYNC_POINTS: usize = 4;

/// Smallest allowed Merkle node width in bytes.
pub const MIN_NODE_SIZE: usize = 8;

/// Largest allowed Merkle node width in bytes (one Blake2b output).
pub const MAX_NODE_SIZE: usize = 64;

/// # Configuration Parameters
///
/// Holds the parameters of the Argon2d memory fill, of the Merkle commitment and
/// of the nonce search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Args)]
pub struct Config {
    /// Number of lanes (independent fill streams)
    #[arg(long, default_value_t = 4)]
    pub lanes: u32,
    /// Requested memory in 1 KiB blocks. Rounded down to a multiple of `4 * lanes`
    #[arg(long, default_value_t = 1 << 16)]
    pub memory_cost: u32,
    /// Number of passes over memory
    #[arg(long, default_value_t = 1)]
    pub passes: u32,
    /// Length in bytes of the Argon2 tag produced by `finalize`
    #[arg(long, default_value_t = 32)]
    pub tag_length: u32,
    /// Width in bytes of Merkle tree nodes
    #[arg(long, default_value_t = 16)]
    pub merkle_node_size: usize,
    /// Number of blocks visited per nonce
    #[arg(long, default_value_t = 70)]
    pub search_length: usize,
    /// Leading zero bits required in the search digest when no explicit target is given
    #[arg(long, default_value_t = 16)]
    pub difficulty_bits: usize,
    /// Number of worker threads
    #[arg(long, default_value_t = num_cpus::get())]
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lanes: 4,
            memory_cost: 1 << 16,
            passes: 1,
            tag_length: 32,
            merkle_node_size: 16,
            search_length: 70,
            difficulty_bits: 16,
            jobs: *crate::NUM_CPUS,
        }
    }
}

impl Config {
    /// Rejects configurations that cannot describe a memory layout, a tree or a search.
    ///
    /// Nothing is allocated before this check passes.
    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 {
            return Err(PowError::parameter("lanes must be at least 1"));
        }
        if self.lanes > 0x00ff_ffff {
            return Err(PowError::parameter(format!(
                "lanes must not exceed {}, got {}",
                0x00ff_ffff, self.lanes
            )));
        }
        let floor = 2 * SYNC_POINTS as u64 * self.lanes as u64;
        if (self.memory_cost as u64) < floor {
            return Err(PowError::parameter(format!(
                "memory cost {} is below the floor of {floor} blocks for {} lanes",
                self.memory_cost, self.lanes
            )));
        }
        if self.passes == 0 {
            return Err(PowError::parameter("passes must be at least 1"));
        }
        if self.tag_length < 4 {
            return Err(PowError::parameter(format!(
                "tag length must be at least 4 bytes, got {}",
                self.tag_length
            )));
        }
        if !(MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&self.merkle_node_size) {
            return Err(PowError::parameter(format!(
                "merkle node size must be within {MIN_NODE_SIZE}..={MAX_NODE_SIZE}, got {}",
                self.merkle_node_size
            )));
        }
        if self.search_length == 0 {
            return Err(PowError::parameter("search length must be at least 1"));
        }
        if self.difficulty_bits > 256 {
            return Err(PowError::parameter(format!(
                "difficulty cannot exceed 256 bits, got {}",
                self.difficulty_bits
            )));
        }
        Ok(())
    }

    /// Like [`Config::validate`], additionally requiring a single pass.
    ///
    /// A proof re-derives each selected block from its revealed antecedents. With
    /// more passes those antecedents are overwritten, so the fill could not be
    /// checked at all.
    pub fn validate_for_proof(&self) -> Result<()> {
        self.validate()?;
        if self.passes != 1 {
            return Err(PowError::parameter(format!(
                "proofs require exactly one pass, got {}",
                self.passes
            )));
        }
        Ok(())
    }

    /// Blocks per segment after rounding the memory cost down.
    pub fn segment_length(&self) -> usize {
        self.memory_cost as usize / (SYNC_POINTS * self.lanes as usize)
    }

    /// Blocks per lane after rounding the memory cost down.
    pub fn lane_length(&self) -> usize {
        self.segment_length() * SYNC_POINTS
    }

    /// Total number of blocks actually allocated.
    pub fn block_count(&self) -> usize {
        self.lane_length() * self.lanes as usize
    }
}
