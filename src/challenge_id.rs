//! This module defines the challenge identifier derived from a job's block header.

use blake2::{Blake2b, Digest, digest::consts::U32};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

type Blake2b256 = Blake2b<U32>;

/// Length of a challenge identifier in bytes.
pub const CHALLENGE_LENGTH: usize = 32;

/// The 32-byte digest of a block header.
///
/// Its eight little-endian words are bound into every computed memory block, and
/// the bytes personalise the Merkle tree and the search hashes. Memory filled for
/// one header is therefore useless for any other.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeId {
    /// The digest bytes.
    #[serde_as(as = "Base64")]
    pub bytes: [u8; CHALLENGE_LENGTH],
}

impl ChallengeId {
    /// Derives the challenge of `header`.
    pub fn from_header(header: &[u8]) -> Self {
        Self {
            bytes: Blake2b256::digest(header).into(),
        }
    }

    /// The eight header words bound into memory blocks.
    pub fn header_words(&self) -> [u32; 8] {
        std::array::from_fn(|i| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&self.bytes[4 * i..4 * i + 4]);
            u32::from_le_bytes(word)
        })
    }
}
