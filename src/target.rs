//! The difficulty target a search digest must not exceed.
//!
//! Digests and targets are 256-bit **big-endian** numbers: byte 0 is the most
//! significant. Comparison is inclusive, so a digest equal to the target wins.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::{PowError, Result};

/// Length of a digest or target in bytes.
pub const TARGET_LENGTH: usize = 32;

/// A 256-bit difficulty target.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(#[serde_as(as = "Hex")] pub [u8; TARGET_LENGTH]);

impl Target {
    /// The easiest target: every digest is accepted.
    pub const MAX: Self = Self([0xff; TARGET_LENGTH]);

    /// The hardest target: only the all-zero digest is accepted.
    pub const ZERO: Self = Self([0; TARGET_LENGTH]);

    /// The target accepting exactly the digests with at least `bits` leading zero bits.
    pub fn from_difficulty_bits(bits: usize) -> Result<Self> {
        if bits > TARGET_LENGTH * 8 {
            return Err(PowError::parameter(format!(
                "difficulty cannot exceed {} bits, got {bits}",
                TARGET_LENGTH * 8
            )));
        }

        let mut target = [0xffu8; TARGET_LENGTH];
        let full_bytes = bits / 8;
        target[..full_bytes].fill(0);
        if full_bytes < TARGET_LENGTH {
            target[full_bytes] = 0xff >> (bits % 8);
        }
        Ok(Self(target))
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let mut target = [0u8; TARGET_LENGTH];
        hex::decode_to_slice(encoded, &mut target)
            .map_err(|err| PowError::parameter(format!("invalid target {encoded:?}: {err}")))?;
        Ok(Self(target))
    }

    /// Whether `digest <= self`.
    #[inline]
    pub fn is_met_by(&self, digest: &[u8; TARGET_LENGTH]) -> bool {
        digest <= &self.0
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Number of leading zero bits of a big-endian digest.
pub fn leading_zeros<const N: usize>(array: &[u8; N]) -> usize {
    let mut counter = 0;
    for byte in array {
        if *byte == 0 {
            counter += 8;
        } else {
            counter += byte.leading_zeros() as usize;
            break;
        }
    }
    counter
}
