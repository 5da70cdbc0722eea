//! The 1 KiB memory block and its word-wise operations.

use std::ops::{BitXor, BitXorAssign};

/// Size of a block in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Number of 64-bit words in a block.
pub const BLOCK_WORDS: usize = BLOCK_SIZE / 8;

/// A fixed-size unit of working memory: 128 words, serialised little-endian.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// The block contents as 64-bit words.
    pub data: [u64; BLOCK_WORDS],
}

impl Block {
    /// The all-zero block.
    pub const ZERO: Self = Self {
        data: [0; BLOCK_WORDS],
    };

    /// Decodes a block from exactly [`BLOCK_SIZE`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8; BLOCK_SIZE]) -> Self {
        let mut block = Self::ZERO;
        for (word, chunk) in block.data.iter_mut().zip(bytes.chunks_exact(8)) {
            *word = u64::from_le_bytes(chunk.try_into().expect("chunks_exact yields 8 bytes"));
        }
        block
    }

    /// Decodes a block from a slice, returning `None` unless it is exactly one block long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; BLOCK_SIZE] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    /// Encodes the block as little-endian bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut bytes = [0u8; BLOCK_SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(self.data.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// First word of the block; the pseudo-random input of index-alpha in Argon2d.
    #[inline]
    pub fn first_word(&self) -> u64 {
        self.data[0]
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block({:016x}..{:016x})", self.data[0], self.data[BLOCK_WORDS - 1])
    }
}

impl BitXorAssign<&Self> for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: &Self) {
        for (lhs, rhs) in self.data.iter_mut().zip(rhs.data.iter()) {
            *lhs ^= rhs;
        }
    }
}

impl BitXor<&Block> for &Block {
    type Output = Block;

    #[inline]
    fn bitxor(self, rhs: &Block) -> Block {
        let mut out = *self;
        out ^= rhs;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(multiplier: u64) -> Block {
        let mut block = Block::ZERO;
        for (i, word) in block.data.iter_mut().enumerate() {
            *word = (i as u64 + 1).wrapping_mul(multiplier);
        }
        block
    }

    #[test]
    fn xor_of_identical_blocks_is_zero() {
        let block = patterned(0x1234_5678_ABCD_EF01);
        assert_eq!(&block ^ &block, Block::ZERO);
    }

    #[test]
    fn xor_matches_scalar_xor() {
        let a = patterned(0xFFEE_DDCC_BBAA_9988);
        let b = patterned(0x1122_3344_5566_7788);

        let xored = &a ^ &b;
        for i in 0..BLOCK_WORDS {
            assert_eq!(xored.data[i], a.data[i] ^ b.data[i]);
        }
    }

    #[test]
    fn bytes_are_little_endian_words() {
        let block = patterned(0x0102_0304_0506_0708);
        let bytes = block.to_bytes();
        assert_eq!(&bytes[..8], &block.data[0].to_le_bytes());
        assert_eq!(&bytes[BLOCK_SIZE - 8..], &block.data[BLOCK_WORDS - 1].to_le_bytes());
        assert_eq!(Block::from_bytes(&bytes), block);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Block::from_slice(&[0u8; BLOCK_SIZE - 1]).is_none());
        assert!(Block::from_slice(&[0u8; BLOCK_SIZE + 1]).is_none());
        assert_eq!(Block::from_slice(&[0u8; BLOCK_SIZE]), Some(Block::ZERO));
    }
}
