//! Block compression: the BlaMka permutation and the fill step.
//!
//! With no [`HeaderBinding`] this is the Argon2 v1.3 compression function `G`.
//! With a binding, the block position and the job header overwrite fixed words of
//! the mixing state before the permutation, tying every block to its position and
//! to the job it was computed for.

use super::block::{BLOCK_WORDS, Block};

/// Word offset receiving the block index.
pub const INDEX_WORD: usize = 14;

/// First word offset receiving the packed header words.
pub const HEADER_WORD: usize = 16;

/// The job header words and the absolute position of the block being filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBinding<'a> {
    /// Eight 32-bit header words.
    pub header: &'a [u32; 8],
    /// Absolute index of the block being produced.
    pub block_index: u64,
}

impl HeaderBinding<'_> {
    #[inline]
    fn embed(&self, block: &mut Block) {
        // low half in the low 32 bits, high half above
        block.data[INDEX_WORD] = self.block_index;
        for (i, pair) in self.header.chunks_exact(2).enumerate() {
            block.data[HEADER_WORD + i] = pair[0] as u64 | ((pair[1] as u64) << 32);
        }
    }
}

/// `x + y + 2 * lo(x) * lo(y)`, the multiplication-hardened Blake2b addition.
#[inline(always)]
fn blamka(x: u64, y: u64) -> u64 {
    const LOW: u64 = 0xFFFF_FFFF;
    let product = (x & LOW).wrapping_mul(y & LOW);
    x.wrapping_add(y).wrapping_add(product.wrapping_mul(2))
}

#[inline(always)]
fn g(v: &mut [u64; BLOCK_WORDS], a: usize, b: usize, c: usize, d: usize) {
    v[a] = blamka(v[a], v[b]);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = blamka(v[c], v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = blamka(v[a], v[b]);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = blamka(v[c], v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// One Blake2b round without message words over the 16 words at `idx`.
#[inline(always)]
fn round_no_message(v: &mut [u64; BLOCK_WORDS], idx: [usize; 16]) {
    g(v, idx[0], idx[4], idx[8], idx[12]);
    g(v, idx[1], idx[5], idx[9], idx[13]);
    g(v, idx[2], idx[6], idx[10], idx[14]);
    g(v, idx[3], idx[7], idx[11], idx[15]);

    g(v, idx[0], idx[5], idx[10], idx[15]);
    g(v, idx[1], idx[6], idx[11], idx[12]);
    g(v, idx[2], idx[7], idx[8], idx[13]);
    g(v, idx[3], idx[4], idx[9], idx[14]);
}

/// Applies the full permutation: eight rows of 16 words, then eight columns of
/// word pairs.
pub fn permute(block: &mut Block) {
    let v = &mut block.data;

    for row in 0..8 {
        let base = 16 * row;
        round_no_message(v, std::array::from_fn(|k| base + k));
    }

    for column in 0..8 {
        let base = 2 * column;
        round_no_message(v, std::array::from_fn(|k| base + (k / 2) * 16 + (k % 2)));
    }
}

/// Computes one block from its predecessor and its reference block.
///
/// When `with_xor` is set the new value is XOR-accumulated into `next`, which is
/// how passes after the first overwrite memory.
pub fn fill_block(
    prev: &Block,
    reference: &Block,
    next: &mut Block,
    with_xor: bool,
    binding: Option<HeaderBinding<'_>>,
) {
    let mut r = reference ^ prev;
    let mut tmp = r;
    if with_xor {
        tmp ^= &*next;
    }

    if let Some(binding) = binding {
        binding.embed(&mut r);
        binding.embed(&mut tmp);
    }

    permute(&mut r);

    r ^= &tmp;
    *next = r;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(seed: u64) -> Block {
        let mut block = Block::ZERO;
        for (i, word) in block.data.iter_mut().enumerate() {
            *word = (i as u64 ^ seed).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        }
        block
    }

    #[test]
    fn blamka_adds_doubled_low_product() {
        assert_eq!(blamka(1, 2), 1 + 2 + 2 * 2);
        assert_eq!(blamka(1 << 32, 1 << 32), 1 << 33);
        assert_eq!(blamka(u64::MAX, 1), 0u64.wrapping_add(2 * 0xFFFF_FFFF));
    }

    #[test]
    fn column_indices_pair_words_across_rows() {
        let idx: [usize; 16] = std::array::from_fn(|k| 2 + (k / 2) * 16 + (k % 2));
        assert_eq!(
            idx,
            [2, 3, 18, 19, 34, 35, 50, 51, 66, 67, 82, 83, 98, 99, 114, 115]
        );
    }

    #[test]
    fn permutation_of_zero_is_zero() {
        let mut block = Block::ZERO;
        permute(&mut block);
        assert_eq!(block, Block::ZERO);
    }

    #[test]
    fn fill_is_deterministic() {
        let prev = patterned(1);
        let reference = patterned(2);

        let mut a = Block::ZERO;
        let mut b = Block::ZERO;
        fill_block(&prev, &reference, &mut a, false, None);
        fill_block(&prev, &reference, &mut b, false, None);
        assert_eq!(a, b);
        assert_ne!(a, Block::ZERO);
    }

    #[test]
    fn xor_mode_accumulates_over_existing_block() {
        let prev = patterned(3);
        let reference = patterned(4);
        let existing = patterned(5);

        let mut fresh = Block::ZERO;
        fill_block(&prev, &reference, &mut fresh, false, None);

        let mut accumulated = existing;
        fill_block(&prev, &reference, &mut accumulated, true, None);

        assert_eq!(accumulated, &fresh ^ &existing);
    }

    #[test]
    fn binding_changes_output_per_index_and_header() {
        let prev = patterned(6);
        let reference = patterned(7);
        let header = [1u32, 2, 3, 4, 5, 6, 7, 8];
        let other_header = [1u32, 2, 3, 4, 5, 6, 7, 9];

        let fill = |header: &[u32; 8], block_index: u64| {
            let mut out = Block::ZERO;
            fill_block(
                &prev,
                &reference,
                &mut out,
                false,
                Some(HeaderBinding {
                    header,
                    block_index,
                }),
            );
            out
        };

        let base = fill(&header, 10);
        assert_eq!(base, fill(&header, 10));
        assert_ne!(base, fill(&header, 11));
        assert_ne!(base, fill(&other_header, 10));

        let mut unbound = Block::ZERO;
        fill_block(&prev, &reference, &mut unbound, false, None);
        assert_ne!(base, unbound);
    }

    #[test]
    fn binding_layout_is_fixed() {
        let header = [0x11u32, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let mut block = Block::ZERO;
        HeaderBinding {
            header: &header,
            block_index: 0x0000_0001_0000_0002,
        }
        .embed(&mut block);

        assert_eq!(block.data[INDEX_WORD], 0x0000_0001_0000_0002);
        assert_eq!(block.data[HEADER_WORD], 0x0000_0022_0000_0011);
        assert_eq!(block.data[HEADER_WORD + 3], 0x0000_0088_0000_0077);
        assert_eq!(block.data[HEADER_WORD + 4], 0);
    }
}
