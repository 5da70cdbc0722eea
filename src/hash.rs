//! Blake2b building blocks used by the memory fill.
//!
//! The permutation inside the block compression is bespoke (see
//! [`crate::memory::compress`]); everything else is plain Blake2b from the `blake2`
//! crate: a fixed 64-byte digest, a variable-width digest, the Argon2 variable-length
//! expansion H′ and the initial prehash H0.

use blake2::{
    Blake2b512, Blake2bVar, Digest,
    digest::{Update, VariableOutput},
};

use crate::config::Config;

/// Argon2 version implemented here (1.3).
pub const ARGON2_VERSION: u32 = 0x13;

/// Argon2 primitive type for Argon2d.
pub const ARGON2D_TYPE: u32 = 0;

/// Width of a full Blake2b digest.
pub const BLAKE2B_OUTBYTES: usize = 64;

/// Width of the prehash H0.
pub const PREHASH_LENGTH: usize = BLAKE2B_OUTBYTES;

/// Computes a Blake2b digest of `out.len()` bytes (1..=64) over the concatenation of `parts`.
pub fn blake2b_var(parts: &[&[u8]], out: &mut [u8]) {
    let mut hasher =
        Blake2bVar::new(out.len()).expect("blake2b output width is validated by the caller");
    for part in parts {
        hasher.update(part);
    }
    hasher
        .finalize_variable(out)
        .expect("output buffer matches the hasher width");
}

/// Computes a 64-byte Blake2b digest over the concatenation of `parts`.
pub fn blake2b_512(parts: &[&[u8]]) -> [u8; BLAKE2B_OUTBYTES] {
    let mut hasher = Blake2b512::new();
    for part in parts {
        Digest::update(&mut hasher, part);
    }
    hasher.finalize().into()
}

/// Variable-length hash H′ ("blake2b-long").
///
/// Outputs of at most 64 bytes are a single Blake2b call over `LE32(len) || input`.
/// Longer outputs chain full digests and keep the first half of each, finishing
/// with one digest sized to the remainder.
pub fn long_hash(parts: &[&[u8]], out: &mut [u8]) {
    let out_len = out.len() as u32;
    let len_prefix = out_len.to_le_bytes();

    if out.len() <= BLAKE2B_OUTBYTES {
        let mut input: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        input.push(&len_prefix);
        input.extend_from_slice(parts);
        blake2b_var(&input, out);
        return;
    }

    const HALF: usize = BLAKE2B_OUTBYTES / 2;

    let mut input: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
    input.push(&len_prefix);
    input.extend_from_slice(parts);
    let mut v = blake2b_512(&input);
    out[..HALF].copy_from_slice(&v[..HALF]);

    let mut written = HALF;
    while out.len() - written > BLAKE2B_OUTBYTES {
        v = blake2b_512(&[&v]);
        out[written..written + HALF].copy_from_slice(&v[..HALF]);
        written += HALF;
    }

    let remaining = out.len() - written;
    let mut tail = [0u8; BLAKE2B_OUTBYTES];
    blake2b_var(&[&v], &mut tail[..remaining]);
    out[written..].copy_from_slice(&tail[..remaining]);
}

/// The variable inputs of the prehash H0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrehashInputs<'a> {
    /// Password (P). For mining this is the job header.
    pub password: &'a [u8],
    /// Salt (S).
    pub salt: &'a [u8],
    /// Optional secret key (K).
    pub secret: &'a [u8],
    /// Optional associated data (X).
    pub associated_data: &'a [u8],
}

impl<'a> PrehashInputs<'a> {
    /// Inputs used for a mining job: the header serves as both password and salt.
    pub fn for_header(header: &'a [u8]) -> Self {
        Self {
            password: header,
            salt: header,
            ..Self::default()
        }
    }
}

/// Computes H0 from the configuration and the variable inputs.
///
/// Note that the memory cost hashed here is the requested one, not the value
/// rounded down to whole segments.
pub fn prehash(config: &Config, inputs: &PrehashInputs<'_>) -> [u8; PREHASH_LENGTH] {
    let lanes = config.lanes.to_le_bytes();
    let tag_length = config.tag_length.to_le_bytes();
    let memory_cost = config.memory_cost.to_le_bytes();
    let passes = config.passes.to_le_bytes();
    let version = ARGON2_VERSION.to_le_bytes();
    let kind = ARGON2D_TYPE.to_le_bytes();
    let password_len = (inputs.password.len() as u32).to_le_bytes();
    let salt_len = (inputs.salt.len() as u32).to_le_bytes();
    let secret_len = (inputs.secret.len() as u32).to_le_bytes();
    let data_len = (inputs.associated_data.len() as u32).to_le_bytes();

    blake2b_512(&[
        &lanes,
        &tag_length,
        &memory_cost,
        &passes,
        &version,
        &kind,
        &password_len,
        inputs.password,
        &salt_len,
        inputs.salt,
        &secret_len,
        inputs.secret,
        &data_len,
        inputs.associated_data,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_long_hash_is_prefixed_blake2b() {
        let mut expected = [0u8; 32];
        blake2b_var(&[&32u32.to_le_bytes(), b"abc"], &mut expected);

        let mut out = [0u8; 32];
        long_hash(&[b"abc"], &mut out);
        assert_eq!(out, expected);
    }

    #[test]
    fn long_hash_chains_half_digests() {
        let mut out = [0u8; 100];
        long_hash(&[b"abc"], &mut out);

        let v1 = blake2b_512(&[&100u32.to_le_bytes(), b"abc"]);
        assert_eq!(&out[..32], &v1[..32]);

        // 100 bytes: one chained digest (32 bytes) then a 36 byte tail
        let v2 = blake2b_512(&[&v1]);
        assert_eq!(&out[32..64], &v2[..32]);

        let mut tail = [0u8; 36];
        blake2b_var(&[&v2], &mut tail);
        assert_eq!(&out[64..], &tail);
    }

    #[test]
    fn long_hash_depends_on_length() {
        let mut short = [0u8; 64];
        let mut long = [0u8; 65];
        long_hash(&[b"abc"], &mut short);
        long_hash(&[b"abc"], &mut long);
        assert_ne!(&short[..32], &long[..32]);
    }

    #[test]
    fn split_parts_hash_like_concatenation() {
        let joined = blake2b_512(&[b"hello world"]);
        let split = blake2b_512(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, split);
    }
}
