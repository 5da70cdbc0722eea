//! This module implements the [`Proof::verify`] function.
//!
//! Verification allows us to confirm a proof's validity using only the blocks
//! revealed in it and their Merkle paths, without filling any memory.

use blake3::Hasher;
use tracing::debug;

use crate::{
    challenge_id::ChallengeId,
    config::Config,
    hash::{PrehashInputs, prehash},
    memory::{
        Block, HeaderBinding, MemoryGeometry, PartialMemory, fill_block, reference_block,
        seed_block, verifier_memory::VerifierMemory,
    },
    proof::{BlockOpening, Proof, error::VerificationError, search_params::VerifierSearchParams},
    target::Target,
};

impl Proof {
    /// Validates the proof for the job with `header` and `target`.
    ///
    /// Returns `Ok(())` if every revealed block belongs to the committed memory,
    /// the search walk over them selects exactly the revealed blocks and ends at the
    /// carried digest, that digest meets the target, and every selected block
    /// recomputes from its revealed antecedents. Configurations with more than one
    /// pass are rejected with [`VerificationError::Config`].
    pub fn verify(
        &self,
        config: &Config,
        header: &[u8],
        target: &Target,
    ) -> Result<(), VerificationError> {
        config.validate_for_proof()?;
        if self.openings.len() != config.search_length {
            return Err(VerificationError::StepCountMismatch {
                expected: config.search_length,
                actual: self.openings.len(),
            });
        }
        if self.root.len() != config.merkle_node_size {
            return Err(VerificationError::MalformedRoot(self.root.len()));
        }

        let challenge_id = ChallengeId::from_header(header);

        // Step 1: check every revealed block against the root
        let mut partial_memory = VerifierMemory::default();
        for step in &self.openings {
            let revealed = [
                Some(&step.selected),
                step.previous.as_ref(),
                step.reference.as_ref(),
            ];
            for opening in revealed.into_iter().flatten() {
                let block = self.check_opening(config, &challenge_id, opening)?;
                partial_memory.insert(opening.index as usize, block);
            }
        }

        // Step 2: replay the search walk on the revealed blocks
        let mut hasher = Hasher::new();
        let mut selected_blocks = Vec::with_capacity(config.search_length);
        let digest = Self::calculate_digest(
            &VerifierSearchParams {
                config,
                challenge_id: &challenge_id,
                memory: &partial_memory,
            },
            &self.root,
            &mut hasher,
            &mut selected_blocks,
            self.nonce,
        )
        .ok_or(VerificationError::UnprovenBlockInPath)?;

        let walk = selected_blocks.iter().zip(self.selected_indices());
        for (step, (&expected, actual)) in walk.enumerate() {
            if expected != actual as usize {
                return Err(VerificationError::SelectionMismatch {
                    step,
                    expected,
                    actual,
                });
            }
        }

        if digest != self.digest {
            return Err(VerificationError::DigestMismatch);
        }
        if !target.is_met_by(&digest) {
            return Err(VerificationError::DifficultyNotMet);
        }

        // Step 3: recompute the selected blocks from their antecedents
        self.check_derivations(config, header, &challenge_id, &partial_memory)?;

        debug!(nonce = self.nonce, "proof verified");
        Ok(())
    }

    /// Decodes a revealed block and checks its Merkle path.
    fn check_opening(
        &self,
        config: &Config,
        challenge_id: &ChallengeId,
        opening: &BlockOpening,
    ) -> Result<Block, VerificationError> {
        let leaf_count = config.block_count();
        if opening.index as usize >= leaf_count {
            return Err(VerificationError::IndexOutOfRange(opening.index));
        }
        let block = opening
            .decode_block()
            .ok_or(VerificationError::MalformedBlock(opening.index))?;

        if !opening.path.verify(
            challenge_id,
            config.merkle_node_size,
            leaf_count,
            opening.index as usize,
            &block,
            &self.root,
        ) {
            return Err(VerificationError::PathMismatch(opening.index));
        }
        Ok(block)
    }

    /// Recomputes every selected block.
    ///
    /// Seed blocks come straight from the prehash; computed blocks are compressed
    /// again from their revealed previous and reference blocks, whose positions
    /// must be the ones the fill would have used.
    fn check_derivations(
        &self,
        config: &Config,
        header: &[u8],
        challenge_id: &ChallengeId,
        partial_memory: &VerifierMemory,
    ) -> Result<(), VerificationError> {
        let geometry = MemoryGeometry::from_config(config);
        let h0 = prehash(config, &PrehashInputs::for_header(header));
        let header_words = challenge_id.header_words();

        for step in &self.openings {
            let index = step.selected.index;
            let position = index as usize;
            let block = partial_memory
                .get_block(position)
                .ok_or(VerificationError::UnprovenBlockInPath)?;

            let expected = if geometry.is_seed(position) {
                let lane = position / geometry.lane_length;
                let which = position % geometry.lane_length;
                seed_block(&h0, lane as u32, which as u32)
            } else {
                let (Some(previous), Some(reference)) = (&step.previous, &step.reference) else {
                    return Err(VerificationError::MissingAntecedent(index));
                };
                let previous_block = partial_memory
                    .get_block(previous.index as usize)
                    .ok_or(VerificationError::MissingAntecedent(index))?;
                let reference_index = reference_block(
                    &geometry,
                    geometry.locate(position),
                    previous_block.first_word(),
                );
                if previous.index as usize != position - 1
                    || reference.index as usize != reference_index
                {
                    return Err(VerificationError::AntecedentMismatch(index));
                }
                let reference_contents = partial_memory
                    .get_block(reference_index)
                    .ok_or(VerificationError::MissingAntecedent(index))?;

                let mut next = Block::ZERO;
                fill_block(
                    previous_block,
                    reference_contents,
                    &mut next,
                    false,
                    Some(HeaderBinding {
                        header: &header_words,
                        block_index: position as u64,
                    }),
                );
                next
            };

            if *block != expected {
                return Err(VerificationError::DerivationMismatch(index));
            }
        }
        Ok(())
    }
}
