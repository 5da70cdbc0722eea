//! This module implements the [`Proof::search`] function.
//!
//! The solving process is a multi-threaded search over a batch of nonces for one
//! whose search walk over the committed memory ends at or below the job target.

use std::{ops::Range, sync::OnceLock, thread};

use blake3::Hasher;
use bytes::Bytes;
use tracing::{debug, info};

use crate::{
    cancel::CancelToken,
    error::{PowError, Result},
    memory::reference_block,
    proof::{BlockOpening, Proof, StepOpening, search_params::SolverSearchParams},
    target::{TARGET_LENGTH, Target},
};

impl Proof {
    /// Searches `nonces` on up to `config.jobs` threads. The end of the range is
    /// exclusive.
    ///
    /// Returns the first proof any worker finds, or `None` once the batch is
    /// exhausted. Only single-pass configurations can be proven; others fail with
    /// [`PowError::Parameter`]. A raised `cancel` flag stops the workers between nonces and
    /// yields [`PowError::Cancelled`] unless a proof was already found.
    pub fn search(
        params: SolverSearchParams<'_>,
        target: &Target,
        nonces: Range<u32>,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<Self>> {
        params.config.validate_for_proof()?;
        let root = params.merkle_tree.root();
        let proof_slot = OnceLock::new();
        let total = nonces.len();
        if total == 0 {
            return Ok(None);
        }

        let threads = params.config.jobs.clamp(1, total);
        debug!(?nonces, threads, "searching nonce batch");

        if threads == 1 {
            Self::search_worker(&params, root, target, nonces, &proof_slot, cancel);
        } else {
            let chunk = total.div_ceil(threads) as u64;
            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(threads);
                for worker in 0..threads as u64 {
                    let start = nonces.start as u64 + worker * chunk;
                    let end = (start + chunk).min(nonces.end as u64);
                    if start >= end {
                        break;
                    }
                    let range = start as u32..end as u32;
                    let proof_slot = &proof_slot;
                    let params = &params;

                    let handle = thread::Builder::new()
                        .name(format!("search-{worker}"))
                        .spawn_scoped(scope, move || {
                            Self::search_worker(params, root, target, range, proof_slot, cancel)
                        })
                        .map_err(|err| {
                            PowError::Thread(format!("could not spawn search worker: {err}"))
                        })?;
                    handles.push(handle);
                }

                let mut panicked = false;
                for handle in handles {
                    panicked |= handle.join().is_err();
                }
                if panicked {
                    return Err(PowError::Thread("search worker panicked".to_string()));
                }
                Ok(())
            })?;
        }

        match proof_slot.into_inner() {
            Some(proof) => Ok(Some(proof)),
            None if cancel.is_some_and(CancelToken::is_cancelled) => Err(PowError::Cancelled),
            None => Ok(None),
        }
    }

    /// The core worker function for nonce searching within a specific range.
    fn search_worker(
        params: &SolverSearchParams<'_>,
        root: &[u8],
        target: &Target,
        nonces: Range<u32>,
        proof_slot: &OnceLock<Proof>,
        cancel: Option<&CancelToken>,
    ) {
        let mut hasher = Hasher::new();
        let mut selected_blocks = Vec::with_capacity(params.config.search_length);

        for nonce in nonces {
            if proof_slot.get().is_some() || cancel.is_some_and(CancelToken::is_cancelled) {
                return;
            }

            let Some(digest) =
                Self::calculate_digest(params, root, &mut hasher, &mut selected_blocks, nonce)
            else {
                continue;
            };

            if !target.is_met_by(&digest) {
                continue;
            }

            if let Some(proof) = Self::assemble(params, nonce, digest, &selected_blocks) {
                info!(nonce, digest = %hex::encode(digest), "found proof");
                proof_slot.set(proof).ok();
            }
            return;
        }
    }

    /// Opens every selected block and the blocks it was compressed from.
    fn assemble(
        params: &SolverSearchParams<'_>,
        nonce: u32,
        digest: [u8; TARGET_LENGTH],
        selected_blocks: &[usize],
    ) -> Option<Self> {
        let memory = params.memory;
        let merkle_tree = params.merkle_tree;
        let geometry = memory.geometry();

        let openings = selected_blocks
            .iter()
            .map(|&index| {
                let selected = BlockOpening::open(memory, merkle_tree, index)?;
                if geometry.is_seed(index) {
                    return Some(StepOpening {
                        selected,
                        previous: None,
                        reference: None,
                    });
                }

                // a computed block chains from its in-lane predecessor
                let previous_index = index - 1;
                let previous_block = memory.get(previous_index)?;
                let reference_index = reference_block(
                    geometry,
                    geometry.locate(index),
                    previous_block.first_word(),
                );

                Some(StepOpening {
                    selected,
                    previous: Some(BlockOpening::open(memory, merkle_tree, previous_index)?),
                    reference: Some(BlockOpening::open(memory, merkle_tree, reference_index)?),
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Proof {
            nonce,
            root: Bytes::copy_from_slice(merkle_tree.root()),
            digest,
            openings,
        })
    }
}
