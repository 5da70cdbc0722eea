//! Drives the fill over passes, sync points and lanes.
//!
//! Each sync point is one fan-out: every lane's segment becomes a [`SegmentJob`]
//! handed to the backend, and the results are written back before the next sync
//! point starts. A job reads completed blocks straight from the shared store and
//! keeps the segment it is producing local, so no block is ever written while
//! another job can read it.

use tracing::{debug, trace};

use super::{Block, FillPosition, Memory, MemoryGeometry, fill_block, reference_block};
use crate::{
    backend::{ComputeBackend, SegmentJob},
    cancel::CancelToken,
    config::{Config, SYNC_POINTS},
    error::{PowError, Result},
    hash::{PrehashInputs, prehash},
};

/// Progress of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    /// Nothing written yet.
    Uninitialized,
    /// The two seed blocks of every lane are written.
    SeedsWritten,
    /// Working on (or about to start) the given sync point.
    Filling {
        /// Current pass.
        pass: usize,
        /// Current sync point.
        slice: usize,
    },
    /// Every pass is done; the memory can be finalized or committed.
    Complete,
}

/// Runs the fill of one [`Memory`] on a [`ComputeBackend`].
pub struct FillScheduler<'a> {
    config: Config,
    backend: &'a dyn ComputeBackend,
    cancel: Option<&'a CancelToken>,
    state: FillState,
}

impl<'a> FillScheduler<'a> {
    /// Creates a scheduler for memories built from `config`.
    pub fn new(config: Config, backend: &'a dyn ComputeBackend) -> Self {
        Self {
            config,
            backend,
            cancel: None,
            state: FillState::Uninitialized,
        }
    }

    /// Makes the fill observe `cancel` before every sync point.
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Current state.
    pub fn state(&self) -> FillState {
        self.state
    }

    /// Computes the prehash and writes the seed blocks.
    pub fn seed(&mut self, memory: &mut Memory, inputs: &PrehashInputs<'_>) -> Result<()> {
        if self.state != FillState::Uninitialized {
            return Err(PowError::parameter("memory is already seeded"));
        }
        self.check_geometry(memory)?;

        let h0 = prehash(&self.config, inputs);
        memory.write_seeds(&h0);
        self.state = FillState::SeedsWritten;
        Ok(())
    }

    /// Fills every block after the seeds.
    ///
    /// On error (cancellation included) the memory is left partially written and
    /// must be discarded.
    pub fn fill(&mut self, memory: &mut Memory) -> Result<()> {
        if self.state != FillState::SeedsWritten {
            return Err(PowError::parameter(format!(
                "cannot fill from state {:?}",
                self.state
            )));
        }
        self.check_geometry(memory)?;

        let geometry = *memory.geometry();
        for pass in 0..geometry.passes {
            for slice in 0..SYNC_POINTS {
                self.state = FillState::Filling { pass, slice };
                if self.cancel.is_some_and(CancelToken::is_cancelled) {
                    debug!(pass, slice, "fill cancelled");
                    return Err(PowError::Cancelled);
                }

                let jobs: Vec<SegmentJob> = (0..geometry.lanes)
                    .map(|lane| SegmentJob { pass, slice, lane })
                    .collect();

                let shared: &Memory = memory;
                let segments = self
                    .backend
                    .run_parallel(&jobs, &|job: &SegmentJob| fill_segment(shared, job))?;

                if segments.len() != jobs.len() {
                    return Err(PowError::Thread(format!(
                        "{} backend returned {} of {} segments",
                        self.backend.name(),
                        segments.len(),
                        jobs.len()
                    )));
                }

                // barrier: everything from this sync point lands before the next one reads
                for (job, segment) in jobs.iter().zip(segments) {
                    memory.write_segment(job.range(&geometry).start, &segment);
                }
                trace!(pass, slice, "sync point complete");
            }
            debug!(pass, backend = self.backend.name(), "pass complete");
        }

        self.state = FillState::Complete;
        Ok(())
    }

    /// Seeds then fills.
    pub fn run(&mut self, memory: &mut Memory, inputs: &PrehashInputs<'_>) -> Result<()> {
        self.seed(memory, inputs)?;
        self.fill(memory)
    }

    fn check_geometry(&self, memory: &Memory) -> Result<()> {
        self.config.validate()?;
        let expected = MemoryGeometry::from_config(&self.config);
        if *memory.geometry() != expected {
            return Err(PowError::parameter(format!(
                "memory geometry {:?} does not match configuration {expected:?}",
                memory.geometry()
            )));
        }
        Ok(())
    }
}

/// Produces the full contents of one segment.
///
/// Blocks before the segment come from `memory`; blocks of the segment itself come
/// from the local output, which is complete up to the block being produced.
pub(crate) fn fill_segment(memory: &Memory, job: &SegmentJob) -> Vec<Block> {
    let geometry = memory.geometry();
    let blocks = memory.blocks();
    let range = job.range(geometry);
    let segment_start = range.start;

    let mut out: Vec<Block> = Vec::with_capacity(geometry.segment_length);

    // the seeds are not recomputed but still belong to the segment
    let first = if job.pass == 0 && job.slice == 0 { 2 } else { 0 };
    out.extend_from_slice(&blocks[segment_start..segment_start + first]);

    for index in first..geometry.segment_length {
        let position = FillPosition {
            pass: job.pass,
            lane: job.lane,
            slice: job.slice,
            index,
        };
        let current = segment_start + index;

        let prev = if index == 0 {
            &blocks[position.previous(geometry)]
        } else {
            &out[index - 1]
        };

        let reference_index = reference_block(geometry, position, prev.first_word());
        let reference = if range.contains(&reference_index) {
            &out[reference_index - segment_start]
        } else {
            &blocks[reference_index]
        };

        let with_xor = job.pass > 0;
        let mut next = if with_xor { blocks[current] } else { Block::ZERO };
        fill_block(prev, reference, &mut next, with_xor, memory.binding(current));
        out.push(next);
    }

    out
}
