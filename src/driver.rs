//! The job lifecycle: load a header, prepare memory once, search nonce batches.
//!
//! ```text
//! Idle -> HeaderLoaded -> MemoryFilled -> Searching -> Found | Exhausted
//! ```
//!
//! The filled memory and its Merkle tree are cached per job and reused across
//! nonce batches. Loading a different job drops them; every load clears the
//! cancel flag. Any failure while preparing or searching drops them too, so the
//! next attempt always starts from a clean slate.
//!
//! `Found` and `Exhausted` report the last batch and keep the cache. The next
//! `load_job` or batch moves the driver on.

use std::ops::Range;

use tracing::{debug, info, warn};

use crate::{
    backend::{ComputeBackend, ThreadedBackend},
    cancel::CancelToken,
    challenge_id::ChallengeId,
    config::Config,
    error::{PowError, Result},
    hash::PrehashInputs,
    memory::{FillScheduler, Memory},
    merkle_tree::MerkleTree,
    proof::{Proof, SolverSearchParams, VerificationError},
    target::Target,
};

/// Work handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Opaque identifier; a new identifier means new work.
    pub id: String,
    /// The block header the memory is bound to.
    pub header: Vec<u8>,
    /// Digests at or below this value win.
    pub target: Target,
}

/// Where the driver is in the lifecycle of its current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No job loaded.
    Idle,
    /// A job is loaded but its memory is not ready.
    HeaderLoaded,
    /// Memory and Merkle tree are ready for searching.
    MemoryFilled,
    /// A nonce batch is being searched.
    Searching,
    /// The last batch produced a proof.
    Found,
    /// The last batch ended without a proof.
    Exhausted,
}

/// Result of searching one nonce batch.
#[derive(Debug)]
pub enum SearchOutcome {
    /// A nonce met the target.
    Found(Proof),
    /// No nonce of the batch met the target.
    Exhausted,
}

/// Memory and commitment of the current job.
struct Prepared {
    challenge_id: ChallengeId,
    memory: Memory,
    merkle_tree: MerkleTree,
}

/// Runs jobs end to end on a compute backend.
pub struct ProofOfWorkDriver {
    config: Config,
    backend: Box<dyn ComputeBackend>,
    cancel: CancelToken,
    state: DriverState,
    job: Option<Job>,
    prepared: Option<Prepared>,
}

impl ProofOfWorkDriver {
    /// Creates a driver filling memory on `config.jobs` threads.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_backend(config, Box::new(ThreadedBackend::new(config.jobs)))
    }

    /// Creates a driver filling memory on the given backend.
    ///
    /// Only single-pass configurations can be proven, so any other pass count is
    /// rejected here.
    pub fn with_backend(config: Config, backend: Box<dyn ComputeBackend>) -> Result<Self> {
        config.validate_for_proof()?;
        Ok(Self {
            config,
            backend,
            cancel: CancelToken::new(),
            state: DriverState::Idle,
            job: None,
            prepared: None,
        })
    }

    /// The configuration every job runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The job currently loaded.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// A handle that cancels the current fill or search from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether memory for the current job is cached.
    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Root of the current job's Merkle tree, once prepared.
    pub fn root(&self) -> Option<&[u8]> {
        self.prepared.as_ref().map(|p| p.merkle_tree.root())
    }

    /// Loads `job`.
    ///
    /// The same id with the same header keeps the cached memory and only takes
    /// the new target. Anything else is new work and drops the cache. Either way
    /// the cancel flag is cleared, so a cancelled job can be loaded again.
    pub fn load_job(&mut self, job: Job) {
        let same_work = self
            .job
            .as_ref()
            .is_some_and(|current| current.id == job.id && current.header == job.header);

        if same_work {
            debug!(job = %job.id, target = %job.target, "refreshed job target");
        } else {
            info!(job = %job.id, header_len = job.header.len(), "loaded job");
            self.prepared = None;
        }
        self.cancel.reset();

        self.job = Some(job);
        self.state = if self.prepared.is_some() {
            DriverState::MemoryFilled
        } else {
            DriverState::HeaderLoaded
        };
    }

    /// Fills the memory and builds the Merkle tree of the current job, unless
    /// they are already cached.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        let Some(job) = &self.job else {
            return Err(PowError::parameter("no job loaded"));
        };

        match Self::build(&self.config, self.backend.as_ref(), &self.cancel, job) {
            Ok(prepared) => {
                info!(
                    job = %job.id,
                    root = %hex::encode(prepared.merkle_tree.root()),
                    "memory prepared"
                );
                self.prepared = Some(prepared);
                self.state = DriverState::MemoryFilled;
                Ok(())
            }
            Err(err) => {
                warn!(job = %job.id, %err, "could not prepare memory");
                self.teardown();
                Err(err)
            }
        }
    }

    fn build(
        config: &Config,
        backend: &dyn ComputeBackend,
        cancel: &CancelToken,
        job: &Job,
    ) -> Result<Prepared> {
        let challenge_id = ChallengeId::from_header(&job.header);
        let mut memory = Memory::new(config, Some(challenge_id.header_words()))?;

        debug!(
            backend = backend.name(),
            blocks = memory.len(),
            "filling memory"
        );
        FillScheduler::new(*config, backend)
            .with_cancel(cancel)
            .run(&mut memory, &PrehashInputs::for_header(&job.header))?;

        let merkle_tree = MerkleTree::build(config, &challenge_id, &memory)?;
        Ok(Prepared {
            challenge_id,
            memory,
            merkle_tree,
        })
    }

    /// Searches `nonces` for the current job, preparing memory first if needed.
    ///
    /// The end of the range is exclusive, so nonce `u32::MAX` is never tried.
    pub fn search(&mut self, nonces: Range<u32>) -> Result<SearchOutcome> {
        self.prepare()?;
        self.state = DriverState::Searching;

        let result = match (&self.job, &self.prepared) {
            (Some(job), Some(prepared)) => Proof::search(
                SolverSearchParams {
                    config: &self.config,
                    challenge_id: &prepared.challenge_id,
                    memory: &prepared.memory,
                    merkle_tree: &prepared.merkle_tree,
                },
                &job.target,
                nonces.clone(),
                Some(&self.cancel),
            ),
            _ => Err(PowError::parameter("no job loaded")),
        };

        match result {
            Ok(Some(proof)) => {
                self.state = DriverState::Found;
                Ok(SearchOutcome::Found(proof))
            }
            Ok(None) => {
                debug!(?nonces, "nonce batch exhausted");
                self.state = DriverState::Exhausted;
                Ok(SearchOutcome::Exhausted)
            }
            Err(err) => {
                warn!(%err, "search aborted");
                self.teardown();
                Err(err)
            }
        }
    }

    /// Checks `proof` against the current job.
    pub fn verify(&self, proof: &Proof) -> std::result::Result<(), VerificationError> {
        let job = self
            .job
            .as_ref()
            .ok_or_else(|| PowError::parameter("no job loaded"))?;
        proof.verify(&self.config, &job.header, &job.target)
    }

    /// Drops the cached memory; the job itself stays loaded.
    fn teardown(&mut self) {
        self.prepared = None;
        self.state = if self.job.is_some() {
            DriverState::HeaderLoaded
        } else {
            DriverState::Idle
        };
    }
}
