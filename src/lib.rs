#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::sync::LazyLock;

pub mod backend;
pub mod cancel;
pub mod challenge_id;
pub mod config;
pub mod driver;
pub mod error;
pub mod hash;
pub mod memory;
pub mod merkle_tree;
pub mod proof;
pub mod target;

pub use backend::{ComputeBackend, SegmentJob, SerialBackend, ThreadedBackend};
pub use cancel::CancelToken;
pub use challenge_id::ChallengeId;
pub use config::Config;
pub use driver::{DriverState, Job, ProofOfWorkDriver, SearchOutcome};
pub use error::{PowError, Result};
pub use memory::{Block, FillScheduler, Memory};
pub use merkle_tree::{MerklePath, MerkleTree};
pub use proof::{Proof, VerificationError};
pub use target::Target;

static NUM_CPUS: LazyLock<usize> = LazyLock::new(|| {
    #[cfg(not(target_family = "wasm"))]
    {
        num_cpus::get()
    }
    #[cfg(target_family = "wasm")]
    {
        1
    }
});
