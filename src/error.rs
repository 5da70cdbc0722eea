//! Errors raised while preparing memory or searching for a proof.
//!
//! Every variant is fatal for the job it was raised on. The driver tears down the
//! job's memory and Merkle tree before surfacing it, so the next job always starts
//! from a clean slate.

/// Failure modes of the memory-hard core and of the search driver.
#[derive(Debug, thiserror::Error)]
pub enum PowError {
    /// The block store (or the Merkle tree over it) could not be allocated.
    #[error("could not allocate {bytes} bytes for {what}")]
    Allocation {
        /// Human readable name of the structure being allocated.
        what: &'static str,
        /// Number of bytes requested.
        bytes: usize,
    },

    /// A worker thread could not be spawned or did not finish cleanly.
    #[error("worker thread failure: {0}")]
    Thread(String),

    /// The configuration cannot describe a valid memory layout.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// The job was superseded before the work completed.
    #[error("job cancelled")]
    Cancelled,
}

impl PowError {
    /// Shorthand for building a [`PowError::Parameter`].
    pub(crate) fn parameter(message: impl Into<String>) -> Self {
        PowError::Parameter(message.into())
    }
}

/// Convenience result type for the crate.
pub type Result<T> = std::result::Result<T, PowError>;
