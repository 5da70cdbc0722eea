//! Compute backends that execute segment fills.
//!
//! The scheduler hands a backend one job per lane for the current sync point and
//! blocks until every job has produced its segment. Backends only decide *where*
//! jobs run; the result of a fill never depends on the backend used.

use std::{ops::Range, thread};

use crate::{
    error::{PowError, Result},
    memory::{Block, MemoryGeometry},
};

/// One lane's segment for one sync point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentJob {
    /// Pass number.
    pub pass: usize,
    /// Sync point, `0..4`.
    pub slice: usize,
    /// Lane to fill.
    pub lane: usize,
}

impl SegmentJob {
    /// Absolute block range covered by this job.
    pub fn range(&self, geometry: &MemoryGeometry) -> Range<usize> {
        let start = geometry.segment_start(self.lane, self.slice);
        start..start + geometry.segment_length
    }
}

/// The work a backend runs for each job: produce the full contents of its segment.
pub type SegmentTask<'a> = dyn Fn(&SegmentJob) -> Vec<Block> + Sync + 'a;

/// Something able to run a batch of independent segment jobs.
pub trait ComputeBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs `task` once per job and returns the outputs in job order.
    ///
    /// Must not return before every job has finished or failed.
    fn run_parallel(&self, jobs: &[SegmentJob], task: &SegmentTask<'_>) -> Result<Vec<Vec<Block>>>;
}

/// Runs every job on the calling thread, in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn run_parallel(&self, jobs: &[SegmentJob], task: &SegmentTask<'_>) -> Result<Vec<Vec<Block>>> {
        Ok(jobs.iter().map(|job| task(job)).collect())
    }
}

/// Runs jobs on scoped worker threads, at most one per job and never more than
/// `threads` at a time.
#[derive(Debug, Clone, Copy)]
pub struct ThreadedBackend {
    threads: usize,
}

impl ThreadedBackend {
    /// Creates a backend using up to `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Maximum number of concurrent workers.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for ThreadedBackend {
    fn default() -> Self {
        Self::new(*crate::NUM_CPUS)
    }
}

impl ComputeBackend for ThreadedBackend {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn run_parallel(&self, jobs: &[SegmentJob], task: &SegmentTask<'_>) -> Result<Vec<Vec<Block>>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        if self.threads == 1 || jobs.len() == 1 {
            return SerialBackend.run_parallel(jobs, task);
        }

        let workers = self.threads.min(jobs.len());
        // contiguous batches whose sizes differ by at most one
        let (base, extra) = (jobs.len() / workers, jobs.len() % workers);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            let mut failure = None;

            let mut start = 0;
            for worker in 0..workers {
                let end = start + base + usize::from(worker < extra);
                let batch = &jobs[start..end];
                start = end;
                let spawned = thread::Builder::new()
                    .name(format!("fill-{worker}"))
                    .spawn_scoped(scope, move || {
                        batch.iter().map(|job| task(job)).collect::<Vec<_>>()
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        failure = Some(PowError::Thread(format!(
                            "could not spawn fill worker {worker}: {err}"
                        )));
                        break;
                    }
                }
            }

            // every spawned worker is joined, even after a failure
            let mut outputs = Vec::with_capacity(jobs.len());
            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(batch) => outputs.extend(batch),
                    Err(_) => {
                        failure.get_or_insert_with(|| {
                            PowError::Thread(format!("fill worker {worker} panicked"))
                        });
                    }
                }
            }

            match failure {
                Some(err) => Err(err),
                None => Ok(outputs),
            }
        })
    }
}
