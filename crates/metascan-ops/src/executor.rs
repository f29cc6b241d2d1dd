//! Dispatch of per-input work units, sequentially or on a bounded worker pool.

use std::fmt;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{OpsError, OpsResult};

/// How input locations are dispatched to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// One input after another on the calling thread.
    #[default]
    Sequential,
    /// A fixed-size pool created for the call and joined before it returns.
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Pool sized to the available hardware parallelism.
    pub fn available_parallelism() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ExecutionStrategy::Parallel { workers }
    }

    /// Number of inputs processed at once.
    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    pub(crate) fn validate(&self) -> OpsResult<()> {
        match self {
            ExecutionStrategy::Parallel { workers: 0 } => Err(OpsError::configuration(
                "parallel executor needs at least one worker",
            )),
            _ => Ok(()),
        }
    }

    /// Apply `work` to every unit and return the results in unit order.
    ///
    /// Under the parallel strategy the pool lives only for this call: every
    /// worker thread is joined before the results are returned.
    pub fn run<I, T, F>(&self, units: &[I], work: F) -> OpsResult<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync,
    {
        match *self {
            ExecutionStrategy::Sequential => Ok(units.iter().map(&work).collect()),
            ExecutionStrategy::Parallel { workers } => {
                self.validate()?;
                debug!(workers, units = units.len(), "Starting worker pool");
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("metascan-worker-{}", i))
                    .build_scoped(
                        |thread| thread.run(),
                        |pool| pool.install(|| units.par_iter().map(|unit| work(unit)).collect()),
                    )
                    .map_err(|err| {
                        OpsError::configuration(format!("failed to start worker pool: {}", err))
                    })
            }
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel { workers } => write!(f, "parallel({})", workers),
        }
    }
}
