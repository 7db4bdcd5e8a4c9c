//! Fixed-size worker pool for independent, side-effect-free tasks.
//!
//! Work is fanned out over a dedicated rayon pool and collected behind a
//! single barrier. Results come back in submission order, a failing task
//! fails the whole collection and a panicking task re-raises the panic on
//! the caller, so no result can silently go missing.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ThreadPoolBuildError: {0}")]
    Build(#[from] ThreadPoolBuildError),
}

/// Number of hardware threads, falling back to one.
pub fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

#[derive(Debug)]
pub struct Pool {
    pool: ThreadPool,
    num_threads: usize,
}

impl Pool {
    /// Pool sized to the available hardware parallelism.
    pub fn new() -> Result<Self, Error> {
        Self::with_threads(available_threads())
    }

    pub fn with_threads(num_threads: usize) -> Result<Self, Error> {
        let num_threads = num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("cache-placement-worker-{index}"))
            .build()?;

        tracing::debug!(num_threads, "Started worker pool");

        Ok(Self { pool, num_threads })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Runs `f(index, task)` for every task and collects the results in
    /// submission order.
    #[instrument(level = "debug", skip(self, tasks, f), fields(num_tasks = tasks.len(), num_threads = self.num_threads))]
    pub fn run<T, R, E, F>(&self, tasks: Vec<T>, f: F) -> Result<Vec<R>, E>
    where
        T: Send,
        R: Send,
        E: Send,
        F: Fn(usize, T) -> Result<R, E> + Sync + Send,
    {
        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .map(|(index, task)| f(index, task))
                .collect()
        })
    }

    /// Runs `op` inside the pool, so nested rayon work uses its threads.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }
}
