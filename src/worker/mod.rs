//! Parallel execution of coding work.
//!
//! Coding never blocks, so it runs on Rayon's pool rather than on dedicated
//! threads. See [`Executor`] for how a call is partitioned.

mod executor;

pub use executor::{Executor, ExecutorOptions};
