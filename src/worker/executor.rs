//! Parallel coding execution using Rayon.
//!
//! Applies a set of matrix rows to a set of input shards, producing one output
//! shard per row. The byte range is cut into chunks that run on Rayon's
//! work-stealing thread pool.
//!
//! # Thread Safety
//!
//! Each chunk task owns disjoint `&mut` sub-slices of every output, so the hot
//! loop needs no locking. The call returns only after every chunk finished.

use rayon::prelude::*;
use tracing::trace;

use crate::config::{MAX_CHUNK_TASKS, MIN_SPLIT_SIZE, SPLIT_ALIGNMENT};
use crate::galois::Kernel;

/// Tuning knobs for the executor, fixed when a coder is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Bulk multiplication strategy.
    pub kernel: Kernel,

    /// Maximum number of chunks a single call is split into.
    pub max_tasks: usize,

    /// Smallest chunk, before alignment.
    pub min_split_size: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { kernel: Kernel::detect(), max_tasks: MAX_CHUNK_TASKS, min_split_size: MIN_SPLIT_SIZE }
    }
}

/// Bulk-synchronous fan-out of matrix-row applications over byte chunks.
pub struct Executor {
    options: ExecutorOptions,
}

impl Executor {
    #[inline]
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn kernel(&self) -> Kernel {
        self.options.kernel
    }

    /// Chunk length used for a buffer of `byte_count` bytes.
    ///
    /// A pure function of the length, so results never depend on scheduling.
    pub fn split_size(&self, byte_count: usize) -> usize {
        let size = (byte_count / self.options.max_tasks.max(1)).max(self.options.min_split_size).max(1);
        size.next_multiple_of(SPLIT_ALIGNMENT)
    }

    /// Computes `outputs[r] = Σ rows[r][c] · inputs[c]` over the first `byte_count` bytes.
    ///
    /// How a chunk is processed:
    /// 1. The first input overwrites every output range (no zeroing pass needed)
    /// 2. Every later input is multiplied and XOR-accumulated into it
    ///
    /// # Arguments
    ///
    /// * `rows` - One matrix row per output, each at least `inputs.len()` long.
    /// * `inputs` - Input shards, each at least `byte_count` long.
    /// * `outputs` - Output shards, each at least `byte_count` long.
    /// * `byte_count` - Number of bytes to compute per output.
    pub fn code_shards(&self, rows: &[&[u8]], inputs: &[&[u8]], outputs: Vec<&mut [u8]>, byte_count: usize) {
        debug_assert_eq!(rows.len(), outputs.len(), "one matrix row per output");
        debug_assert!(rows.iter().all(|row| row.len() >= inputs.len()), "matrix rows shorter than input count");

        if outputs.is_empty() || inputs.is_empty() || byte_count == 0 {
            return;
        }

        let split = self.split_size(byte_count);
        let chunk_count = byte_count.div_ceil(split);
        trace!(outputs = outputs.len(), inputs = inputs.len(), byte_count, split, chunk_count, kernel = %self.options.kernel, "coding shards");

        // Transpose outputs × chunks into chunks × outputs so every task owns its ranges.
        let mut chunks: Vec<Vec<&mut [u8]>> = (0..chunk_count).map(|_| Vec::with_capacity(outputs.len())).collect();
        for output in outputs {
            for (chunk, range) in chunks.iter_mut().zip(output[..byte_count].chunks_mut(split)) {
                chunk.push(range);
            }
        }

        let kernel = self.options.kernel;
        chunks.into_par_iter().enumerate().for_each(|(index, mut ranges)| {
            let start = index * split;
            let stop = (start + split).min(byte_count);
            for (c, input) in inputs.iter().enumerate() {
                let input = &input[start..stop];
                for (row, range) in rows.iter().zip(ranges.iter_mut()) {
                    if c == 0 {
                        kernel.mul_slice(row[c], input, range);
                    } else {
                        kernel.mul_slice_xor(row[c], input, range);
                    }
                }
            }
        });
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}
