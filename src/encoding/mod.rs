//! Systematic Reed-Solomon coding over GF(256).
//!
//! Shards are passed as `&mut [Vec<u8>]`, one entry per shard position. The
//! first `data_shards` entries hold data and are never modified by encoding;
//! the rest hold parity. An empty `Vec` marks a missing shard during
//! reconstruction, and its capacity is reused when the shard is regenerated.

use std::mem;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::MAX_TOTAL_SHARDS;
use crate::error::CodingError;
use crate::inversion::InversionTree;
use crate::matrix::{Matrix, build_matrix};
use crate::worker::{Executor, ExecutorOptions};

mod shards;

pub use shards::{Shards, reserve_or_allocate};

/// Erasure coder for a fixed `(data, parity)` layout.
///
/// Immutable after construction apart from its decode-matrix cache, so one
/// instance can serve concurrent calls from many threads.
pub struct ReedSolomon {
    data_shards: usize,
    parity_shards: usize,
    total_shards: usize,

    /// `total × data` generator; the top square is the identity.
    matrix: Matrix,

    /// Bottom `parity` rows of `matrix`, applied by `encode`.
    parity: Vec<Vec<u8>>,

    tree: InversionTree,
    executor: Executor,
}

impl ReedSolomon {
    /// Creates a coder using the detected kernel and default chunking.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, CodingError> {
        Self::with_options(data_shards, parity_shards, ExecutorOptions::default())
    }

    /// Creates a coder with explicit executor options.
    ///
    /// # Errors
    ///
    /// * [`CodingError::InvalidShardCount`] - `data_shards` or `parity_shards` is zero.
    /// * [`CodingError::ShardCountTooLarge`] - more than 256 shards in total.
    pub fn with_options(data_shards: usize, parity_shards: usize, options: ExecutorOptions) -> Result<Self, CodingError> {
        if data_shards == 0 || parity_shards == 0 {
            return Err(CodingError::InvalidShardCount);
        }
        let total_shards = data_shards + parity_shards;
        if total_shards > MAX_TOTAL_SHARDS {
            return Err(CodingError::ShardCountTooLarge { total: total_shards });
        }

        let matrix = build_matrix(data_shards, total_shards)?;
        let parity = (data_shards..total_shards).map(|r| matrix.row(r).to_vec()).collect();
        debug!(data_shards, parity_shards, kernel = %options.kernel, "created reed-solomon coder");

        Ok(Self { data_shards, parity_shards, total_shards, matrix, parity, tree: InversionTree::new(data_shards, parity_shards), executor: Executor::new(options) })
    }

    #[inline]
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    #[inline]
    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    #[inline]
    pub fn total_shards(&self) -> usize {
        self.total_shards
    }

    /// Number of decode matrices computed so far.
    pub fn cached_inversions(&self) -> usize {
        self.tree.len()
    }

    /// Split/join helpers for this layout.
    pub fn shards(&self) -> Shards {
        Shards::new(self.data_shards, self.parity_shards)
    }

    /// Computes every parity shard from the data shards.
    ///
    /// All shards, parity included, must already be allocated to the same
    /// non-zero length. Parity contents are overwritten.
    ///
    /// # Arguments
    /// * `shards` - Data shards followed by parity shards, `total_shards` in all
    ///
    /// # Returns
    /// Nothing; the parity shards hold the new parity on success
    pub fn encode(&self, shards: &mut [Vec<u8>]) -> Result<(), CodingError> {
        self.check_count(shards)?;
        let shard_size = check_shards(shards, false)?;

        let (data, parity) = shards.split_at_mut(self.data_shards);
        let inputs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let rows: Vec<&[u8]> = self.parity.iter().map(Vec::as_slice).collect();
        self.executor.code_shards(&rows, &inputs, parity.iter_mut().map(Vec::as_mut_slice).collect(), shard_size);

        Ok(())
    }

    /// Regenerates every missing shard, data and parity.
    ///
    /// Missing shards are empty `Vec`s; at least `data_shards` entries must be
    /// present. Present shards are left untouched and integrity is not verified.
    ///
    /// # Arguments
    /// * `shards` - All shard positions, with missing ones empty
    ///
    /// # Returns
    /// Nothing; every position holds a full shard on success
    pub fn reconstruct(&self, shards: &mut [Vec<u8>]) -> Result<(), CodingError> {
        self.rebuild(shards, false)
    }

    /// Regenerates missing data shards only. Missing parity stays empty.
    pub fn reconstruct_data(&self, shards: &mut [Vec<u8>]) -> Result<(), CodingError> {
        self.rebuild(shards, true)
    }

    fn rebuild(&self, shards: &mut [Vec<u8>], data_only: bool) -> Result<(), CodingError> {
        self.check_count(shards)?;
        let shard_size = check_shards(shards, true)?;

        let present = shards.iter().filter(|shard| !shard.is_empty()).count();
        let data_present = shards[..self.data_shards].iter().filter(|shard| !shard.is_empty()).count();
        if present == self.total_shards || (data_only && data_present == self.data_shards) {
            return Ok(());
        }
        if present < self.data_shards {
            return Err(CodingError::TooFewShards { needed: self.data_shards, present });
        }

        if data_present < self.data_shards {
            self.rebuild_data(shards, shard_size)?;
        }
        if data_only {
            return Ok(());
        }

        // Data is complete now, so missing parity comes straight from the generator.
        let (data, parity) = shards.split_at_mut(self.data_shards);
        let mut rows = Vec::new();
        let mut outputs = Vec::new();
        for (shard, row) in parity.iter_mut().zip(&self.parity) {
            if shard.is_empty() {
                reserve_or_allocate(shard, shard_size);
                rows.push(row.as_slice());
                outputs.push(shard.as_mut_slice());
            }
        }
        let inputs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        trace!(missing = outputs.len(), shard_size, "regenerating parity shards");
        self.executor.code_shards(&rows, &inputs, outputs, shard_size);

        Ok(())
    }

    fn rebuild_data(&self, shards: &mut [Vec<u8>], shard_size: usize) -> Result<(), CodingError> {
        // The first `data_shards` present shards feed the decode; the key covers every absent index.
        let mut valid = Vec::with_capacity(self.data_shards);
        let mut invalid = Vec::new();
        for (index, shard) in shards.iter().enumerate() {
            if shard.is_empty() {
                invalid.push(index);
            } else if valid.len() < self.data_shards {
                valid.push(index);
            }
        }

        let decode = self.decode_matrix(&valid, &invalid)?;
        let missing: Vec<usize> = invalid.iter().copied().take_while(|&index| index < self.data_shards).collect();

        let mut outputs: Vec<Vec<u8>> = missing
            .iter()
            .map(|&index| {
                let mut shard = mem::take(&mut shards[index]);
                reserve_or_allocate(&mut shard, shard_size);
                shard
            })
            .collect();
        let inputs: Vec<&[u8]> = valid.iter().map(|&index| shards[index].as_slice()).collect();
        let rows: Vec<&[u8]> = missing.iter().map(|&index| decode.row(index)).collect();
        trace!(missing = missing.len(), shard_size, "regenerating data shards");
        self.executor.code_shards(&rows, &inputs, outputs.iter_mut().map(Vec::as_mut_slice).collect(), shard_size);

        for (index, shard) in missing.into_iter().zip(outputs) {
            shards[index] = shard;
        }
        Ok(())
    }

    /// Returns the inverse of the generator rows in `valid`, computing and caching it on a miss.
    fn decode_matrix(&self, valid: &[usize], invalid: &[usize]) -> Result<Arc<Matrix>, CodingError> {
        if let Some(decode) = self.tree.get(invalid) {
            trace!(?invalid, "decode matrix cache hit");
            return Ok(decode);
        }

        let rows: Vec<&[u8]> = valid.iter().map(|&r| self.matrix.row(r)).collect();
        let inverse = Matrix::from_rows(&rows)?.invert()?;
        debug!(?invalid, "inverted decode matrix");
        Ok(self.tree.insert(invalid, inverse))
    }

    fn check_count(&self, shards: &[Vec<u8>]) -> Result<(), CodingError> {
        if shards.len() == self.total_shards {
            Ok(())
        } else {
            Err(CodingError::ShardCountMismatch { expected: self.total_shards, actual: shards.len() })
        }
    }
}

/// Returns the common shard length, treating empty shards as missing when `allow_missing` is set.
fn check_shards(shards: &[Vec<u8>], allow_missing: bool) -> Result<usize, CodingError> {
    let size = shards.iter().map(Vec::len).find(|&len| len != 0).ok_or(CodingError::NoShardData)?;
    for shard in shards {
        if shard.len() != size && (!shard.is_empty() || !allow_missing) {
            return Err(CodingError::ShardSizeMismatch);
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::galois::{Kernel, mul};
    use crate::testing::{combinations, init_tracing, random_bytes, seeded};

    fn encoded(rs: &ReedSolomon, shard_size: usize, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = seeded(seed);
        let mut shards: Vec<Vec<u8>> = (0..rs.total_shards()).map(|_| vec![0u8; shard_size]).collect();
        for shard in &mut shards[..rs.data_shards()] {
            *shard = random_bytes(&mut rng, shard_size);
        }
        rs.encode(&mut shards).unwrap();
        shards
    }

    fn erase(shards: &[Vec<u8>], missing: &[usize]) -> Vec<Vec<u8>> {
        let mut damaged = shards.to_vec();
        for &index in missing {
            damaged[index] = Vec::new();
        }
        damaged
    }

    #[test]
    fn test_encode_is_systematic() {
        init_tracing();
        let rs = ReedSolomon::new(5, 3).unwrap();
        let mut rng = seeded(1);
        let data: Vec<Vec<u8>> = (0..5).map(|_| random_bytes(&mut rng, 300)).collect();
        let mut shards = data.clone();
        shards.extend((0..3).map(|_| vec![0xEEu8; 300]));

        rs.encode(&mut shards).unwrap();
        assert_eq!(&shards[..5], data.as_slice());

        let matrix = build_matrix(5, 8).unwrap();
        for p in 0..3 {
            let expected: Vec<u8> = (0..300).map(|i| (0..5).fold(0, |acc, c| acc ^ mul(matrix.get(5 + p, c), data[c][i]))).collect();
            assert_eq!(shards[5 + p], expected, "parity {p}");
        }
    }

    #[test]
    fn test_reconstruct_every_erasure_pattern() {
        let rs = ReedSolomon::new(4, 3).unwrap();
        let original = encoded(&rs, 100, 2);

        for count in 1..=3 {
            for missing in combinations(7, count) {
                let mut shards = erase(&original, &missing);
                rs.reconstruct(&mut shards).unwrap();
                assert_eq!(shards, original, "missing {missing:?}");
            }
        }
    }

    #[test]
    fn test_reconstruct_data_leaves_parity_missing() {
        let rs = ReedSolomon::new(4, 3).unwrap();
        let original = encoded(&rs, 64, 3);

        for missing in combinations(7, 3) {
            let mut shards = erase(&original, &missing);
            rs.reconstruct_data(&mut shards).unwrap();
            assert_eq!(&shards[..4], &original[..4], "missing {missing:?}");
            for index in 4..7 {
                if missing.contains(&index) {
                    assert!(shards[index].is_empty());
                } else {
                    assert_eq!(shards[index], original[index]);
                }
            }
        }
    }

    #[test]
    fn test_too_few_shards() {
        let rs = ReedSolomon::new(4, 2).unwrap();
        let original = encoded(&rs, 32, 4);
        let mut shards = erase(&original, &[0, 3, 5]);

        assert!(matches!(rs.reconstruct(&mut shards), Err(CodingError::TooFewShards { needed: 4, present: 3 })));
        assert!(matches!(rs.reconstruct_data(&mut shards), Err(CodingError::TooFewShards { needed: 4, present: 3 })));
    }

    #[test]
    fn test_reconstruct_complete_set_is_noop() {
        let rs = ReedSolomon::new(3, 2).unwrap();
        let original = encoded(&rs, 50, 5);
        let mut shards = original.clone();

        rs.reconstruct(&mut shards).unwrap();
        rs.reconstruct(&mut shards).unwrap();
        assert_eq!(shards, original);

        let mut parity_missing = erase(&original, &[3, 4]);
        rs.reconstruct_data(&mut parity_missing).unwrap();
        assert!(parity_missing[3].is_empty() && parity_missing[4].is_empty());
        assert_eq!(rs.cached_inversions(), 0);
    }

    #[test]
    fn test_parity_only_loss_skips_inversion() {
        let rs = ReedSolomon::new(3, 3).unwrap();
        let original = encoded(&rs, 40, 6);
        let mut shards = erase(&original, &[3, 5]);

        rs.reconstruct(&mut shards).unwrap();
        assert_eq!(shards, original);
        assert_eq!(rs.cached_inversions(), 0);
    }

    #[test]
    fn test_reconstruct_reuses_buffers() {
        let rs = ReedSolomon::new(4, 2).unwrap();
        let original = encoded(&rs, 256, 7);
        let mut shards = original.clone();
        shards[1] = Vec::with_capacity(256);
        shards[5] = Vec::with_capacity(256);
        let pointers = (shards[1].as_ptr(), shards[5].as_ptr());

        rs.reconstruct(&mut shards).unwrap();
        assert_eq!(shards, original);
        assert_eq!((shards[1].as_ptr(), shards[5].as_ptr()), pointers);
    }

    #[test]
    fn test_decode_matrix_cache() {
        init_tracing();
        let rs = ReedSolomon::new(5, 3).unwrap();
        let original = encoded(&rs, 128, 8);

        let mut cold = erase(&original, &[0, 2, 6]);
        rs.reconstruct(&mut cold).unwrap();
        assert_eq!(rs.cached_inversions(), 1);

        let mut warm = erase(&original, &[0, 2, 6]);
        rs.reconstruct(&mut warm).unwrap();
        assert_eq!(warm, cold);
        assert_eq!(rs.cached_inversions(), 1);

        // Same valid rows, different key.
        let mut other = erase(&original, &[0, 2, 7]);
        rs.reconstruct(&mut other).unwrap();
        assert_eq!(other, original);
        assert_eq!(rs.cached_inversions(), 2);
    }

    #[test]
    fn test_concurrent_reconstruct() {
        let rs = ReedSolomon::new(6, 4).unwrap();
        let original = encoded(&rs, 4096, 9);
        let patterns = combinations(10, 3);

        thread::scope(|scope| {
            for worker in 0..4 {
                let (rs, original, patterns) = (&rs, &original, &patterns);
                scope.spawn(move || {
                    for missing in patterns.iter().skip(worker).step_by(2) {
                        let mut shards = erase(original, missing);
                        rs.reconstruct(&mut shards).unwrap();
                        assert_eq!(&shards, original, "missing {missing:?}");
                    }
                });
            }
        });

        let with_data_loss = patterns.iter().filter(|missing| missing[0] < 6).count();
        assert_eq!(rs.cached_inversions(), with_data_loss);
    }

    #[test]
    fn test_kernels_agree() {
        let scalar = ReedSolomon::with_options(7, 3, ExecutorOptions { kernel: Kernel::Scalar, ..ExecutorOptions::default() }).unwrap();
        let detected = ReedSolomon::new(7, 3).unwrap();

        let reference = encoded(&scalar, 10_007, 10);
        assert_eq!(encoded(&detected, 10_007, 10), reference);

        let mut shards = erase(&reference, &[1, 4, 8]);
        detected.reconstruct(&mut shards).unwrap();
        assert_eq!(shards, reference);
    }

    #[test]
    fn test_large_shards() {
        let rs = ReedSolomon::new(10, 4).unwrap();
        let original = encoded(&rs, 1 << 18, 11);
        let mut shards = erase(&original, &[0, 5, 9, 12]);
        rs.reconstruct(&mut shards).unwrap();
        assert_eq!(shards, original);
    }

    #[test]
    fn test_split_encode_join() {
        let rs = ReedSolomon::new(4, 2).unwrap();
        let layout = rs.shards();
        let data = random_bytes(&mut seeded(12), 5000);

        let mut shards = vec![Vec::new(); 6];
        layout.split_multi(&data, &mut shards, 64).unwrap();
        rs.encode(&mut shards).unwrap();

        shards[0].clear();
        shards[2].clear();
        rs.reconstruct_data(&mut shards).unwrap();

        let mut out = Vec::new();
        layout.join_multi(&mut out, &shards, 64, 1000, 3000).unwrap();
        assert_eq!(out, &data[1000..4000]);
    }

    #[test]
    fn test_split_then_encode() {
        let rs = ReedSolomon::new(3, 2).unwrap();
        let mut shards = rs.shards().split(b"the quick brown fox");
        rs.encode(&mut shards).unwrap();

        let mut damaged = erase(&shards, &[0, 1]);
        rs.reconstruct(&mut damaged).unwrap();
        assert_eq!(damaged, shards);
        assert_eq!(&damaged[0][..7], b"the qui");
    }

    #[test]
    fn test_shape_errors() {
        let rs = ReedSolomon::new(3, 2).unwrap();

        let mut short = vec![vec![1u8; 4]; 4];
        assert!(matches!(rs.encode(&mut short), Err(CodingError::ShardCountMismatch { expected: 5, actual: 4 })));
        assert!(matches!(rs.reconstruct(&mut short), Err(CodingError::ShardCountMismatch { expected: 5, actual: 4 })));

        let mut ragged = vec![vec![1u8; 4]; 5];
        ragged[2] = vec![1u8; 3];
        assert!(matches!(rs.encode(&mut ragged), Err(CodingError::ShardSizeMismatch)));
        assert!(matches!(rs.reconstruct(&mut ragged), Err(CodingError::ShardSizeMismatch)));

        let mut unallocated_parity = vec![vec![1u8; 4]; 5];
        unallocated_parity[4] = Vec::new();
        assert!(matches!(rs.encode(&mut unallocated_parity), Err(CodingError::ShardSizeMismatch)));

        let mut empty = vec![Vec::new(); 5];
        assert!(matches!(rs.encode(&mut empty), Err(CodingError::NoShardData)));
        assert!(matches!(rs.reconstruct(&mut empty), Err(CodingError::NoShardData)));
    }

    #[test]
    fn test_invalid_shard_counts() {
        assert!(matches!(ReedSolomon::new(0, 2), Err(CodingError::InvalidShardCount)));
        assert!(matches!(ReedSolomon::new(4, 0), Err(CodingError::InvalidShardCount)));
        assert!(matches!(ReedSolomon::new(200, 57), Err(CodingError::ShardCountTooLarge { total: 257 })));

        let widest = ReedSolomon::new(128, 128).unwrap();
        assert_eq!(widest.total_shards(), 256);
        assert_eq!(widest.parity_shards(), 128);
    }
}
