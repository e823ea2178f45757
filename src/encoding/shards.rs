use std::io::Write;

use crate::error::CodingError;

/// Resizes `shard` to `size` zero bytes, reusing its allocation when it is large enough.
///
/// Callers that pass `Vec::with_capacity(size)` for missing shards get them
/// filled in place without a new allocation.
pub fn reserve_or_allocate(shard: &mut Vec<u8>, size: usize) {
    if shard.capacity() >= size {
        shard.clear();
        shard.resize(size, 0);
    } else {
        *shard = vec![0u8; size];
    }
}

/// Layout helpers that move a byte stream in and out of data shards.
pub struct Shards {
    data_shards: usize,
    total_shards: usize,
}

impl Shards {
    pub fn new(data_shards: usize, parity_shards: usize) -> Self {
        Self { data_shards, total_shards: data_shards + parity_shards }
    }

    /// Cuts `data` into `data_shards` equal, zero-padded shards followed by
    /// zeroed parity slots of the same size.
    pub fn split(&self, data: &[u8]) -> Vec<Vec<u8>> {
        let shard_size = data.len().div_ceil(self.data_shards);
        let mut shards: Vec<Vec<u8>> = (0..self.total_shards).map(|_| vec![0u8; shard_size]).collect();
        if shard_size == 0 {
            return shards;
        }

        for (shard, chunk) in shards.iter_mut().zip(data.chunks(shard_size)) {
            shard[..chunk.len()].copy_from_slice(chunk);
        }

        shards
    }

    /// Stripes `data` across the data shards, `subsize` bytes per shard at a time.
    ///
    /// Every shard in `shards` is resized to `ceil(len / (data_shards · subsize)) · subsize`
    /// bytes, reusing existing allocations where the capacity allows. Bytes past
    /// the end of `data` are zero.
    pub fn split_multi(&self, data: &[u8], shards: &mut [Vec<u8>], subsize: usize) -> Result<(), CodingError> {
        if subsize == 0 {
            return Err(CodingError::ZeroBlockSize);
        }
        if shards.len() < self.data_shards {
            return Err(CodingError::TooFewShards { needed: self.data_shards, present: shards.len() });
        }

        let stripe = self.data_shards * subsize;
        let shard_size = data.len().div_ceil(stripe) * subsize;
        for shard in shards.iter_mut() {
            reserve_or_allocate(shard, shard_size);
        }

        // Block `b` of the stream lands in shard `b % data_shards` at offset `(b / data_shards) · subsize`.
        for (index, block) in data.chunks(subsize).enumerate() {
            let offset = (index / self.data_shards) * subsize;
            shards[index % self.data_shards][offset..offset + block.len()].copy_from_slice(block);
        }

        Ok(())
    }

    /// Reverses [`Shards::split_multi`]: writes `write_len` bytes of the striped
    /// stream to `dst`, starting `skip` bytes in.
    ///
    /// Only the first `data_shards` entries of `shards` are read; parity is ignored.
    pub fn join_multi<W: Write>(&self, mut dst: W, shards: &[Vec<u8>], subsize: usize, skip: usize, write_len: usize) -> Result<(), CodingError> {
        if subsize == 0 {
            return Err(CodingError::ZeroBlockSize);
        }
        let Some(shards) = shards.get(..self.data_shards) else {
            return Err(CodingError::TooFewShards { needed: self.data_shards, present: shards.len() });
        };
        if shards.iter().any(Vec::is_empty) {
            return Err(CodingError::ReconstructRequired);
        }

        let available: usize = shards.iter().map(Vec::len).sum();
        if available < skip.saturating_add(write_len) {
            return Err(CodingError::ShortData);
        }
        let longest = shards.iter().map(Vec::len).max().unwrap_or(0);

        let (mut skip, mut remaining) = (skip, write_len);
        let mut offset = 0;
        while remaining > 0 {
            if offset >= longest {
                return Err(CodingError::ShortData);
            }
            for shard in shards {
                let block = shard.get(offset..).unwrap_or_default();
                let block = &block[..subsize.min(block.len())];
                if skip >= block.len() {
                    skip -= block.len();
                    continue;
                }

                let block = &block[skip..];
                skip = 0;
                let block = &block[..remaining.min(block.len())];
                dst.write_all(block)?;
                remaining -= block.len();
                if remaining == 0 {
                    break;
                }
            }
            offset += subsize;
        }

        Ok(())
    }
}
