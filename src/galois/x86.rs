use std::arch::x86_64::{
    __m128i, __m256i, _mm_and_si128, _mm_loadu_si128, _mm_set1_epi8, _mm_shuffle_epi8, _mm_srli_epi64, _mm_storeu_si128, _mm_xor_si128, _mm256_and_si256,
    _mm256_broadcastsi128_si256, _mm256_loadu_si256, _mm256_set1_epi8, _mm256_shuffle_epi8, _mm256_srli_epi64, _mm256_storeu_si256, _mm256_xor_si256,
};

use super::NibbleTables;

/// Processes the longest 16-byte multiple prefix and returns its length.
///
/// # Safety
///
/// The CPU must support SSSE3 and both slices must have equal length.
#[target_feature(enable = "ssse3")]
pub(super) unsafe fn mul_ssse3(tables: &NibbleTables, input: &[u8], output: &mut [u8], xor: bool) -> usize {
    let len = input.len() & !15;
    unsafe {
        let low = _mm_loadu_si128(tables.low.as_ptr().cast());
        let high = _mm_loadu_si128(tables.high.as_ptr().cast());
        let mask = _mm_set1_epi8(0x0f);

        for offset in (0..len).step_by(16) {
            let src = _mm_loadu_si128(input.as_ptr().add(offset).cast());
            let lo = _mm_and_si128(src, mask);
            let hi = _mm_and_si128(_mm_srli_epi64::<4>(src), mask);
            let mut product = _mm_xor_si128(_mm_shuffle_epi8(low, lo), _mm_shuffle_epi8(high, hi));

            let dst = output.as_mut_ptr().add(offset).cast::<__m128i>();
            if xor {
                product = _mm_xor_si128(product, _mm_loadu_si128(dst));
            }
            _mm_storeu_si128(dst, product);
        }
    }
    len
}

/// Processes the longest 32-byte multiple prefix and returns its length.
///
/// # Safety
///
/// The CPU must support AVX2 and both slices must have equal length.
#[target_feature(enable = "avx2")]
pub(super) unsafe fn mul_avx2(tables: &NibbleTables, input: &[u8], output: &mut [u8], xor: bool) -> usize {
    let len = input.len() & !31;
    unsafe {
        // vpshufb looks up within each 128-bit lane, so both lanes get a copy.
        let low = _mm256_broadcastsi128_si256(_mm_loadu_si128(tables.low.as_ptr().cast()));
        let high = _mm256_broadcastsi128_si256(_mm_loadu_si128(tables.high.as_ptr().cast()));
        let mask = _mm256_set1_epi8(0x0f);

        for offset in (0..len).step_by(32) {
            let src = _mm256_loadu_si256(input.as_ptr().add(offset).cast());
            let lo = _mm256_and_si256(src, mask);
            let hi = _mm256_and_si256(_mm256_srli_epi64::<4>(src), mask);
            let mut product = _mm256_xor_si256(_mm256_shuffle_epi8(low, lo), _mm256_shuffle_epi8(high, hi));

            let dst = output.as_mut_ptr().add(offset).cast::<__m256i>();
            if xor {
                product = _mm256_xor_si256(product, _mm256_loadu_si256(dst));
            }
            _mm256_storeu_si256(dst, product);
        }
    }
    len
}
