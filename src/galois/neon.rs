use std::arch::aarch64::{vandq_u8, vdupq_n_u8, veorq_u8, vld1q_u8, vqtbl1q_u8, vshrq_n_u8, vst1q_u8};

use super::NibbleTables;

/// Processes the longest 16-byte multiple prefix and returns its length.
///
/// # Safety
///
/// The CPU must support NEON and both slices must have equal length.
#[target_feature(enable = "neon")]
pub(super) unsafe fn mul_neon(tables: &NibbleTables, input: &[u8], output: &mut [u8], xor: bool) -> usize {
    let len = input.len() & !15;
    unsafe {
        let low = vld1q_u8(tables.low.as_ptr());
        let high = vld1q_u8(tables.high.as_ptr());
        let mask = vdupq_n_u8(0x0f);

        for offset in (0..len).step_by(16) {
            let src = vld1q_u8(input.as_ptr().add(offset));
            let lo = vandq_u8(src, mask);
            let hi = vshrq_n_u8::<4>(src);
            let mut product = veorq_u8(vqtbl1q_u8(low, lo), vqtbl1q_u8(high, hi));

            let dst = output.as_mut_ptr().add(offset);
            if xor {
                product = veorq_u8(product, vld1q_u8(dst));
            }
            vst1q_u8(dst, product);
        }
    }
    len
}
