use std::sync::OnceLock;

use strum::IntoEnumIterator;

use super::{MUL_TABLE, NibbleTables};

/// Implementation strategy for bulk multiplication of a slice by a constant.
///
/// Variants are ordered from narrowest to widest; [`Kernel::detect`] picks the
/// last one the running CPU supports. Asking an unsupported kernel to do work
/// is not an error: it silently runs the scalar path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Kernel {
    /// Table lookup, one byte at a time.
    Scalar,

    /// 16-byte `pshufb` nibble lookups.
    Ssse3,

    /// 32-byte `vpshufb` nibble lookups.
    Avx2,

    /// 16-byte `tbl` nibble lookups.
    Neon,
}

impl Kernel {
    /// Widest kernel supported by this CPU, detected once per process.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<Kernel> = OnceLock::new();
        *DETECTED.get_or_init(|| Self::iter().rev().find(|kernel| kernel.is_supported()).unwrap_or(Self::Scalar))
    }

    /// Reports whether the running CPU can execute this kernel.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            Self::Ssse3 => std::arch::is_x86_feature_detected!("ssse3"),
            #[cfg(target_arch = "x86_64")]
            Self::Avx2 => std::arch::is_x86_feature_detected!("avx2"),
            #[cfg(target_arch = "aarch64")]
            Self::Neon => std::arch::is_aarch64_feature_detected!("neon"),
            _ => false,
        }
    }

    /// Sets `output[i] = c · input[i]`.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    #[inline]
    pub fn mul_slice(self, c: u8, input: &[u8], output: &mut [u8]) {
        self.apply(c, input, output, false);
    }

    /// Sets `output[i] ^= c · input[i]`.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    #[inline]
    pub fn mul_slice_xor(self, c: u8, input: &[u8], output: &mut [u8]) {
        self.apply(c, input, output, true);
    }

    fn apply(self, c: u8, input: &[u8], output: &mut [u8], xor: bool) {
        assert_eq!(input.len(), output.len(), "input and output slices must have equal length");

        let done = match self {
            #[cfg(target_arch = "x86_64")]
            // SAFETY: the CPU supports SSSE3, checked by `is_supported`.
            Self::Ssse3 if self.is_supported() => unsafe { super::x86::mul_ssse3(&NibbleTables::new(c), input, output, xor) },
            #[cfg(target_arch = "x86_64")]
            // SAFETY: the CPU supports AVX2, checked by `is_supported`.
            Self::Avx2 if self.is_supported() => unsafe { super::x86::mul_avx2(&NibbleTables::new(c), input, output, xor) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: the CPU supports NEON, checked by `is_supported`.
            Self::Neon if self.is_supported() => unsafe { super::neon::mul_neon(&NibbleTables::new(c), input, output, xor) },
            _ => 0,
        };

        scalar(c, &input[done..], &mut output[done..], xor);
    }
}

fn scalar(c: u8, input: &[u8], output: &mut [u8], xor: bool) {
    let row = &MUL_TABLE[usize::from(c)];
    if xor {
        for (out, &x) in output.iter_mut().zip(input) {
            *out ^= row[usize::from(x)];
        }
    } else {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = row[usize::from(x)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galois::mul;
    use crate::testing::{random_bytes, seeded};

    const LENGTHS: [usize; 10] = [0, 1, 15, 16, 17, 31, 32, 33, 100, 4099];

    fn supported() -> Vec<Kernel> {
        Kernel::iter().filter(|kernel| kernel.is_supported()).collect()
    }

    #[test]
    fn test_detect_is_supported() {
        assert!(Kernel::detect().is_supported());
        assert!(Kernel::Scalar.is_supported());
    }

    #[test]
    fn test_scalar_mul_slice() {
        let input: Vec<u8> = (0..=255u8).collect();
        let mut output = vec![0u8; input.len()];
        Kernel::Scalar.mul_slice(29, &input, &mut output);
        for (x, out) in input.iter().zip(&output) {
            assert_eq!(*out, mul(29, *x));
        }
    }

    #[test]
    fn test_kernels_match_scalar() {
        let mut rng = seeded(7);
        for kernel in supported() {
            for len in LENGTHS {
                let input = random_bytes(&mut rng, len);
                let seed = random_bytes(&mut rng, len);
                for c in [0u8, 1, 2, 0x1d, 0x8e, 255] {
                    let mut expected = vec![0u8; len];
                    let mut actual = vec![0xAAu8; len];
                    Kernel::Scalar.mul_slice(c, &input, &mut expected);
                    kernel.mul_slice(c, &input, &mut actual);
                    assert_eq!(actual, expected, "{kernel} mul_slice c={c} len={len}");

                    let mut expected = seed.clone();
                    let mut actual = seed.clone();
                    Kernel::Scalar.mul_slice_xor(c, &input, &mut expected);
                    kernel.mul_slice_xor(c, &input, &mut actual);
                    assert_eq!(actual, expected, "{kernel} mul_slice_xor c={c} len={len}");
                }
            }
        }
    }

    #[test]
    fn test_unsupported_kernel_falls_back() {
        let input: Vec<u8> = (0..100u8).collect();
        for kernel in Kernel::iter() {
            let mut output = vec![0u8; input.len()];
            kernel.mul_slice(3, &input, &mut output);
            assert!(input.iter().zip(&output).all(|(x, out)| *out == mul(3, *x)));
        }
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn test_length_mismatch_panics() {
        let mut output = [0u8; 3];
        Kernel::Scalar.mul_slice(2, &[1, 2], &mut output);
    }

    #[test]
    fn test_display() {
        assert_eq!(Kernel::Avx2.to_string(), "avx2");
        assert_eq!(Kernel::Scalar.to_string(), "scalar");
    }
}
