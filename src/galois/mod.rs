//! # GF(2^8) Arithmetic
//!
//! Single-byte field operations backed by compile-time log/exp tables, plus the
//! bulk multiply kernels that dominate encode and decode time.
//!
//! ## Tables
//!
//! - `EXP` holds α^i for i in 0..510, duplicated so `log a + log b` never needs a modulo
//! - `LOG` is the inverse mapping for non-zero elements
//! - `MUL_TABLE` is the full 256×256 product table, built once on first use and
//!   shared by the scalar kernel and the nibble tables of the vector kernels
//!
//! ## Kernels
//!
//! [`Kernel`] selects between the scalar path and the SSSE3 / AVX2 / NEON
//! shuffle-based paths. Every kernel computes exactly the same bytes.

use std::sync::LazyLock;

use crate::config::GENERATING_POLYNOMIAL;
use crate::error::CodingError;

mod kernel;
#[cfg(target_arch = "aarch64")]
mod neon;
#[cfg(target_arch = "x86_64")]
mod x86;

pub use kernel::Kernel;

const EXP_LEN: usize = 510;

struct Tables {
    exp: [u8; EXP_LEN],
    log: [u8; 256],
}

const fn build_tables() -> Tables {
    let mut exp = [0u8; EXP_LEN];
    let mut log = [0u8; 256];

    let mut i = 0usize;
    let mut x: u16 = 1;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= GENERATING_POLYNOMIAL;
        }
        i += 1;
    }

    let mut j = 255usize;
    while j < EXP_LEN {
        exp[j] = exp[j - 255];
        j += 1;
    }

    Tables { exp, log }
}

static TABLES: Tables = build_tables();

/// Product table: `MUL_TABLE[c][x] == mul(c, x)`.
pub(crate) static MUL_TABLE: LazyLock<Box<[[u8; 256]; 256]>> = LazyLock::new(|| {
    let mut table = Box::new([[0u8; 256]; 256]);
    for (c, row) in (0u8..=255).zip(table.iter_mut()) {
        for (x, product) in (0u8..=255).zip(row.iter_mut()) {
            *product = mul(c, x);
        }
    }
    table
});

/// Products of a constant with every low nibble and every high nibble.
///
/// `c·x == low[x & 0x0f] ^ high[x >> 4]` because multiplication distributes
/// over the XOR that splits `x` into its two nibbles.
pub(crate) struct NibbleTables {
    pub low: [u8; 16],
    pub high: [u8; 16],
}

impl NibbleTables {
    pub fn new(c: u8) -> Self {
        let row = &MUL_TABLE[usize::from(c)];
        let mut low = [0u8; 16];
        let mut high = [0u8; 16];
        for nibble in 0..16 {
            low[nibble] = row[nibble];
            high[nibble] = row[nibble << 4];
        }
        Self { low, high }
    }
}

/// Multiplies two field elements.
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    TABLES.exp[usize::from(TABLES.log[usize::from(a)]) + usize::from(TABLES.log[usize::from(b)])]
}

/// Divides `a` by `b`.
///
/// By convention `0 / 0 == 0`; any other division by zero is an error.
#[inline]
pub fn div(a: u8, b: u8) -> Result<u8, CodingError> {
    if a == 0 {
        return Ok(0);
    }
    if b == 0 {
        return Err(CodingError::DivideByZero);
    }
    Ok(TABLES.exp[usize::from(TABLES.log[usize::from(a)]) + 255 - usize::from(TABLES.log[usize::from(b)])])
}

/// Multiplicative inverse of `a`.
#[inline]
pub fn inv(a: u8) -> Result<u8, CodingError> {
    if a == 0 {
        return Err(CodingError::DivideByZero);
    }
    div(1, a)
}

/// Raises `a` to the power `n`.
#[inline]
pub fn exp(a: u8, n: usize) -> u8 {
    if n == 0 {
        return 1;
    }
    if a == 0 {
        return 0;
    }
    TABLES.exp[usize::from(TABLES.log[usize::from(a)]) * (n % 255) % 255]
}
