//! Global Configuration Constants
//!
//! This module contains the fixed parameters of the coding engine: the field
//! definition, the shard limits it implies, and the tuning knobs of the
//! parallel executor.
//!
//! ## Design Philosophy
//!
//! - **Field First**: every limit below follows from working in GF(2^8)
//! - **Deterministic**: chunk partitioning depends only on buffer length, never on timing
//! - **Tunable**: executor values are defaults, overridable per coder via `ExecutorOptions`

// === Galois Field Parameters ===

/// Generating polynomial of GF(2^8): x^8 + x^4 + x^3 + x^2 + 1.
///
/// The low byte (0x1d) is what gets folded back in when a product overflows
/// eight bits. The generator element is 2.
pub const GENERATING_POLYNOMIAL: u16 = 0x11d;

/// Number of elements in the field.
pub const FIELD_SIZE: usize = 256;

// === Shard Limits ===

/// Maximum number of data + parity shards a single coder can handle.
///
/// Every row of the generator matrix is derived from a distinct field element,
/// so no more than `FIELD_SIZE` pairwise independent rows can exist.
pub const MAX_TOTAL_SHARDS: usize = FIELD_SIZE;

// === Parallel Executor Parameters ===

/// Upper bound on the number of chunk tasks one coding call fans out into.
///
/// Large shards are divided into at most this many byte ranges. The rayon
/// pool decides how many of them actually run at once.
pub const MAX_CHUNK_TASKS: usize = 384;

/// Smallest byte range handed to a single chunk task.
///
/// Below this size the cost of scheduling a task outweighs the arithmetic it
/// performs, so small shards are processed by a single task.
pub const MIN_SPLIT_SIZE: usize = 1024;

/// Alignment of chunk boundaries in bytes.
///
/// 32 bytes is the width of one AVX2 register, so every chunk except the last
/// is processed entirely by the vector kernels.
pub const SPLIT_ALIGNMENT: usize = 32;
