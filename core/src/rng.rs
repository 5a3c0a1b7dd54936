//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through a `RandomSource` handed in by the caller.
//! The engine derives one `StreamRng` per operation from the master
//! seed, the stream slot, and a monotonically increasing operation number:
//!   - The same seed and the same sequence of operations replay exactly.
//!   - Each slot's stream is independent, so adding a draw to one stage
//!     never shifts the rolls of another.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The random source every pipeline stage draws from.
pub trait RandomSource {
    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64;

    /// Roll a u64 in [0, n). `n` must be > 0.
    fn next_u64_below(&mut self, n: u64) -> u64;

    /// Bernoulli trial: returns true with probability p.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in [lo, hi], both inclusive.
    fn uniform_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo) as u64 + 1;
        lo + self.next_u64_below(span) as i64
    }

    /// Uniform index into a slice of length `len`. `len` must be > 0.
    fn pick_index(&mut self, len: usize) -> usize {
        self.next_u64_below(len as u64) as usize
    }
}

/// A named, deterministic PCG stream.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    /// Create a stream from the master seed and a stable stream index.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
}

impl RandomSource for StreamRng {
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }
}

/// All streams for one engine instance, derived from a single master seed.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Stream for one slot of one operation. `operation` is the engine's
    /// running operation counter, so successive attempts see fresh rolls.
    pub fn for_operation(&self, slot: StreamSlot, operation: u64) -> StreamRng {
        let op_seed = self
            .master_seed
            .wrapping_add(operation.wrapping_mul(0xbf58_476d_1ce4_e5b9));
        StreamRng::new(op_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Resolution = 0,
    Events = 1,
    Scenario = 2,
    Jailbreak = 3,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Events => "events",
            Self::Scenario => "scenario",
            Self::Jailbreak => "jailbreak",
        }
    }
}
