//! Bloom filter
//!
//! Probabilistic set membership with a tunable false-positive rate.
//! `may_contain` never returns a false negative. There is no per-item
//! delete; `clear` resets the whole filter.
//!
//! The k index functions use double hashing over a single blake3 digest:
//! `g_i(x) = h1(x) + i * h2(x) mod m`.
//!
//! Not internally synchronized; the retriever guards it with its own lock.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
    /// Insertions since the last clear
    inserted: usize,
}

impl BloomFilter {
    /// Create a filter with `num_bits` bits and `num_hashes` hash functions
    pub fn new(num_bits: usize, num_hashes: u32) -> Self {
        let num_bits = num_bits.max(1);
        Self {
            bits: vec![0; num_bits.div_ceil(64)],
            num_bits,
            num_hashes: num_hashes.max(1),
            inserted: 0,
        }
    }

    /// Size the filter for `expected_items` at `target_fpr`
    ///
    /// m = -n ln(p) / (ln 2)^2, k = (m / n) ln 2
    pub fn new_optimal(expected_items: usize, target_fpr: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = target_fpr.clamp(f64::MIN_POSITIVE, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let m = (-n * p.ln() / (ln2 * ln2)).ceil();
        let k = ((m / n) * ln2).ceil();

        Self::new(m as usize, k as u32)
    }

    /// Record an item. Never fails.
    pub fn add(&mut self, item: impl AsRef<[u8]>) {
        let (h1, h2) = Self::hash_pair(item.as_ref());
        for i in 0..self.num_hashes {
            let bit = self.bit_index(h1, h2, i);
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// `false` means definitely never added; `true` means probably added
    pub fn may_contain(&self, item: impl AsRef<[u8]>) -> bool {
        let (h1, h2) = Self::hash_pair(item.as_ref());
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(h1, h2, i);
            self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
        })
    }

    /// Reset every bit
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.inserted = 0;
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Insertions since the last clear (duplicates counted)
    pub fn len(&self) -> usize {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Expected false-positive rate at the current fill: (1 - e^(-kn/m))^k
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let k = self.num_hashes as f64;
        let n = self.inserted as f64;
        let m = self.num_bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    fn hash_pair(item: &[u8]) -> (u64, u64) {
        let digest = blake3::hash(item);
        let bytes = digest.as_bytes();

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&bytes[0..8]);
        b.copy_from_slice(&bytes[8..16]);

        // odd h2 keeps the probe sequence from collapsing when m is even
        (u64::from_le_bytes(a), u64::from_le_bytes(b) | 1)
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> usize {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as usize
    }
}
