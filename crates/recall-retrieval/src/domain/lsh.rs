//! Locality-Sensitive Hashing index
//!
//! Random-hyperplane sign hashing over `num_tables` independent tables.
//! Each table projects a vector onto `hash_width` Gaussian hyperplanes and
//! packs the signs into a u64 bucket key. Vectors with small angular
//! distance collide in at least one table with high probability.
//!
//! Queries return an unranked candidate set; callers re-rank by exact
//! distance.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use recall_common::{RecallError, Result, ValidationError};
use tracing::trace;

use super::vector::dot;

/// One hash table: hyperplanes plus bucket postings
#[derive(Debug, Clone)]
struct HashTable {
    /// `hash_width` hyperplanes, each of length `dimension`
    planes: Vec<Vec<f32>>,
    buckets: HashMap<u64, Vec<String>>,
}

impl HashTable {
    fn signature(&self, vector: &[f32]) -> u64 {
        self.planes
            .iter()
            .enumerate()
            .fold(0u64, |key, (bit, plane)| {
                if dot(plane, vector) >= 0.0 {
                    key | (1u64 << bit)
                } else {
                    key
                }
            })
    }

    fn remove_posting(&mut self, key: u64, id: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|member| member != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.buckets.remove(&key);
        }
        removed
    }
}

/// Multi-table LSH index
#[derive(Debug, Clone)]
pub struct LshIndex {
    tables: Vec<HashTable>,
    dimension: usize,
    hash_width: usize,
    /// Per-item signatures, one per table, so removal needs only the ID
    signatures: HashMap<String, Vec<u64>>,
}

impl LshIndex {
    /// Create an index with `num_tables` tables of `hash_width` bits each
    pub fn new(num_tables: usize, hash_width: usize, dimension: usize, seed: u64) -> Result<Self> {
        if num_tables == 0 || hash_width == 0 || dimension == 0 {
            return Err(ValidationError::InvalidParameter(
                "LSH tables, hash width and dimension must be positive".to_string(),
            )
            .into());
        }
        if hash_width > 64 {
            return Err(ValidationError::InvalidParameter(format!(
                "LSH hash width {} exceeds 64 bits",
                hash_width
            ))
            .into());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let normal = StandardNormal;
        let tables = (0..num_tables)
            .map(|_| HashTable {
                planes: (0..hash_width)
                    .map(|_| {
                        (0..dimension)
                            .map(|_| -> f32 { normal.sample(&mut rng) })
                            .collect()
                    })
                    .collect(),
                buckets: HashMap::new(),
            })
            .collect();

        Ok(Self {
            tables,
            dimension,
            hash_width,
            signatures: HashMap::new(),
        })
    }

    /// Insert `id` into one bucket per table
    ///
    /// Re-adding an existing ID replaces its previous postings.
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;

        if self.signatures.contains_key(id) {
            self.remove(id);
        }

        let keys: Vec<u64> = self.tables.iter().map(|t| t.signature(vector)).collect();
        for (table, key) in self.tables.iter_mut().zip(keys.iter()) {
            table.buckets.entry(*key).or_default().push(id.to_string());
        }
        trace!(id = %id, tables = keys.len(), "LSH postings added");
        self.signatures.insert(id.to_string(), keys);
        Ok(())
    }

    /// Union of bucket members across all tables for the query signature
    ///
    /// Deduplicated, in first-seen order. Not guaranteed to hold `k` items
    /// and not sorted by distance; `k` is a hint only.
    pub fn query(&self, vector: &[f32], _k: usize) -> Result<Vec<String>> {
        self.check_dimension(vector)?;

        let mut seen = std::collections::HashSet::new();
        let mut candidates = Vec::new();

        for table in &self.tables {
            if let Some(bucket) = table.buckets.get(&table.signature(vector)) {
                for id in bucket {
                    if seen.insert(id.as_str()) {
                        candidates.push(id.clone());
                    }
                }
            }
        }

        Ok(candidates)
    }

    /// Remove every posting of `id`; returns whether anything was removed
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(keys) = self.signatures.remove(id) else {
            return false;
        };
        for (table, key) in self.tables.iter_mut().zip(keys) {
            table.remove_posting(key, id);
        }
        true
    }

    /// Remove using signatures recomputed from `vector`
    ///
    /// Only postings in the buckets `vector` hashes to are removed; if it
    /// differs from the vector used at insert time the call silently
    /// removes nothing from the tables it misses.
    pub fn remove_with_vector(&mut self, id: &str, vector: &[f32]) -> Result<bool> {
        self.check_dimension(vector)?;

        let mut removed = false;
        for table in self.tables.iter_mut() {
            let key = table.signature(vector);
            removed |= table.remove_posting(key, id);
        }

        let fully_gone = self
            .tables
            .iter()
            .all(|t| t.buckets.values().all(|b| b.iter().all(|m| m != id)));
        if fully_gone {
            self.signatures.remove(id);
        }
        Ok(removed)
    }

    /// Number of postings across all tables (not unique items)
    pub fn size(&self) -> usize {
        self.tables
            .iter()
            .map(|t| t.buckets.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Number of unique indexed items
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn hash_width(&self) -> usize {
        self.hash_width
    }

    /// Drop all postings, keep the hyperplanes
    pub fn clear(&mut self) {
        for table in self.tables.iter_mut() {
            table.buckets.clear();
        }
        self.signatures.clear();
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RecallError::dimension_mismatch(self.dimension, vector.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LshIndex {
        LshIndex::new(4, 8, 4, 42).unwrap()
    }

    #[test]
    fn test_identical_vector_is_candidate() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 0.2, 0.0, 0.5]).unwrap();
        lsh.add("b", &[-1.0, 0.3, -0.7, 0.1]).unwrap();

        let candidates = lsh.query(&[1.0, 0.2, 0.0, 0.5], 5).unwrap();
        assert!(candidates.contains(&"a".to_string()));
    }

    #[test]
    fn test_size_counts_postings() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        lsh.add("b", &[0.0, 1.0, 0.0, 0.0]).unwrap();

        assert_eq!(lsh.len(), 2);
        assert_eq!(lsh.size(), 2 * lsh.num_tables());
    }

    #[test]
    fn test_query_dedups() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 1.0, 1.0, 1.0]).unwrap();

        // same vector lands in the same bucket in every table
        let candidates = lsh.query(&[1.0, 1.0, 1.0, 1.0], 1).unwrap();
        assert_eq!(candidates, vec!["a".to_string()]);
    }

    #[test]
    fn test_remove_by_id() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();

        assert!(lsh.remove("a"));
        assert!(!lsh.remove("a"));
        assert_eq!(lsh.size(), 0);
        assert!(lsh.query(&[1.0, 0.0, 0.0, 0.0], 1).unwrap().is_empty());
    }

    #[test]
    fn test_remove_with_original_vector() {
        let mut lsh = index();
        let v = [0.3, -0.4, 0.9, 0.1];
        lsh.add("a", &v).unwrap();

        assert!(lsh.remove_with_vector("a", &v).unwrap());
        assert_eq!(lsh.size(), 0);
        assert!(lsh.is_empty());
    }

    #[test]
    fn test_readd_replaces_postings() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        lsh.add("a", &[0.0, 0.0, 0.0, 1.0]).unwrap();

        assert_eq!(lsh.len(), 1);
        assert_eq!(lsh.size(), lsh.num_tables());
    }

    #[test]
    fn test_dimension_enforced() {
        let mut lsh = index();
        let err = lsh.add("a", &[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            RecallError::Validation(ValidationError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        assert!(lsh.query(&[1.0], 1).is_err());
    }

    #[test]
    fn test_query_with_huge_k() {
        let mut lsh = index();
        lsh.add("a", &[1.0, 1.0, 1.0, 1.0]).unwrap();

        let candidates = lsh.query(&[1.0, 1.0, 1.0, 1.0], usize::MAX).unwrap();
        assert_eq!(candidates, vec!["a".to_string()]);
    }

    #[test]
    fn test_same_seed_same_hyperplanes() {
        let mut a = LshIndex::new(3, 16, 4, 9).unwrap();
        let mut b = LshIndex::new(3, 16, 4, 9).unwrap();
        let v = [0.2, -0.9, 0.4, 0.1];
        a.add("x", &v).unwrap();
        b.add("x", &v).unwrap();

        assert_eq!(a.signatures.get("x"), b.signatures.get("x"));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LshIndex::new(0, 8, 4, 1).is_err());
        assert!(LshIndex::new(4, 65, 4, 1).is_err());
        assert!(LshIndex::new(4, 64, 4, 1).is_ok());
    }
}
