//! Cache of inverted decode matrices.
//!
//! Inverting a `data × data` sub-matrix is the most expensive step of
//! reconstruction, and the result only depends on which shards are missing.
//! The tree memoizes one decode matrix per distinct set of missing indices.
//!
//! # Thread Safety
//!
//! Lookups take a shared read lock, inserts an exclusive write lock. Two calls
//! missing on the same key may both invert; the first insert wins and the
//! second caller receives the stored matrix, so all callers observe one entry.

use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::matrix::Matrix;

/// Decode matrices keyed by the sorted indices of the invalid (missing) shards.
pub struct InversionTree {
    /// Decode matrix for the empty key: nothing is missing, nothing to undo.
    root: Arc<Matrix>,
    children: RwLock<HashMap<Box<[usize]>, Arc<Matrix>>>,
    total_shards: usize,
}

impl InversionTree {
    /// Creates a tree holding only the identity root.
    ///
    /// # Arguments
    /// * `data_shards` - Number of data shards
    /// * `parity_shards` - Number of parity shards
    ///
    /// # Returns
    /// An empty cache for this layout
    pub fn new(data_shards: usize, parity_shards: usize) -> Self {
        Self { root: Arc::new(Matrix::identity(data_shards)), children: RwLock::new(HashMap::new()), total_shards: data_shards + parity_shards }
    }

    /// Returns the cached decode matrix for `invalid`, if one was inserted.
    ///
    /// `invalid` must be strictly increasing.
    pub fn get(&self, invalid: &[usize]) -> Option<Arc<Matrix>> {
        if invalid.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        self.children.read().unwrap_or_else(PoisonError::into_inner).get(invalid).cloned()
    }

    /// Stores `matrix` under `invalid` and returns the entry now in the cache.
    ///
    /// If another caller inserted the same key first, its matrix is kept and
    /// returned. The empty key always resolves to the identity root.
    pub fn insert(&self, invalid: &[usize], matrix: Matrix) -> Arc<Matrix> {
        debug_assert!(invalid.windows(2).all(|pair| pair[0] < pair[1]), "invalid indices must be sorted and unique");
        debug_assert!(invalid.iter().all(|&index| index < self.total_shards), "invalid index out of range");

        if invalid.is_empty() {
            return Arc::clone(&self.root);
        }

        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(children.entry(invalid.into()).or_insert_with(|| Arc::new(matrix)))
    }

    /// Number of cached decode matrices, not counting the root.
    pub fn len(&self) -> usize {
        self.children.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_root_is_identity() {
        let tree = InversionTree::new(3, 2);
        assert_eq!(*tree.get(&[]).unwrap(), Matrix::identity(3));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let tree = InversionTree::new(3, 2);
        let matrix = Matrix::from_rows(&[[1u8, 2, 3], [4, 5, 6], [7, 8, 9]]).unwrap();

        assert!(tree.get(&[0, 2]).is_none());
        tree.insert(&[0, 2], matrix.clone());
        assert_eq!(*tree.get(&[0, 2]).unwrap(), matrix);
        assert!(tree.get(&[0]).is_none());
        assert!(tree.get(&[2]).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_first_insert_wins() {
        let tree = InversionTree::new(2, 2);
        let first = Matrix::identity(2);
        let second = Matrix::from_rows(&[[0u8, 1], [1, 0]]).unwrap();

        tree.insert(&[1], first.clone());
        let stored = tree.insert(&[1], second);
        assert_eq!(*stored, first);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_insert_empty_key_is_root() {
        let tree = InversionTree::new(2, 1);
        let stored = tree.insert(&[], Matrix::new(2, 2));
        assert_eq!(*stored, Matrix::identity(2));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_concurrent_inserts() {
        let tree = InversionTree::new(4, 4);
        let keys: Vec<Vec<usize>> = (0..8).flat_map(|a| (a + 1..8).map(move |b| vec![a, b])).collect();

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for key in &keys {
                        let marker = u8::try_from(key[0] * 8 + key[1]).unwrap();
                        let mut matrix = Matrix::identity(4);
                        matrix.set(0, 1, marker);
                        tree.insert(key, matrix);
                    }
                });
            }
        });

        assert_eq!(tree.len(), keys.len());
        for key in &keys {
            let marker = u8::try_from(key[0] * 8 + key[1]).unwrap();
            assert_eq!(tree.get(key).unwrap().get(0, 1), marker);
        }
    }
}
