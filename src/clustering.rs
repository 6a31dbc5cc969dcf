use std::ops::Index;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::BlockId;

/// Block-id sequence used as coarsening and initial-partitioning feedback.
///
/// `compactify` relabels the cluster ids to the dense range `[0, m)` in
/// ascending order of the original ids, so the sequential and the parallel
/// path agree on every input.
pub struct Clustering {
    clusters: Vec<BlockId>,
}

impl Clustering {
    pub fn new(n: usize) -> Self {
        Self {
            clusters: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn as_slice(&self) -> &[BlockId] {
        &self.clusters
    }

    /// Put every node into its own cluster.
    pub fn assign_singleton(&mut self, parallel: bool) {
        if parallel {
            self.clusters
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, c)| *c = i);
        } else {
            for (i, c) in self.clusters.iter_mut().enumerate() {
                *c = i;
            }
        }
    }

    /// Relabel all cluster ids to `[0, m)` and return `m`.
    ///
    /// `upper_bound` is the largest id that may occur; it defaults to
    /// `len() - 1`.
    pub fn compactify(&mut self, upper_bound: Option<BlockId>, parallel: bool) -> usize {
        if self.clusters.is_empty() {
            return 0;
        }
        let upper_bound = upper_bound.unwrap_or(self.clusters.len() - 1);
        if parallel {
            self.parallel_compactify(upper_bound)
        } else {
            self.sequential_compactify(upper_bound)
        }
    }

    fn sequential_compactify(&mut self, upper_bound: BlockId) -> usize {
        let mut mapping = vec![usize::MAX; upper_bound + 1];
        for &c in &self.clusters {
            mapping[c] = 0;
        }
        let mut num_clusters = 0;
        for slot in mapping.iter_mut() {
            if *slot == 0 {
                *slot = num_clusters;
                num_clusters += 1;
            }
        }
        for c in self.clusters.iter_mut() {
            *c = mapping[*c];
        }
        num_clusters
    }

    fn parallel_compactify(&mut self, upper_bound: BlockId) -> usize {
        let marks: Vec<AtomicUsize> = (0..=upper_bound).map(|_| AtomicUsize::new(0)).collect();
        self.clusters
            .par_iter()
            .for_each(|&c| marks[c].store(1, Ordering::Relaxed));

        let mut mapping: Vec<usize> = marks.into_iter().map(AtomicUsize::into_inner).collect();
        let num_clusters = parallel_exclusive_prefix_sum(&mut mapping);

        self.clusters
            .par_iter_mut()
            .for_each(|c| *c = mapping[*c]);
        num_clusters
    }
}

impl From<Vec<BlockId>> for Clustering {
    fn from(clusters: Vec<BlockId>) -> Self {
        Self { clusters }
    }
}

impl Index<usize> for Clustering {
    type Output = BlockId;

    fn index(&self, i: usize) -> &BlockId {
        &self.clusters[i]
    }
}

/// Two-phase parallel exclusive prefix sum; returns the overall sum.
///
/// Phase one computes per-chunk sums, phase two scans each chunk with its
/// chunk offset.
fn parallel_exclusive_prefix_sum(values: &mut [usize]) -> usize {
    const CHUNK_SIZE: usize = 1 << 12;

    let chunk_sums: Vec<usize> = values
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| chunk.iter().sum())
        .collect();

    let mut offsets = Vec::with_capacity(chunk_sums.len());
    let mut total = 0;
    for sum in chunk_sums {
        offsets.push(total);
        total += sum;
    }

    values
        .par_chunks_mut(CHUNK_SIZE)
        .zip(offsets.into_par_iter())
        .for_each(|(chunk, offset)| {
            let mut running = offset;
            for value in chunk.iter_mut() {
                let next = running + *value;
                *value = running;
                running = next;
            }
        });

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_singleton() {
        // Arrange
        let mut sequential = Clustering::new(5);
        let mut parallel = Clustering::new(5);

        // Act
        sequential.assign_singleton(false);
        parallel.assign_singleton(true);

        // Assert
        assert_eq!(sequential.as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(parallel.as_slice(), sequential.as_slice());
    }

    #[test]
    fn test_compactify_sequential() {
        // Arrange
        let mut clustering = Clustering::from(vec![5, 5, 7, 9, 5, 7, 9]);

        // Act
        let num_clusters = clustering.compactify(Some(9), false);

        // Assert
        assert_eq!(num_clusters, 3);
        assert_eq!(clustering.as_slice(), &[0, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_compactify_parallel() {
        // Arrange
        let mut clustering = Clustering::from(vec![5, 5, 7, 9, 5, 7, 9]);

        // Act
        let num_clusters = clustering.compactify(Some(9), true);

        // Assert
        assert_eq!(num_clusters, 3);
        assert_eq!(clustering.as_slice(), &[0, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_compactify_default_upper_bound() {
        // Arrange
        let mut clustering = Clustering::from(vec![3, 0, 3, 2]);

        // Act
        let num_clusters = clustering.compactify(None, false);

        // Assert
        assert_eq!(num_clusters, 3);
        assert_eq!(clustering.as_slice(), &[2, 0, 2, 1]);
    }

    #[test]
    fn test_compactify_paths_agree() {
        // Arrange: pseudo random ids, including ids out of first-seen order.
        let ids: Vec<BlockId> = (0..10_000).map(|i| (i * 7919 + 13) % 257).collect();
        let mut sequential = Clustering::from(ids.clone());
        let mut parallel = Clustering::from(ids);

        // Act
        let n_seq = sequential.compactify(Some(256), false);
        let n_par = parallel.compactify(Some(256), true);

        // Assert
        assert_eq!(n_seq, n_par);
        assert_eq!(sequential.as_slice(), parallel.as_slice());
    }

    #[test]
    fn test_singleton_then_compactify_is_identity() {
        // Arrange
        let mut clustering = Clustering::new(6);
        clustering.assign_singleton(true);

        // Act
        let num_clusters = clustering.compactify(None, true);

        // Assert
        assert_eq!(num_clusters, 6);
        assert_eq!(clustering.as_slice(), &[0, 1, 2, 3, 4, 5]);
    }
}
