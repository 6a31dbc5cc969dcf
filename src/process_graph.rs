use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::{BlockId, Weight};

/// Upper bound on the number of precomputed Steiner-tree entries.
const STEINER_TABLE_ENTRY_LIMIT: usize = 100_000_000;

const INF: Weight = Weight::MAX / 4;

// Scratch for Prim's algorithm, kept per thread so concurrent objective
// evaluations do not allocate.
struct MstData {
    in_tree: Vec<bool>,
    lightest_edge: Vec<Weight>,
    pq: BinaryHeap<Reverse<(Weight, BlockId)>>,
}

impl MstData {
    fn new() -> Self {
        Self {
            in_tree: Vec::new(),
            lightest_edge: Vec::new(),
            pq: BinaryHeap::new(),
        }
    }

    fn prepare(&mut self, k: usize) {
        if self.in_tree.len() < k {
            self.in_tree.resize(k, false);
            self.lightest_edge.resize(k, INF);
        }
        self.pq.clear();
    }
}

thread_local! {
    static MST_DATA: RefCell<MstData> = RefCell::new(MstData::new());
}

/// The target communication topology of the process-mapping objective.
///
/// A small weighted graph on the k blocks. All-pairs shortest paths are
/// computed on construction. `precompute_distances` additionally stores the
/// optimal Steiner-tree weight for every connectivity set up to a chosen
/// size; queries beyond the precomputed range fall back to a minimum
/// spanning tree on the metric completion, the classical 2-approximation of
/// the optimal Steiner tree.
pub struct ProcessGraph {
    k: usize,
    /// Flat `[i * k + j]` shortest-path distances.
    dist: Vec<Weight>,
    /// Precomputed Steiner weights keyed by the connectivity-set encoding.
    steiner: FxHashMap<usize, Weight>,
    max_precomputed_connectivity: usize,
}

impl ProcessGraph {
    /// Build the process graph from an undirected edge list on `k` blocks.
    ///
    /// Panics on out-of-range endpoints, negative weights, or a
    /// disconnected graph.
    pub fn new(k: usize, edges: &[(BlockId, BlockId, Weight)]) -> Self {
        assert!(k >= 1, "process graph needs at least one block");
        let mut dist = vec![INF; k * k];
        for i in 0..k {
            dist[i * k + i] = 0;
        }
        for &(u, v, w) in edges {
            if u >= k || v >= k {
                panic!("process graph edge ({u}, {v}) is out of range");
            }
            if w < 0 {
                panic!("negative process graph edge weights are not supported");
            }
            dist[u * k + v] = dist[u * k + v].min(w);
            dist[v * k + u] = dist[v * k + u].min(w);
        }

        // Floyd-Warshall; k is small.
        for via in 0..k {
            for i in 0..k {
                for j in 0..k {
                    let through = dist[i * k + via] + dist[via * k + j];
                    if through < dist[i * k + j] {
                        dist[i * k + j] = through;
                    }
                }
            }
        }
        if dist.iter().any(|&d| d >= INF) {
            panic!("process graph must be connected");
        }

        Self {
            k,
            dist,
            steiner: FxHashMap::default(),
            max_precomputed_connectivity: 0,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.k
    }

    /// The shortest-path distance between two blocks.
    pub fn distance(&self, i: BlockId, j: BlockId) -> Weight {
        debug_assert!(i < self.k && j < self.k);
        self.dist[i * self.k + j]
    }

    /// Store the optimal Steiner-tree weight for every connectivity set of
    /// size 2 up to `max_connectivity`.
    ///
    /// Enumeration proceeds by set size and stops before the table would
    /// exceed its entry cap; larger sets are then answered through the
    /// approximation path.
    pub fn precompute_distances(&mut self, max_connectivity: usize) {
        let mut entries = 0usize;
        for size in 2..=max_connectivity.min(self.k) {
            entries = entries.saturating_add(binomial(self.k, size));
            if entries > STEINER_TABLE_ENTRY_LIMIT {
                break;
            }
            for set in (0..self.k).combinations(size) {
                let weight = if size == 2 {
                    self.distance(set[0], set[1])
                } else {
                    self.optimal_steiner_tree(&set)
                };
                self.steiner.insert(self.set_index(&set), weight);
            }
            self.max_precomputed_connectivity = size;
        }
    }

    pub fn max_precomputed_connectivity(&self) -> usize {
        self.max_precomputed_connectivity
    }

    /// The weight of a Steiner tree spanning the given connectivity set.
    ///
    /// The set must be sorted and duplicate free. Singletons cost nothing,
    /// pairs are shortest paths, precomputed sets are optimal, anything
    /// larger is a 2-approximation via an MST on the metric completion.
    pub fn steiner_distance(&self, connectivity_set: &[BlockId]) -> Weight {
        debug_assert!(connectivity_set.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(connectivity_set.iter().all(|&b| b < self.k));
        match connectivity_set.len() {
            0 | 1 => 0,
            2 => self.distance(connectivity_set[0], connectivity_set[1]),
            size => {
                if size <= self.max_precomputed_connectivity {
                    if let Some(&weight) = self.steiner.get(&self.set_index(connectivity_set)) {
                        return weight;
                    }
                }
                self.mst_on_metric_completion(connectivity_set)
            }
        }
    }

    /// Mixed-radix encoding of a sorted connectivity set. Singleton sets get
    /// a trailing `last * k` term so that they do not collide with pairs.
    fn set_index(&self, set: &[BlockId]) -> usize {
        let mut index = 0;
        let mut multiplier = 1;
        let mut last = 0;
        for &block in set {
            index += multiplier * block;
            multiplier *= self.k;
            last = block;
        }
        if multiplier == self.k {
            index += last * self.k;
        }
        index
    }

    /// Dreyfus-Wagner dynamic program over the metric completion.
    ///
    /// Exact, exponential in the terminal count; only used during
    /// precomputation where set sizes are tightly bounded.
    fn optimal_steiner_tree(&self, terminals: &[BlockId]) -> Weight {
        let k = self.k;
        let t = terminals.len();
        debug_assert!(t >= 3);
        let root = terminals[t - 1];
        let rest = &terminals[..t - 1];
        let num_masks = 1usize << rest.len();

        // dp[mask * k + v]: lightest tree spanning the terminals in `mask`
        // together with node v.
        let mut dp = vec![INF; num_masks * k];
        for (i, &terminal) in rest.iter().enumerate() {
            for v in 0..k {
                dp[(1 << i) * k + v] = self.distance(terminal, v);
            }
        }

        let mut relaxed = vec![INF; k];
        for mask in 1..num_masks {
            if mask.count_ones() < 2 {
                continue;
            }
            for v in 0..k {
                let mut best = INF;
                let mut sub = (mask - 1) & mask;
                while sub > 0 {
                    let other = mask ^ sub;
                    best = best.min(dp[sub * k + v] + dp[other * k + v]);
                    sub = (sub - 1) & mask;
                }
                dp[mask * k + v] = best;
            }
            for (v, slot) in relaxed.iter_mut().enumerate() {
                let mut best = dp[mask * k + v];
                for w in 0..k {
                    best = best.min(dp[mask * k + w] + self.distance(w, v));
                }
                *slot = best;
            }
            dp[mask * k..(mask + 1) * k].copy_from_slice(&relaxed);
        }

        dp[(num_masks - 1) * k + root]
    }

    /// Prim's algorithm on the metric completion restricted to the set.
    fn mst_on_metric_completion(&self, set: &[BlockId]) -> Weight {
        MST_DATA.with(|data| {
            let mut data = data.borrow_mut();
            data.prepare(self.k);
            let MstData {
                in_tree,
                lightest_edge,
                pq,
            } = &mut *data;

            let start = set[0];
            in_tree[start] = true;
            for &block in &set[1..] {
                lightest_edge[block] = self.distance(start, block);
                pq.push(Reverse((lightest_edge[block], block)));
            }

            let mut total = 0;
            let mut remaining = set.len() - 1;
            while remaining > 0 {
                let Reverse((weight, block)) = match pq.pop() {
                    Some(top) => top,
                    None => break,
                };
                if in_tree[block] || weight > lightest_edge[block] {
                    continue;
                }
                in_tree[block] = true;
                total += weight;
                remaining -= 1;
                for &next in set {
                    if !in_tree[next] {
                        let d = self.distance(block, next);
                        if d < lightest_edge[next] {
                            lightest_edge[next] = d;
                            pq.push(Reverse((d, next)));
                        }
                    }
                }
            }

            for &block in set {
                in_tree[block] = false;
                lightest_edge[block] = INF;
            }
            total
        })
    }
}

fn binomial(n: usize, mut r: usize) -> usize {
    r = r.min(n - r);
    let mut result = 1usize;
    for i in 0..r {
        result = result.saturating_mul(n - i) / (i + 1);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(len: usize) -> ProcessGraph {
        let edges: Vec<(BlockId, BlockId, Weight)> =
            (0..len - 1).map(|i| (i, i + 1, 1)).collect();
        ProcessGraph::new(len, &edges)
    }

    #[test]
    fn test_shortest_path_distances() {
        // Arrange
        let pg = path_graph(4);

        // Assert
        assert_eq!(pg.num_blocks(), 4);
        assert_eq!(pg.distance(0, 0), 0);
        assert_eq!(pg.distance(0, 1), 1);
        assert_eq!(pg.distance(0, 3), 3);
        assert_eq!(pg.distance(3, 0), 3);
    }

    #[test]
    fn test_steiner_distance_on_path_graph() {
        // Arrange
        let mut pg = path_graph(4);
        pg.precompute_distances(3);

        // Assert
        assert_eq!(pg.max_precomputed_connectivity(), 3);
        assert_eq!(pg.steiner_distance(&[2]), 0);
        assert_eq!(pg.steiner_distance(&[0, 3]), 3);
        // The tree 0-1-2-3 is forced; node 2 is a pure Steiner point.
        assert_eq!(pg.steiner_distance(&[0, 1, 3]), 3);
        assert_eq!(pg.steiner_distance(&[0, 2, 3]), 3);
        // Size above the precomputed range falls back to the MST bound.
        let approximate = pg.steiner_distance(&[0, 1, 2, 3]);
        assert_eq!(approximate, 3);
        assert!(approximate <= 2 * 3);
    }

    #[test]
    fn test_approximation_versus_exact_on_star() {
        // Arrange: star with center 0 and unit spokes. The optimal tree for
        // the three leaves routes through the center (weight 3); the metric
        // MST connects leaves pairwise at distance 2 (weight 4).
        let star = [(0, 1, 1), (0, 2, 1), (0, 3, 1)];
        let mut pairs_only = ProcessGraph::new(4, &star);
        pairs_only.precompute_distances(2);
        let mut exact = ProcessGraph::new(4, &star);
        exact.precompute_distances(3);

        // Act
        let approximate = pairs_only.steiner_distance(&[1, 2, 3]);
        let optimal = exact.steiner_distance(&[1, 2, 3]);

        // Assert
        assert_eq!(optimal, 3);
        assert_eq!(approximate, 4);
        assert!(approximate <= 2 * optimal);
    }

    #[test]
    fn test_precomputed_weights_match_weighted_graph() {
        // Arrange: a square with one heavy side.
        let square = [(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 10)];
        let mut pg = ProcessGraph::new(4, &square);
        pg.precompute_distances(4);

        // Assert
        assert_eq!(pg.distance(0, 3), 3);
        assert_eq!(pg.steiner_distance(&[0, 1, 2, 3]), 3);
        assert_eq!(pg.steiner_distance(&[0, 2]), 2);
        assert_eq!(pg.steiner_distance(&[0, 2, 3]), 3);
    }

    #[test]
    fn test_set_index_is_injective_for_small_sets() {
        // Arrange
        let pg = path_graph(5);
        let mut seen = std::collections::HashSet::new();

        // Act and Assert
        for size in 1..=3usize {
            for set in (0..5usize).combinations(size) {
                assert!(seen.insert(pg.set_index(&set)), "collision for {set:?}");
            }
        }
    }

    #[test]
    #[should_panic]
    fn test_disconnected_graph_panics() {
        ProcessGraph::new(3, &[(0, 1, 1)]);
    }
}
