use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::hypergraph::Hypergraph;
use crate::streaming_vector::StreamingVector;
use crate::{BlockId, HyperedgeId, NodeId, Weight, INVALID_BLOCK, INVALID_NODE};

/// Mutable partitioning state on top of an immutable hypergraph.
///
/// The node-to-block assignment lives in an array of atomics. A move is won
/// by the thread whose compare-and-swap on the node's slot succeeds; the
/// loser observes the swap failure and backs off. The derived quantities
/// (block weights, block sizes, per-hyperedge pin counts) are per-cell atomic
/// counters that the winner updates after its swap, so for every single
/// hyperedge the sequence of pin-count states matches some serial order of
/// the successful moves touching it. There is no lock anywhere; readers are
/// wait-free and may trail an in-flight move by one update.
///
/// Lifecycle: create with every node unassigned, bulk-fill the assignment
/// with `set_only_node_part`, commit with `initialize_partition`, and mutate
/// only through `change_node_part` afterwards.
pub struct PartitionedHypergraph<'a> {
    hg: &'a Hypergraph,
    k: usize,
    part: Box<[AtomicUsize]>,
    part_weight: Box<[AtomicI64]>,
    part_size: Box<[AtomicUsize]>,
    /// Flat `[edge * k + block]` pin counters.
    pin_count: Box<[AtomicU32]>,
}

impl<'a> PartitionedHypergraph<'a> {
    pub fn new(k: usize, hg: &'a Hypergraph) -> Self {
        assert!(k >= 1, "cannot partition into {k} blocks");
        let n = hg.num_nodes();
        let m = hg.num_edges();
        Self {
            hg,
            k,
            part: (0..n).map(|_| AtomicUsize::new(INVALID_BLOCK)).collect(),
            part_weight: (0..k).map(|_| AtomicI64::new(0)).collect(),
            part_size: (0..k).map(|_| AtomicUsize::new(0)).collect(),
            pin_count: (0..m * k).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn hypergraph(&self) -> &'a Hypergraph {
        self.hg
    }

    /// The number of blocks of this partition.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The block the given node is currently assigned to.
    pub fn part_id(&self, v: NodeId) -> BlockId {
        self.part[v].load(Ordering::Acquire)
    }

    /// Assign an unassigned node to a block without touching the derived
    /// state. The caller must commit with `initialize_partition` before any
    /// further use of the partition.
    pub fn set_only_node_part(&self, v: NodeId, b: BlockId) {
        debug_assert!(b < self.k);
        debug_assert_eq!(self.part[v].load(Ordering::Relaxed), INVALID_BLOCK);
        self.part[v].store(b, Ordering::Relaxed);
    }

    /// Recompute block weights, block sizes and pin counts from the node
    /// assignment. Every node must be assigned. Idempotent as long as the
    /// assignment does not change in between.
    pub fn initialize_partition(&self) {
        self.part_weight
            .par_iter()
            .for_each(|w| w.store(0, Ordering::Relaxed));
        self.part_size
            .par_iter()
            .for_each(|s| s.store(0, Ordering::Relaxed));
        self.pin_count
            .par_iter()
            .for_each(|c| c.store(0, Ordering::Relaxed));

        self.do_parallel_for_all_nodes(|v| {
            let b = self.part[v].load(Ordering::Relaxed);
            assert!(b < self.k, "node {v} has no block assigned");
            self.part_weight[b].fetch_add(self.hg.node_weight(v), Ordering::Relaxed);
            self.part_size[b].fetch_add(1, Ordering::Relaxed);
        });

        (0..self.hg.num_edges()).into_par_iter().for_each(|e| {
            for &v in self.hg.pins(e) {
                let b = self.part[v].load(Ordering::Relaxed);
                self.pin_count[e * self.k + b].fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    /// Atomically move a node from one block to another.
    ///
    /// Returns `false` without any side effect when the node is not in
    /// `from` anymore, i.e. a concurrent mover won the race for this node.
    /// On success the block weights, sizes and the pin counts of all
    /// incident hyperedges are updated with atomic additions.
    pub fn change_node_part(&self, v: NodeId, from: BlockId, to: BlockId) -> bool {
        debug_assert!(from < self.k && to < self.k && from != to);
        if self.part[v]
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let w = self.hg.node_weight(v);
        self.part_weight[from].fetch_sub(w, Ordering::Relaxed);
        self.part_weight[to].fetch_add(w, Ordering::Relaxed);
        self.part_size[from].fetch_sub(1, Ordering::Relaxed);
        self.part_size[to].fetch_add(1, Ordering::Relaxed);
        for &e in self.hg.incident_edges(v) {
            self.pin_count[e * self.k + from].fetch_sub(1, Ordering::Relaxed);
            self.pin_count[e * self.k + to].fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// The total weight of all nodes in the given block.
    pub fn part_weight(&self, b: BlockId) -> Weight {
        self.part_weight[b].load(Ordering::Relaxed)
    }

    /// The number of nodes in the given block.
    pub fn part_size(&self, b: BlockId) -> usize {
        self.part_size[b].load(Ordering::Relaxed)
    }

    /// The number of pins of hyperedge `e` currently assigned to block `b`.
    pub fn pin_count_in_part(&self, e: HyperedgeId, b: BlockId) -> usize {
        self.pin_count[e * self.k + b].load(Ordering::Relaxed) as usize
    }

    /// The number of distinct blocks touched by hyperedge `e`.
    pub fn connectivity(&self, e: HyperedgeId) -> usize {
        (0..self.k)
            .filter(|&b| self.pin_count_in_part(e, b) > 0)
            .count()
    }

    /// The blocks touched by hyperedge `e`, in ascending order.
    pub fn connectivity_set(&self, e: HyperedgeId) -> Vec<BlockId> {
        (0..self.k)
            .filter(|&b| self.pin_count_in_part(e, b) > 0)
            .collect()
    }

    /// Apply `f` to every node under the data-parallel scheduler.
    pub fn do_parallel_for_all_nodes<F>(&self, f: F)
    where
        F: Fn(NodeId) + Send + Sync,
    {
        (0..self.hg.num_nodes()).into_par_iter().for_each(f);
    }

    /// A snapshot of the node-to-block assignment.
    pub fn part_ids(&self) -> Vec<BlockId> {
        (0..self.hg.num_nodes()).map(|v| self.part_id(v)).collect()
    }

    /// Build the sub-hypergraph induced by one block.
    ///
    /// With `cut_net_splitting` every hyperedge is restricted to its pins
    /// inside the block and kept when at least two pins remain (the
    /// connectivity objective still sees split nets). Without it only
    /// hyperedges fully contained in the block survive (a cut net stays cut
    /// no matter how the block is subdivided further).
    ///
    /// With `stable` the surviving hyperedges keep their relative order;
    /// otherwise they are gathered in parallel through per-thread buffers
    /// and the order depends on the schedule.
    ///
    /// Returns the sub-hypergraph and the mapping from parent nodes to
    /// sub-nodes, with `INVALID_NODE` for nodes outside the block.
    pub fn extract(
        &self,
        block: BlockId,
        cut_net_splitting: bool,
        stable: bool,
    ) -> (Hypergraph, Vec<NodeId>) {
        let n = self.hg.num_nodes();
        let m = self.hg.num_edges();

        let mut mapping = vec![INVALID_NODE; n];
        let mut sub_node_weights = Vec::new();
        for v in 0..n {
            if self.part_id(v) == block {
                mapping[v] = sub_node_weights.len();
                sub_node_weights.push(self.hg.node_weight(v));
            }
        }

        let keep = |e: HyperedgeId| {
            let inside = self.pin_count_in_part(e, block);
            if cut_net_splitting {
                inside >= 2
            } else {
                inside >= 2 && inside == self.hg.edge_size(e)
            }
        };
        let edges: Vec<HyperedgeId> = if stable {
            (0..m).filter(|&e| keep(e)).collect()
        } else {
            let mut survivors = StreamingVector::new();
            (0..m).into_par_iter().for_each(|e| {
                if keep(e) {
                    survivors.stream(e);
                }
            });
            survivors.copy_parallel()
        };

        let sub_edges: Vec<Vec<NodeId>> = edges
            .par_iter()
            .map(|&e| {
                self.hg
                    .pins(e)
                    .iter()
                    .filter(|&&v| mapping[v] != INVALID_NODE)
                    .map(|&v| mapping[v])
                    .collect()
            })
            .collect();
        let sub_edge_weights: Vec<Weight> =
            edges.iter().map(|&e| self.hg.edge_weight(e)).collect();

        let sub_hg = Hypergraph::new(
            sub_node_weights.len(),
            sub_edges,
            sub_node_weights,
            sub_edge_weights,
        );
        (sub_hg, mapping)
    }
}
