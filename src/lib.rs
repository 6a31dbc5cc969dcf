// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
pub mod hypergraph;
pub mod partitioned_hypergraph;
pub mod clustering;
pub mod streaming_vector;
pub mod process_graph;
pub mod context;
pub mod metrics;
pub mod algorithms;

/// Dense hypernode identifier in `[0, n)`.
pub type NodeId = usize;
/// Dense hyperedge identifier in `[0, m)`.
pub type HyperedgeId = usize;
/// Block identifier in `[0, k)`.
pub type BlockId = usize;
/// Node and hyperedge weights.
pub type Weight = i64;
/// Improvement attributed to a move.
pub type Gain = i64;

/// Sentinel for a node that has not been assigned to a block yet.
pub const INVALID_BLOCK: BlockId = usize::MAX;
/// Sentinel for a node that is not part of an extracted sub-hypergraph.
pub const INVALID_NODE: NodeId = usize::MAX;

/// A single relocation of a node between blocks, as planned by the external
/// refinement engines.
#[derive(Debug, Clone, Copy)]
pub struct Move {
    pub node: NodeId,
    pub from: BlockId,
    pub to: BlockId,
    pub gain: Gain,
}

/// An ordered list of moves with their aggregate attributed gain.
#[derive(Debug, Clone, Default)]
pub struct MoveSequence {
    pub moves: Vec<Move>,
    pub gain: Gain,
}

// Seam between callers and the algorithms that produce or improve a
// partition of a hypergraph. The generic argument `M` is whatever input the
// algorithm consumes besides the assignment itself, typically the
// hypergraph (the partitioning context travels inside the implementor).
// `part_ids` carries one block id per node; implementors may take the
// incoming assignment as a starting point or overwrite it wholesale.
pub trait Partition<M> {
    // Diagnostic data a run hands back alongside the assignment.
    type Metadata;

    // How a run reports failure.
    type Error;

    // Assign every node to a block, writing the block id of node `v` into
    // `part_ids[v]`.
    //
    // On success no entry is left at `INVALID_BLOCK`, and the written block
    // ids are dense from zero: the number of blocks is one plus the largest
    // id in `part_ids`, and a block whose id never occurs is simply empty.
    fn partition(&mut self, part_ids: &mut [BlockId], data: M)
                 -> Result<Self::Metadata, Self::Error>;
}
