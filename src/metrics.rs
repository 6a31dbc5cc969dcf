use rayon::prelude::*;

use crate::context::{Context, Objective};
use crate::partitioned_hypergraph::PartitionedHypergraph;
use crate::process_graph::ProcessGraph;
use crate::Weight;

/// Sum of the weights of all hyperedges with pins in more than one block.
pub fn cut(phg: &PartitionedHypergraph<'_>) -> Weight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .into_par_iter()
        .map(|e| {
            if phg.connectivity(e) > 1 {
                hg.edge_weight(e)
            } else {
                0
            }
        })
        .sum()
}

/// The connectivity objective: for every hyperedge its weight times the
/// number of blocks it touches minus one.
pub fn km1(phg: &PartitionedHypergraph<'_>) -> Weight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .into_par_iter()
        .map(|e| hg.edge_weight(e) * (phg.connectivity(e) as Weight - 1))
        .sum()
}

/// Sum of external degrees: cut hyperedges contribute their weight times
/// the number of blocks they touch.
pub fn soed(phg: &PartitionedHypergraph<'_>) -> Weight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .into_par_iter()
        .map(|e| {
            let connectivity = phg.connectivity(e) as Weight;
            if connectivity > 1 {
                hg.edge_weight(e) * connectivity
            } else {
                0
            }
        })
        .sum()
}

/// Process-mapping cost: every hyperedge pays its weight times the
/// Steiner-tree weight of its connectivity set on the target topology.
pub fn process_mapping_cost(phg: &PartitionedHypergraph<'_>, pg: &ProcessGraph) -> Weight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .into_par_iter()
        .map(|e| hg.edge_weight(e) * pg.steiner_distance(&phg.connectivity_set(e)))
        .sum()
}

/// Evaluate the objective selected in the context.
///
/// Panics when the process-mapping objective is requested without a process
/// graph.
pub fn quality(
    phg: &PartitionedHypergraph<'_>,
    objective: Objective,
    pg: Option<&ProcessGraph>,
) -> Weight {
    match objective {
        Objective::Cut => cut(phg),
        Objective::Km1 => km1(phg),
        Objective::Soed => soed(phg),
        Objective::ProcessMapping => match pg {
            Some(pg) => process_mapping_cost(phg, pg),
            None => panic!("the process_mapping objective requires a process graph"),
        },
    }
}

/// The worst relative overload of any block against its perfect weight.
pub fn imbalance(phg: &PartitionedHypergraph<'_>, context: &Context) -> f64 {
    debug_assert_eq!(context.perfect_balance_part_weights.len(), phg.k());
    (0..phg.k())
        .map(|b| {
            let perfect = context.perfect_balance_part_weights[b];
            if perfect == 0 {
                0.0
            } else {
                phg.part_weight(b) as f64 / perfect as f64 - 1.0
            }
        })
        .fold(0.0f64, f64::max)
}
