use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::algorithms::Error;
use crate::context::Context;
use crate::hypergraph::Hypergraph;
use crate::partitioned_hypergraph::PartitionedHypergraph;
use crate::NodeId;

/// Interface of the external multilevel bisection engine.
///
/// An implementation receives a hypergraph together with a two-block
/// context and returns a fully assigned two-block partition. The balance
/// constraint in the context is honored to the best effort of the engine;
/// the caller never retries and repairs imbalance in later refinement.
pub trait Bisector: Sync {
    fn bisect<'a>(
        &self,
        hypergraph: &'a Hypergraph,
        context: &Context,
    ) -> Result<PartitionedHypergraph<'a>, Error>;
}

/// Bisection by greedy heaviest-first assignment.
///
/// Nodes are shuffled, stably sorted by descending weight and handed one by
/// one to the block with the smaller fill fraction relative to its perfect
/// weight, falling back to the other block when the choice would overrun
/// its maximum. A stand-in for the full multilevel engine; it ignores the
/// incidence structure and only balances weights.
#[derive(Debug, Clone, Copy)]
pub struct GreedyBisector {
    /// Seed for the tie-breaking node order.
    pub seed: Option<u64>,
}

impl Default for GreedyBisector {
    fn default() -> Self {
        GreedyBisector { seed: None }
    }
}

impl Bisector for GreedyBisector {
    fn bisect<'a>(
        &self,
        hypergraph: &'a Hypergraph,
        context: &Context,
    ) -> Result<PartitionedHypergraph<'a>, Error> {
        if context.k != 2 {
            return Err(Error::BiPartitioningOnly);
        }
        if context.perfect_balance_part_weights.len() != 2 {
            return Err(Error::InputLenMismatch {
                expected: 2,
                actual: context.perfect_balance_part_weights.len(),
            });
        }
        if context.max_part_weights.len() != 2 {
            return Err(Error::InputLenMismatch {
                expected: 2,
                actual: context.max_part_weights.len(),
            });
        }

        let mut order: Vec<NodeId> = (0..hypergraph.num_nodes()).collect();
        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        order.shuffle(&mut rng);
        order.sort_by_key(|&v| std::cmp::Reverse(hypergraph.node_weight(v)));

        let perfect = &context.perfect_balance_part_weights;
        let max = &context.max_part_weights;
        let phg = PartitionedHypergraph::new(2, hypergraph);
        let mut weights = [0i64; 2];
        for &v in &order {
            let w = hypergraph.node_weight(v);
            let fill = |b: usize| {
                if perfect[b] == 0 {
                    (weights[b] + w) as f64
                } else {
                    (weights[b] + w) as f64 / perfect[b] as f64
                }
            };
            let mut target = if fill(0) <= fill(1) { 0 } else { 1 };
            if weights[target] + w > max[target] && weights[1 - target] + w <= max[1 - target] {
                target = 1 - target;
            }
            phg.set_only_node_part(v, target);
            weights[target] += w;
        }
        phg.initialize_partition();
        Ok(phg)
    }
}
