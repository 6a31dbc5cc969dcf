use tracing::debug;

use crate::algorithms::multilevel::Bisector;
use crate::algorithms::Error;
use crate::context::{Context, ContextType, Mode, Objective};
use crate::hypergraph::Hypergraph;
use crate::partitioned_hypergraph::PartitionedHypergraph;
use crate::{BlockId, Partition, Weight};

// The recursion produces the k blocks of a range by bisecting the range,
// assigning the two halves to the range's first and middle block, and
// forking one sub-problem per half on the extracted block. The two
// sub-problems run as a structured fork-join; the joining thread steals
// work instead of idling. Every level tightens its balance constraint
// adaptively so that the leaf blocks still meet the caller's tolerance
// after all the halvings.

/// Parameters of the root problem, threaded through the recursion for the
/// adaptive balance constraint.
struct OriginalHypergraphInfo {
    original_weight: Weight,
    original_k: usize,
    original_epsilon: f64,
}

impl OriginalHypergraphInfo {
    /// The tolerance a sub-problem of the given weight and block count may
    /// use so that the leaf-level blocks still meet the original epsilon.
    fn compute_adaptive_epsilon(&self, current_weight: Weight, current_k: usize) -> f64 {
        if current_weight == 0 {
            return 0.0;
        }
        let base = (self.original_weight as f64 / self.original_k as f64).ceil()
            / (current_weight as f64 / current_k as f64).ceil()
            * (1.0 + self.original_epsilon);
        let levels = (current_k as f64).log2().ceil();
        (base.powf(1.0 / levels) - 1.0).clamp(0.0, 0.99)
    }
}

/// Derive the two-block context for one bisection step.
fn setup_bipartitioning_context(
    hypergraph: &Hypergraph,
    context: &Context,
    info: &OriginalHypergraphInfo,
) -> Context {
    let mut b_context = context.clone();
    b_context.k = 2;
    if context.mode == Mode::Direct {
        b_context.context_type = ContextType::InitialPartitioning;
    }

    let total_weight = hypergraph.total_weight();
    let k = context.k;
    let k0 = k / 2 + k % 2;
    let k1 = k / 2;
    debug_assert_eq!(k0 + k1, k);

    if context.use_individual_part_weights {
        let max_weights_sum: Weight = context.max_part_weights.iter().sum();
        let weight_fraction = total_weight as f64 / max_weights_sum as f64;
        debug_assert!(weight_fraction <= 1.0);
        let perfect_weight = |range: &[Weight]| -> Weight {
            range
                .iter()
                .map(|&m| (weight_fraction * m as f64).ceil() as Weight)
                .sum()
        };
        let perfect_0 = perfect_weight(&context.max_part_weights[..k0]);
        let perfect_1 = perfect_weight(&context.max_part_weights[k0..]);
        // The equal-weight epsilon formula does not carry over to individual
        // targets; an equivalent one works on the sums of the perfect and
        // the maximum part weights. The perfect sum can differ from the
        // hypergraph weight through rounding, so it is used instead.
        let base = max_weights_sum as f64 / (perfect_0 + perfect_1) as f64;
        b_context.epsilon = if total_weight == 0 {
            0.0
        } else {
            let levels = (k as f64).log2().ceil();
            (base.powf(1.0 / levels) - 1.0).clamp(0.0, 0.99)
        };
        b_context.perfect_balance_part_weights = vec![perfect_0, perfect_1];
        b_context.max_part_weights = vec![
            ((1.0 + b_context.epsilon) * perfect_0 as f64).round() as Weight,
            ((1.0 + b_context.epsilon) * perfect_1 as f64).round() as Weight,
        ];
    } else {
        b_context.epsilon = info.compute_adaptive_epsilon(total_weight, k);
        let perfect_0 = (k0 as f64 / k as f64 * total_weight as f64).ceil() as Weight;
        let perfect_1 = (k1 as f64 / k as f64 * total_weight as f64).ceil() as Weight;
        b_context.perfect_balance_part_weights = vec![perfect_0, perfect_1];
        b_context.max_part_weights = vec![
            ((1.0 + b_context.epsilon) * perfect_0 as f64) as Weight,
            ((1.0 + b_context.epsilon) * perfect_1 as f64) as Weight,
        ];
    }
    b_context
}

/// Derive the context for recursing on one block of the bisection.
fn setup_recursive_bipartitioning_context(
    context: &Context,
    k0: usize,
    k1: usize,
    degree_of_parallelism: f64,
) -> Context {
    debug_assert!(k1 - k0 >= 2);
    let mut rb_context = context.clone();
    rb_context.k = k1 - k0;
    if context.mode == Mode::Direct {
        rb_context.context_type = ContextType::InitialPartitioning;
    }
    rb_context.perfect_balance_part_weights =
        context.perfect_balance_part_weights[k0..k1].to_vec();
    rb_context.max_part_weights = context.max_part_weights[k0..k1].to_vec();
    rb_context.degree_of_parallelism *= degree_of_parallelism;
    rb_context
}

fn recursive_bipartitioning<B: Bisector>(
    phg: &PartitionedHypergraph<'_>,
    context: &Context,
    k0: usize,
    k1: usize,
    info: &OriginalHypergraphInfo,
    bisector: &B,
) -> Result<(), Error> {
    let hypergraph = phg.hypergraph();
    let b_context = setup_bipartitioning_context(hypergraph, context, info);
    debug!(
        k0,
        k1,
        epsilon = b_context.epsilon,
        "multilevel bisection"
    );
    let bipartitioned = bisector.bisect(hypergraph, &b_context)?;

    let k = k1 - k0;
    let block_0: BlockId = 0;
    let block_1: BlockId = k / 2 + k % 2;
    phg.do_parallel_for_all_nodes(|v| {
        let part = bipartitioned.part_id(v);
        debug_assert!(part < 2);
        phg.set_only_node_part(v, if part == 0 { block_0 } else { block_1 });
    });
    phg.initialize_partition();

    debug_assert!(context.k >= 2);
    let rb_k0 = context.k / 2 + context.k % 2;
    let rb_k1 = context.k / 2;
    if rb_k0 >= 2 && rb_k1 >= 2 {
        // Both halves need more than one block, so both sub-problems are
        // forked in parallel.
        let (left, right) = rayon::join(
            || recursively_bipartition_block(phg, context, block_0, 0, rb_k0, info, 0.5, bisector),
            || {
                recursively_bipartition_block(
                    phg,
                    context,
                    block_1,
                    rb_k0,
                    rb_k0 + rb_k1,
                    info,
                    0.5,
                    bisector,
                )
            },
        );
        left?;
        right?;
    } else if rb_k0 >= 2 {
        debug_assert!(rb_k1 < 2);
        recursively_bipartition_block(phg, context, block_0, 0, rb_k0, info, 1.0, bisector)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn recursively_bipartition_block<B: Bisector>(
    phg: &PartitionedHypergraph<'_>,
    context: &Context,
    block: BlockId,
    k0: usize,
    k1: usize,
    info: &OriginalHypergraphInfo,
    degree_of_parallelism: f64,
    bisector: &B,
) -> Result<(), Error> {
    let rb_context =
        setup_recursive_bipartitioning_context(context, k0, k1, degree_of_parallelism);
    // A cut net stays cut however the block is subdivided, so it only has to
    // survive the extraction when the objective charges per connectivity.
    let cut_net_splitting = context.objective == Objective::Km1;
    let (rb_hypergraph, mapping) = phg.extract(
        block,
        cut_net_splitting,
        context.stable_construction_of_incident_edges,
    );

    if rb_hypergraph.num_nodes() == 0 {
        return Ok(());
    }

    let rb_phg = PartitionedHypergraph::new(rb_context.k, &rb_hypergraph);
    recursive_bipartitioning(&rb_phg, &rb_context, k0, k1, info, bisector)?;

    phg.do_parallel_for_all_nodes(|v| {
        if phg.part_id(v) == block {
            let to = block + rb_phg.part_id(mapping[v]);
            debug_assert!(to < block + rb_context.k);
            if to != block {
                phg.change_node_part(v, block, to);
            }
        }
    });
    Ok(())
}

/// Partition the hypergraph into `context.k` blocks by recursive
/// bisection.
pub fn partition<'a, B: Bisector>(
    hypergraph: &'a Hypergraph,
    context: &Context,
    bisector: &B,
) -> Result<PartitionedHypergraph<'a>, Error> {
    let phg = PartitionedHypergraph::new(context.k.max(1), hypergraph);
    partition_into(&phg, context, bisector)?;
    Ok(phg)
}

/// Partition into an existing, still unassigned partitioned hypergraph.
pub fn partition_into<B: Bisector>(
    phg: &PartitionedHypergraph<'_>,
    context: &Context,
    bisector: &B,
) -> Result<(), Error> {
    if context.k < 2 {
        return Err(Error::InvalidNumberOfBlocks { k: context.k });
    }
    if phg.k() != context.k {
        return Err(Error::InputLenMismatch {
            expected: context.k,
            actual: phg.k(),
        });
    }
    let mut context = context.clone();
    context.setup_part_weights(phg.hypergraph().total_weight());

    let info = OriginalHypergraphInfo {
        original_weight: phg.hypergraph().total_weight(),
        original_k: context.k,
        original_epsilon: context.epsilon,
    };
    recursive_bipartitioning(phg, &context, 0, context.k, &info, bisector)
}

/// Recursive bipartitioning behind the crate's `Partition` trait.
pub struct RecursiveBipartitioner<B> {
    pub context: Context,
    pub bisector: B,
}

impl<'a, B: Bisector> Partition<&'a Hypergraph> for RecursiveBipartitioner<B> {
    type Metadata = ();
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [BlockId],
        hypergraph: &'a Hypergraph,
    ) -> Result<Self::Metadata, Self::Error> {
        if part_ids.len() != hypergraph.num_nodes() {
            return Err(Error::InputLenMismatch {
                expected: hypergraph.num_nodes(),
                actual: part_ids.len(),
            });
        }
        let phg = partition(hypergraph, &self.context, &self.bisector)?;
        for (v, slot) in part_ids.iter_mut().enumerate() {
            *slot = phg.part_id(v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;

    use super::*;
    use crate::algorithms::multilevel::GreedyBisector;
    use crate::metrics;

    fn unit_hypergraph(n: usize) -> Hypergraph {
        Hypergraph::with_unit_weights(n, Vec::new())
    }

    fn seven_node_hypergraph() -> Hypergraph {
        Hypergraph::with_unit_weights(
            7,
            vec![vec![0, 2], vec![0, 1, 3, 4], vec![3, 4, 6], vec![2, 5, 6]],
        )
    }

    struct FailingBisector;

    impl Bisector for FailingBisector {
        fn bisect<'a>(
            &self,
            _hypergraph: &'a Hypergraph,
            _context: &Context,
        ) -> Result<PartitionedHypergraph<'a>, Error> {
            Err(Error::BiPartitioningOnly)
        }
    }

    #[test]
    fn test_adaptive_epsilon_at_the_root() {
        // Arrange
        let info = OriginalHypergraphInfo {
            original_weight: 100,
            original_k: 4,
            original_epsilon: 0.03,
        };

        // Act: at the root the formula spreads the tolerance over two
        // levels: (1.03)^(1/2) - 1.
        let epsilon = info.compute_adaptive_epsilon(100, 4);

        // Assert
        assert_ulps_eq!(epsilon, 1.03f64.powf(0.5) - 1.0);
    }

    #[test]
    fn test_adaptive_epsilon_of_empty_subproblem_is_zero() {
        // Arrange
        let info = OriginalHypergraphInfo {
            original_weight: 100,
            original_k: 4,
            original_epsilon: 0.03,
        };

        // Assert
        assert_ulps_eq!(info.compute_adaptive_epsilon(0, 2), 0.0);
    }

    #[test]
    fn test_adaptive_epsilon_never_loosens_past_the_cap() {
        // Arrange: a tiny sub-problem would allow a huge tolerance.
        let info = OriginalHypergraphInfo {
            original_weight: 1000,
            original_k: 2,
            original_epsilon: 0.9,
        };

        // Assert
        assert_ulps_eq!(info.compute_adaptive_epsilon(2, 2), 0.99);
    }

    #[test]
    fn test_bipartitioning_context_for_even_k() {
        // Arrange
        let mut context = Context {
            k: 4,
            epsilon: 0.03,
            ..Context::default()
        };
        let hypergraph = unit_hypergraph(100);
        context.setup_part_weights(hypergraph.total_weight());
        let info = OriginalHypergraphInfo {
            original_weight: 100,
            original_k: 4,
            original_epsilon: 0.03,
        };

        // Act
        let b_context = setup_bipartitioning_context(&hypergraph, &context, &info);

        // Assert
        assert_eq!(b_context.k, 2);
        assert_eq!(b_context.perfect_balance_part_weights, vec![50, 50]);
        assert_eq!(b_context.max_part_weights, vec![50, 50]);
        assert_eq!(b_context.context_type, ContextType::InitialPartitioning);
    }

    #[test]
    fn test_bipartitioning_context_for_odd_k() {
        // Arrange
        let mut context = Context {
            k: 3,
            epsilon: 0.0,
            mode: Mode::RecursiveBipartitioning,
            ..Context::default()
        };
        let hypergraph = unit_hypergraph(90);
        context.setup_part_weights(hypergraph.total_weight());
        let info = OriginalHypergraphInfo {
            original_weight: 90,
            original_k: 3,
            original_epsilon: 0.0,
        };

        // Act
        let b_context = setup_bipartitioning_context(&hypergraph, &context, &info);

        // Assert: the first side takes two of the three blocks.
        assert_eq!(b_context.perfect_balance_part_weights, vec![60, 30]);
        assert_eq!(b_context.context_type, ContextType::Main);
    }

    #[test]
    fn test_recursive_context_copies_the_target_range() {
        // Arrange
        let context = Context {
            k: 4,
            perfect_balance_part_weights: vec![10, 20, 30, 40],
            max_part_weights: vec![11, 22, 33, 44],
            degree_of_parallelism: 1.0,
            ..Context::default()
        };

        // Act
        let rb_context = setup_recursive_bipartitioning_context(&context, 2, 4, 0.5);

        // Assert
        assert_eq!(rb_context.k, 2);
        assert_eq!(rb_context.perfect_balance_part_weights, vec![30, 40]);
        assert_eq!(rb_context.max_part_weights, vec![33, 44]);
        assert_ulps_eq!(rb_context.degree_of_parallelism, 0.5);
    }

    #[test]
    fn test_partition_100_nodes_into_four_balanced_blocks() {
        // Arrange
        let hypergraph = unit_hypergraph(100);
        let context = Context {
            k: 4,
            epsilon: 0.03,
            mode: Mode::Direct,
            ..Context::default()
        };

        // Act
        let phg = partition(&hypergraph, &context, &GreedyBisector { seed: Some(5) }).unwrap();

        // Assert
        let mut total = 0;
        for b in 0..4 {
            assert!(
                (24..=26).contains(&phg.part_weight(b)),
                "block {b} has weight {}",
                phg.part_weight(b)
            );
            total += phg.part_weight(b);
        }
        assert_eq!(total, 100);
        assert!((0..100).all(|v| phg.part_id(v) < 4));
    }

    #[test]
    fn test_partition_into_three_blocks() {
        // Arrange: odd k exercises the single-sided recursion.
        let hypergraph = seven_node_hypergraph();
        let context = Context {
            k: 3,
            epsilon: 0.1,
            objective: Objective::Km1,
            ..Context::default()
        };

        // Act
        let phg = partition(&hypergraph, &context, &GreedyBisector { seed: Some(5) }).unwrap();

        // Assert
        assert!((0..7).all(|v| phg.part_id(v) < 3));
        assert!((0..3).all(|b| phg.part_size(b) > 0));
        let total: Weight = (0..3).map(|b| phg.part_weight(b)).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_partition_with_cut_objective() {
        // Arrange: without cut-net splitting the extraction drops cut nets.
        let hypergraph = seven_node_hypergraph();
        let context = Context {
            k: 4,
            epsilon: 0.2,
            objective: Objective::Cut,
            ..Context::default()
        };

        // Act
        let phg = partition(&hypergraph, &context, &GreedyBisector { seed: Some(5) }).unwrap();

        // Assert
        assert!((0..7).all(|v| phg.part_id(v) < 4));
        let total: Weight = (0..4).map(|b| phg.part_weight(b)).sum();
        assert_eq!(total, 7);
        let sizes: usize = (0..4).map(|b| phg.part_size(b)).sum();
        assert_eq!(sizes, 7);
    }

    #[test]
    fn test_partition_with_individual_part_weights() {
        // Arrange
        let hypergraph = unit_hypergraph(100);
        let context = Context {
            k: 2,
            use_individual_part_weights: true,
            max_part_weights: vec![30, 70],
            ..Context::default()
        };

        // Act
        let phg = partition(&hypergraph, &context, &GreedyBisector { seed: Some(5) }).unwrap();

        // Assert
        assert_eq!(phg.part_weight(0), 30);
        assert_eq!(phg.part_weight(1), 70);
    }

    #[test]
    fn test_balance_holds_for_every_block() {
        // Arrange
        let hypergraph = unit_hypergraph(64);
        let mut context = Context {
            k: 8,
            epsilon: 0.05,
            mode: Mode::RecursiveBipartitioning,
            ..Context::default()
        };

        // Act
        let phg = partition(&hypergraph, &context, &GreedyBisector { seed: Some(5) }).unwrap();

        // Assert
        context.setup_part_weights(hypergraph.total_weight());
        for b in 0..8 {
            assert!(phg.part_weight(b) <= context.max_part_weights[b]);
        }
        assert!(metrics::imbalance(&phg, &context) <= context.epsilon);
    }

    #[test]
    fn test_rejects_fewer_than_two_blocks() {
        // Arrange
        let hypergraph = unit_hypergraph(10);
        let context = Context {
            k: 1,
            ..Context::default()
        };

        // Act
        let result = partition(&hypergraph, &context, &GreedyBisector::default());

        // Assert
        assert!(matches!(
            result,
            Err(Error::InvalidNumberOfBlocks { k: 1 })
        ));
    }

    #[test]
    fn test_bisector_failure_propagates() {
        // Arrange
        let hypergraph = unit_hypergraph(10);
        let context = Context {
            k: 4,
            ..Context::default()
        };

        // Act
        let result = partition(&hypergraph, &context, &FailingBisector);

        // Assert
        assert!(matches!(result, Err(Error::BiPartitioningOnly)));
    }

    #[test]
    fn test_partition_trait_adapter() {
        // Arrange
        let hypergraph = unit_hypergraph(100);
        let mut partitioner = RecursiveBipartitioner {
            context: Context {
                k: 4,
                epsilon: 0.03,
                ..Context::default()
            },
            bisector: GreedyBisector { seed: Some(5) },
        };
        let mut part_ids = vec![0; 100];

        // Act
        partitioner
            .partition(&mut part_ids, &hypergraph)
            .unwrap();

        // Assert
        assert!(part_ids.iter().all(|&b| b < 4));
        for b in 0..4 {
            assert!(part_ids.iter().filter(|&&p| p == b).count() > 0);
        }
    }

    #[test]
    fn test_partition_trait_adapter_checks_lengths() {
        // Arrange
        let hypergraph = unit_hypergraph(10);
        let mut partitioner = RecursiveBipartitioner {
            context: Context::default(),
            bisector: GreedyBisector::default(),
        };
        let mut part_ids = vec![0; 7];

        // Act
        let result = partitioner.partition(&mut part_ids, &hypergraph);

        // Assert
        assert!(matches!(
            result,
            Err(Error::InputLenMismatch {
                expected: 10,
                actual: 7
            })
        ));
    }
}
