// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe

use sprs::{CsMat, TriMat};

use crate::{HyperedgeId, NodeId, Weight};

/// Struct that represents an immutable weighted hypergraph
///
/// The incidence structure is stored twice as sparse matrices in CSR format:
/// once with one row per hyperedge (the pin lists) and once transposed with
/// one row per node (the incident-edge lists). Both are built from the same
/// triplets, so pins and incident edges come out sorted by identifier.
pub struct Hypergraph {
    /// One row per hyperedge, one column per node.
    pins_csr: CsMat<u8>,
    /// One row per node, one column per hyperedge.
    incident_csr: CsMat<u8>,
    node_weights: Vec<Weight>,
    edge_weights: Vec<Weight>,
    total_weight: Weight,
}

impl Hypergraph {
    /// Build a hypergraph from explicit pin lists.
    ///
    /// Panics when a pin is out of range, a pin occurs twice in the same
    /// hyperedge, a weight is negative, or the weight arrays do not match the
    /// node and hyperedge counts.
    pub fn new(
        num_nodes: usize,
        edges: Vec<Vec<NodeId>>,
        node_weights: Vec<Weight>,
        edge_weights: Vec<Weight>,
    ) -> Self {
        let num_edges = edges.len();
        if node_weights.len() != num_nodes {
            panic!(
                "expected {} node weights, got {}",
                num_nodes,
                node_weights.len()
            );
        }
        if edge_weights.len() != num_edges {
            panic!(
                "expected {} hyperedge weights, got {}",
                num_edges,
                edge_weights.len()
            );
        }
        if node_weights.iter().chain(edge_weights.iter()).any(|&w| w < 0) {
            panic!("negative weights are not supported");
        }

        let mut pins = TriMat::new((num_edges, num_nodes));
        let mut incident = TriMat::new((num_nodes, num_edges));
        for (e, edge) in edges.iter().enumerate() {
            let mut sorted = edge.clone();
            sorted.sort_unstable();
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                panic!("hyperedge {e} contains a duplicate pin");
            }
            for &v in edge {
                if v >= num_nodes {
                    panic!("pin {v} of hyperedge {e} is out of range");
                }
                pins.add_triplet(e, v, 1);
                incident.add_triplet(v, e, 1);
            }
        }

        let total_weight = node_weights.iter().sum();
        Self {
            pins_csr: pins.to_csr(),
            incident_csr: incident.to_csr(),
            node_weights,
            edge_weights,
            total_weight,
        }
    }

    /// Build a hypergraph where every node and hyperedge has weight one.
    pub fn with_unit_weights(num_nodes: usize, edges: Vec<Vec<NodeId>>) -> Self {
        let num_edges = edges.len();
        Self::new(num_nodes, edges, vec![1; num_nodes], vec![1; num_edges])
    }

    /// The number of nodes in the hypergraph.
    pub fn num_nodes(&self) -> usize {
        self.incident_csr.rows()
    }

    /// The number of hyperedges in the hypergraph.
    pub fn num_edges(&self) -> usize {
        self.pins_csr.rows()
    }

    /// The sum of all node weights.
    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    pub fn node_weight(&self, v: NodeId) -> Weight {
        self.node_weights[v]
    }

    pub fn edge_weight(&self, e: HyperedgeId) -> Weight {
        self.edge_weights[e]
    }

    /// The pins of the given hyperedge, sorted by node id.
    pub fn pins(&self, e: HyperedgeId) -> &[NodeId] {
        let (indices, _) = self.pins_csr.outer_view(e).unwrap().into_raw_storage();
        indices
    }

    /// The hyperedges incident to the given node, sorted by edge id.
    pub fn incident_edges(&self, v: NodeId) -> &[HyperedgeId] {
        let (indices, _) = self.incident_csr.outer_view(v).unwrap().into_raw_storage();
        indices
    }

    /// The number of pins of the given hyperedge.
    pub fn edge_size(&self, e: HyperedgeId) -> usize {
        self.pins(e).len()
    }

    /// The number of hyperedges incident to the given node.
    pub fn node_degree(&self, v: NodeId) -> usize {
        self.incident_edges(v).len()
    }
}
